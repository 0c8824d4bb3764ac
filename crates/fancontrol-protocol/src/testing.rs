//! Scripted transport for exercising the protocol without hardware.
//!
//! Replies are queued up front; each `read` call consumes one queued reply.
//! When the script runs dry, reads return no bytes, which the codec reports
//! as a timeout. Every write, read and input reset is recorded.
//!
//! Clones share the same script and log, so a test can hand one clone to the
//! code under test and inspect the other afterwards.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::codec::encode_u16;
use crate::constants::I16_BIAS;
use crate::transport::Transport;

#[derive(Debug)]
enum Reply {
    Bytes(Vec<u8>),
    Fail(io::ErrorKind),
}

#[derive(Debug, Default)]
struct ScriptState {
    replies: VecDeque<Reply>,
    writes: Vec<Vec<u8>>,
    reads: Vec<usize>,
    resets: usize,
}

/// In-memory [`Transport`] that replays scripted replies.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedTransport {
    /// Create a transport with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue raw reply bytes for the next read.
    pub fn reply(self, bytes: &[u8]) -> Self {
        self.push(bytes);
        self
    }

    /// Queue a single-byte reply.
    pub fn reply_u8(self, value: u8) -> Self {
        self.reply(&[value])
    }

    /// Queue an unsigned 16-bit reply.
    pub fn reply_u16(self, value: u16) -> Self {
        self.reply(&encode_u16(value))
    }

    /// Queue a biased signed 16-bit reply.
    pub fn reply_biased(self, value: i16) -> Self {
        self.reply_u16((value as i32 + I16_BIAS) as u16)
    }

    /// Queue a read that fails with the given error kind.
    pub fn fail_read(self, kind: io::ErrorKind) -> Self {
        self.state.lock().replies.push_back(Reply::Fail(kind));
        self
    }

    /// Queue raw reply bytes on an existing transport.
    pub fn push(&self, bytes: &[u8]) {
        self.state
            .lock()
            .replies
            .push_back(Reply::Bytes(bytes.to_vec()));
    }

    /// Every write so far, one entry per call.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state.lock().writes.clone()
    }

    /// Number of write calls so far.
    pub fn write_count(&self) -> usize {
        self.state.lock().writes.len()
    }

    /// Number of read calls so far.
    pub fn read_count(&self) -> usize {
        self.state.lock().reads.len()
    }

    /// Requested length of every read so far.
    pub fn read_sizes(&self) -> Vec<usize> {
        self.state.lock().reads.clone()
    }

    /// Number of input buffer resets so far.
    pub fn reset_count(&self) -> usize {
        self.state.lock().resets
    }

    /// Number of scripted replies not yet consumed.
    pub fn pending_replies(&self) -> usize {
        self.state.lock().replies.len()
    }
}

impl Transport for ScriptedTransport {
    fn read(&mut self, n: usize) -> io::Result<Vec<u8>> {
        let mut state = self.state.lock();
        state.reads.push(n);
        match state.replies.pop_front() {
            Some(Reply::Bytes(mut bytes)) => {
                bytes.truncate(n);
                Ok(bytes)
            }
            Some(Reply::Fail(kind)) => Err(io::Error::new(kind, "scripted failure")),
            None => Ok(Vec::new()),
        }
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.state.lock().writes.push(bytes.to_vec());
        Ok(())
    }

    fn reset_input_buffer(&mut self) -> io::Result<()> {
        self.state.lock().resets += 1;
        Ok(())
    }
}

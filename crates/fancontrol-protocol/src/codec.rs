//! Wire codec for primitive protocol fields.
//!
//! Every field is written to the transport as its own write. Reads block on
//! the transport until the field is complete or the deadline expires.
//!
//! ```text
//! u8   : [b0]
//! u16  : [lo, hi]                  little-endian
//! i16  : [lo, hi] of (v + 32768)   biased
//! ```

use std::io;

use bytes::BufMut;

use crate::constants::I16_BIAS;
use crate::error::{ProtocolError, ProtocolResult};
use crate::transport::Transport;

// ============================================================================
// Pure encoding helpers
// ============================================================================

/// Encode an unsigned 16-bit value as little-endian bytes.
pub fn encode_u16(value: u16) -> [u8; 2] {
    let mut buf = [0u8; 2];
    (&mut buf[..]).put_u16_le(value);
    buf
}

/// Decode little-endian bytes into an unsigned 16-bit value.
pub fn decode_u16(bytes: [u8; 2]) -> u16 {
    u16::from_le_bytes(bytes)
}

/// Remove the wire bias from a raw 16-bit field.
///
/// Raw 0 would decode to -32768, which the firmware never produces.
pub fn decode_i16_biased(raw: u16) -> ProtocolResult<i16> {
    let value = raw as i32 - I16_BIAS;
    if value < -(i16::MAX as i32) {
        return Err(ProtocolError::UnexpectedResponse {
            step: "decode",
            detail: format!("biased field {raw} is out of range"),
        });
    }
    Ok(value as i16)
}

/// Map a transport error into the protocol error space.
pub(crate) fn map_io(err: io::Error, expected: usize) -> ProtocolError {
    match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => ProtocolError::Timeout {
            expected,
            actual: 0,
        },
        _ => ProtocolError::Io(err.to_string()),
    }
}

// ============================================================================
// Transport-bound codec
// ============================================================================

/// Reads and writes primitive fields over a [`Transport`].
pub struct Wire<'a, T: Transport + ?Sized> {
    transport: &'a mut T,
}

impl<'a, T: Transport + ?Sized> Wire<'a, T> {
    /// Wrap a transport.
    pub fn new(transport: &'a mut T) -> Self {
        Wire { transport }
    }

    /// Write a single byte.
    pub fn write_u8(&mut self, value: u8) -> ProtocolResult<()> {
        self.transport.write(&[value]).map_err(|e| map_io(e, 0))
    }

    /// Write an unsigned 16-bit value, little-endian.
    pub fn write_u16(&mut self, value: u16) -> ProtocolResult<()> {
        self.transport
            .write(&encode_u16(value))
            .map_err(|e| map_io(e, 0))
    }

    /// Read a single byte.
    pub fn read_u8(&mut self) -> ProtocolResult<u8> {
        let bytes = self.read_exact(1)?;
        Ok(bytes[0])
    }

    /// Read an unsigned 16-bit value, little-endian.
    pub fn read_u16(&mut self) -> ProtocolResult<u16> {
        let bytes = self.read_exact(2)?;
        Ok(decode_u16([bytes[0], bytes[1]]))
    }

    /// Read a biased signed 16-bit value.
    pub fn read_i16(&mut self) -> ProtocolResult<i16> {
        decode_i16_biased(self.read_u16()?)
    }

    fn read_exact(&mut self, n: usize) -> ProtocolResult<Vec<u8>> {
        let bytes = self.transport.read(n).map_err(|e| map_io(e, n))?;
        if bytes.len() < n {
            log::trace!("short read: wanted {} bytes, got {}", n, bytes.len());
            return Err(ProtocolError::Timeout {
                expected: n,
                actual: bytes.len(),
            });
        }
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTransport;

    #[test]
    fn test_u16_is_little_endian() {
        assert_eq!(encode_u16(0x1234), [0x34, 0x12]);
        assert_eq!(decode_u16([0x34, 0x12]), 0x1234);
        assert_eq!(encode_u16(420), [0xA4, 0x01]);
    }

    #[test]
    fn test_biased_decode() {
        assert_eq!(decode_i16_biased(32768).unwrap(), 0);
        assert_eq!(decode_i16_biased(32768 + 300).unwrap(), 300);
        assert_eq!(decode_i16_biased(32768 - 40).unwrap(), -40);
        assert_eq!(decode_i16_biased(65535).unwrap(), i16::MAX);
        assert_eq!(decode_i16_biased(1).unwrap(), -i16::MAX);
    }

    #[test]
    fn test_biased_zero_is_rejected() {
        let err = decode_i16_biased(0).unwrap_err();
        assert!(matches!(err, ProtocolError::UnexpectedResponse { .. }));
    }

    #[test]
    fn test_each_field_is_one_write() {
        let mut transport = ScriptedTransport::new();
        let mut wire = Wire::new(&mut transport);
        wire.write_u8(1).unwrap();
        wire.write_u16(0x0102).unwrap();
        assert_eq!(transport.writes(), vec![vec![1], vec![0x02, 0x01]]);
    }

    #[test]
    fn test_short_read_is_timeout() {
        let mut transport = ScriptedTransport::new().reply(&[0x01]);
        let mut wire = Wire::new(&mut transport);
        assert_eq!(
            wire.read_u16(),
            Err(ProtocolError::Timeout {
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn test_empty_script_times_out() {
        let mut transport = ScriptedTransport::new();
        let mut wire = Wire::new(&mut transport);
        assert_eq!(
            wire.read_u8(),
            Err(ProtocolError::Timeout {
                expected: 1,
                actual: 0
            })
        );
    }

    #[test]
    fn test_read_biased_field() {
        let mut transport = ScriptedTransport::new().reply_biased(-12);
        let mut wire = Wire::new(&mut transport);
        assert_eq!(wire.read_i16().unwrap(), -12);
    }

    #[test]
    fn test_io_errors_map_by_kind() {
        let timed_out = io::Error::new(io::ErrorKind::TimedOut, "slow");
        assert!(matches!(map_io(timed_out, 2), ProtocolError::Timeout { expected: 2, .. }));
        let broken = io::Error::new(io::ErrorKind::BrokenPipe, "gone");
        assert!(matches!(map_io(broken, 2), ProtocolError::Io(_)));
    }
}

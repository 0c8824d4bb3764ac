//! Serial port transport.

use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

use serialport::{ClearBuffer, SerialPort};
use tracing::{debug, trace};

use fancontrol_protocol::Transport;

use crate::config::SerialConfig;
use crate::error::BridgeError;

/// [`Transport`] over a serial port.
///
/// A read collects bytes until the requested count arrives or the timeout
/// has passed since the read began.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    timeout: Duration,
}

impl SerialTransport {
    /// Open the configured port.
    pub fn open(config: &SerialConfig) -> Result<Self, BridgeError> {
        let timeout = config.timeout()?;
        let port = serialport::new(&config.port, config.baud)
            .timeout(timeout)
            .open()
            .map_err(|source| BridgeError::Serial {
                port: config.port.clone(),
                source,
            })?;
        debug!(port = %config.port, baud = config.baud, "opened serial port");
        Ok(Self::from_port(port, timeout))
    }

    /// Wrap an already opened port.
    pub fn from_port(port: Box<dyn SerialPort>, timeout: Duration) -> Self {
        SerialTransport { port, timeout }
    }
}

impl Transport for SerialTransport {
    fn read(&mut self, n: usize) -> io::Result<Vec<u8>> {
        let deadline = Instant::now() + self.timeout;
        let mut buf = vec![0u8; n];
        let mut filled = 0;
        while filled < n {
            match self.port.read(&mut buf[filled..]) {
                Ok(0) => {}
                Ok(count) => filled += count,
                Err(e) if e.kind() == io::ErrorKind::TimedOut => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
            if Instant::now() >= deadline {
                break;
            }
        }
        buf.truncate(filled);
        trace!(wanted = n, got = filled, "serial read");
        Ok(buf)
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()
    }

    fn reset_input_buffer(&mut self) -> io::Result<()> {
        self.port.clear(ClearBuffer::Input).map_err(io::Error::from)
    }
}

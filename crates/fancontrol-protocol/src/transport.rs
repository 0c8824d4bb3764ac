//! Byte transport abstraction.
//!
//! The protocol engine only needs three primitives from the serial link. Real
//! hardware is driven through a serial port; tests use a scripted transport.

use std::io;

/// A bidirectional byte stream to the controller.
///
/// Implementations own the read deadline. A read that hits the deadline
/// returns whatever bytes arrived, possibly none; the caller treats a short
/// read as a timeout.
pub trait Transport {
    /// Read up to `n` bytes, blocking until `n` bytes arrive or the deadline
    /// expires.
    fn read(&mut self, n: usize) -> io::Result<Vec<u8>>;

    /// Write all bytes.
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Discard any bytes received but not yet read.
    fn reset_input_buffer(&mut self) -> io::Result<()>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn read(&mut self, n: usize) -> io::Result<Vec<u8>> {
        (**self).read(n)
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        (**self).write(bytes)
    }

    fn reset_input_buffer(&mut self) -> io::Result<()> {
        (**self).reset_input_buffer()
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn read(&mut self, n: usize) -> io::Result<Vec<u8>> {
        (**self).read(n)
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        (**self).write(bytes)
    }

    fn reset_input_buffer(&mut self) -> io::Result<()> {
        (**self).reset_input_buffer()
    }
}

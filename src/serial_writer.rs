//! Mutex-serialized access to the shared serial output.
//!
//! All device writes, whether they come from the consumer thread or from a
//! producer using the synchronous path, go through the same lock so lines
//! never interleave part-way.

use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::dispatch_queue::{WriteOp, WriteTask};
use crate::message::format_message;

/// Baud rate applied when the fast output flag is enabled.
pub const FAST_BAUD_RATE: u32 = 115_200;

/// The physical output behind the logger.
///
/// Implementations decide what a "serial port" is on the target: a UART
/// peripheral, a USB CDC endpoint, stdout on a host build, or a buffer in
/// tests. The writer only needs raw byte writes and, optionally, speed and
/// flush control.
///
/// # Usage
///
/// ```
/// # use rtos_logger::SerialDevice;
/// # use std::io;
/// struct Uart { sent: Vec<u8>, baud: u32 }
///
/// impl SerialDevice for Uart {
///     fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
///         self.sent.extend_from_slice(bytes);
///         Ok(())
///     }
///
///     fn set_baud_rate(&mut self, baud: u32) {
///         self.baud = baud;
///     }
/// }
/// ```
pub trait SerialDevice: Send {
    /// Writes `bytes` to the device. A partial failure may leave some bytes
    /// written; the logger does not retry.
    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Reconfigures the output speed. Devices without a baud rate ignore it.
    fn set_baud_rate(&mut self, _baud: u32) {}

    /// Pushes out anything the device buffers internally.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Adapts any `io::Write` sink (file, socket, pipe) into a serial device.
#[derive(Debug)]
pub struct IoDevice<W> {
    inner: W,
}

impl<W: Write + Send> IoDevice<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

impl<W: Write + Send> SerialDevice for IoDevice<W> {
    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.inner.write_all(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Host stdout as the serial console.
#[derive(Debug, Default)]
pub struct StdoutDevice;

impl SerialDevice for StdoutDevice {
    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        io::stdout().lock().write_all(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().lock().flush()
    }
}

/// Cloneable handle to the single shared output device.
///
/// Build one writer per physical device and clone it into every logger that
/// targets that device; all clones share the same lock.
#[derive(Clone)]
pub struct SerialWriter {
    device: Arc<Mutex<Box<dyn SerialDevice>>>,
}

impl SerialWriter {
    /// Takes exclusive ownership of `device`.
    pub fn new(device: impl SerialDevice + 'static) -> Self {
        Self {
            device: Arc::new(Mutex::new(Box::new(device))),
        }
    }

    /// Writes one complete line while holding the device lock.
    ///
    /// Device errors are not reported to the caller.
    pub fn write_locked(&self, line: &str) {
        let mut device = self.device.lock();
        if let Err(err) = device.write_bytes(line.as_bytes()) {
            debug!(error = %err, "serial device write failed");
        }
    }

    /// Formats `args` and writes the result as one line under the lock.
    ///
    /// The line is rendered before the lock is taken, so an argument that
    /// fails to format leaves nothing on the device.
    pub fn write_fmt_locked(&self, args: fmt::Arguments<'_>) {
        match format_message(args) {
            Ok(message) => self.write_locked(message.as_str()),
            Err(err) => debug!(error = %err, "locked print dropped"),
        }
    }

    /// Flushes the device while holding the lock.
    pub fn flush_locked(&self) {
        if let Err(err) = self.device.lock().flush() {
            debug!(error = %err, "serial device flush failed");
        }
    }

    /// Applies an output speed to the device.
    pub fn set_baud_rate(&self, baud: u32) {
        self.device.lock().set_baud_rate(baud);
    }

    /// Runs one dequeued task against the device.
    pub fn execute(&self, task: WriteTask) {
        match task.op {
            WriteOp::Print => self.write_locked(task.message.as_str()),
            WriteOp::Flush => self.flush_locked(),
        }
    }

    /// True when both handles point at the same device.
    pub fn same_device(&self, other: &SerialWriter) -> bool {
        Arc::ptr_eq(&self.device, &other.device)
    }
}

impl fmt::Debug for SerialWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialWriter")
            .field("handles", &Arc::strong_count(&self.device))
            .finish()
    }
}

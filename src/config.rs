use crate::error::{LoggerError, Result};

pub const DEFAULT_STACK_SIZE: usize = 1024;
pub const DEFAULT_QUEUE_SIZE: usize = 128;
pub const DEFAULT_FAST_UART: bool = true;
pub const DEFAULT_TIMEZONE_OFFSET: i32 = 0;

/// Construction parameters for a [`crate::Logger`].
///
/// Fixed once the logger is built.
///
/// # Examples
///
/// ```
/// # use rtos_logger::LoggerConfig;
/// let config = LoggerConfig::default()
///     .with_queue_capacity(32)
///     .with_timezone_offset(2 * 3600);
/// assert_eq!(config.queue_capacity, 32);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoggerConfig {
    /// Consumer thread stack size in bytes.
    pub stack_size: usize,
    /// Maximum number of pending lines.
    pub queue_capacity: usize,
    /// Switch the device to [`crate::serial_writer::FAST_BAUD_RATE`] on construction.
    pub fast_uart: bool,
    /// Seconds added to wall-clock time before rendering timestamps.
    pub timezone_offset: i32,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
            queue_capacity: DEFAULT_QUEUE_SIZE,
            fast_uart: DEFAULT_FAST_UART,
            timezone_offset: DEFAULT_TIMEZONE_OFFSET,
        }
    }
}

impl LoggerConfig {
    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = stack_size;
        self
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    pub fn with_fast_uart(mut self, fast_uart: bool) -> Self {
        self.fast_uart = fast_uart;
        self
    }

    pub fn with_timezone_offset(mut self, timezone_offset: i32) -> Self {
        self.timezone_offset = timezone_offset;
        self
    }

    /// Rejects values the logger cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.stack_size == 0 {
            return Err(LoggerError::InvalidConfig("stack_size must be non-zero"));
        }
        if self.queue_capacity == 0 {
            return Err(LoggerError::InvalidConfig("queue_capacity must be non-zero"));
        }
        Ok(())
    }
}

use std::fmt;
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use crate::clock::ClockState;
use crate::config::LoggerConfig;
use crate::consumer::ConsumerContext;
use crate::dispatch_queue::{DispatchQueue, TaskHandle, WriteTask};
use crate::error::{LoggerError, Result};
use crate::message::{format_message, format_timestamped};
use crate::serial_writer::{SerialWriter, FAST_BAUD_RATE};

/// Externally visible lifecycle of a [`Logger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggerState {
    /// Built, consumer not started yet. Messages accumulate in the queue.
    Constructed,
    /// Consumer thread is draining the queue.
    Running,
    /// `init()` failed to start the consumer. Nothing drains the queue.
    Degraded,
    /// The logger is being torn down.
    Stopped,
}

enum Lifecycle {
    Constructed,
    Running(ConsumerContext),
    Degraded,
    Stopped,
}

/// Thread-safe asynchronous logger for a single shared serial output.
///
/// Producers format their line on their own thread and hand it to a bounded
/// queue; one low-priority consumer thread writes queued lines to the device.
/// The async path never blocks the caller: when the queue is full the line is
/// dropped and [`LoggerError::QueueRejected`] is returned.
///
/// Dropping the logger stops the consumer after it has written every line
/// that was queued at that moment.
///
/// A second, synchronous path ([`Logger::print_message_locked`]) writes
/// directly under the device lock, bypassing the queue.
///
/// # Thread Safety
///
/// `Logger` is `Sync`; share it behind an `Arc` (or a `static`) and call it
/// from any number of threads. Lines from the async path reach the device in
/// enqueue order. Lines from the two paths interleave only at line
/// boundaries.
///
/// # Examples
///
/// ```
/// # use rtos_logger::{log_printf, log_printf_time, ClockState, Logger, LoggerConfig, SerialWriter, IoDevice};
/// # use std::sync::Arc;
/// let clock = Arc::new(ClockState::new());
/// let writer = SerialWriter::new(IoDevice::new(std::io::sink()));
/// let logger = Logger::new(LoggerConfig::default(), clock, writer).unwrap();
/// logger.init().unwrap();
///
/// log_printf!(logger, "boot stage {}\r\n", 1).unwrap();
/// log_printf_time!(logger, "sensor={:.1}\r\n", 21.5).unwrap();
/// ```
pub struct Logger {
    config: LoggerConfig,
    clock: Arc<ClockState>,
    writer: SerialWriter,
    queue: Arc<DispatchQueue>,
    lifecycle: Mutex<Lifecycle>,
}

impl Logger {
    /// Builds a logger around shared clock and device state.
    ///
    /// When `config.fast_uart` is set the device is switched to
    /// [`FAST_BAUD_RATE`]. Since every writer clone shares one device, this
    /// also affects any other logger on the same writer.
    pub fn new(config: LoggerConfig, clock: Arc<ClockState>, writer: SerialWriter) -> Result<Self> {
        config.validate()?;
        if config.fast_uart {
            writer.set_baud_rate(FAST_BAUD_RATE);
        }

        Ok(Self {
            queue: Arc::new(DispatchQueue::new(config.queue_capacity)),
            config,
            clock,
            writer,
            lifecycle: Mutex::new(Lifecycle::Constructed),
        })
    }

    /// Starts the consumer thread and queues a readiness line.
    ///
    /// Only the first call starts anything; later calls return
    /// [`LoggerError::AlreadyInitialized`] without logging. If the thread
    /// cannot be spawned the logger stays degraded for good, but the
    /// readiness line is still queued.
    pub fn init(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock();
        if !matches!(*lifecycle, Lifecycle::Constructed) {
            return Err(LoggerError::AlreadyInitialized);
        }

        let spawned = ConsumerContext::spawn(
            Arc::clone(&self.queue),
            self.writer.clone(),
            self.config.stack_size,
        );
        let (thread_id, result) = match spawned {
            Ok(consumer) => {
                let thread_id = consumer.thread_id();
                info!(
                    ?thread_id,
                    stack_size = self.config.stack_size,
                    queue_capacity = self.config.queue_capacity,
                    "logger consumer started"
                );
                *lifecycle = Lifecycle::Running(consumer);
                (thread_id, Ok(()))
            }
            Err(err) => {
                warn!(error = %err, "logger consumer failed to start");
                *lifecycle = Lifecycle::Degraded;
                (thread::current().id(), Err(LoggerError::Startup(err)))
            }
        };
        drop(lifecycle);

        if let Err(err) = self.printf_time(format_args!(
            "[INFO][RTOS-LOGGER] RTOS logger task thread (TID: {:?}) started with a stack size of {}, queue size of {} ... [OK] \r\n",
            thread_id, self.config.stack_size, self.config.queue_capacity
        )) {
            debug!(error = %err, "readiness line dropped");
        }
        result
    }

    /// Formats a line and queues it for the consumer.
    ///
    /// Returns the length in bytes of the formatted line. Never blocks.
    pub fn printf(&self, args: fmt::Arguments<'_>) -> Result<usize> {
        let message = format_message(args)?;
        let len = message.body().len();
        self.enqueue(WriteTask::print(message))?;
        Ok(len)
    }

    /// Like [`Logger::printf`], with a `YYYY-MM-DD HH:MM:SS.mmm ` prefix.
    ///
    /// The returned length counts only the caller's part of the line.
    pub fn printf_time(&self, args: fmt::Arguments<'_>) -> Result<usize> {
        let message = format_timestamped(&self.clock, self.config.timezone_offset, args)?;
        let len = message.body().len();
        self.enqueue(WriteTask::print(message))?;
        Ok(len)
    }

    /// Writes a line synchronously under the device lock.
    ///
    /// Blocks the caller while another writer holds the device.
    pub fn print_message_locked(&self, args: fmt::Arguments<'_>) {
        self.writer.write_fmt_locked(args);
    }

    /// Queues a device flush behind every line already queued.
    pub fn flush(&self) -> Result<TaskHandle> {
        self.enqueue(WriteTask::flush())
    }

    /// The underlying dispatch queue, for callers that build their own tasks.
    pub fn log_queue(&self) -> &DispatchQueue {
        &self.queue
    }

    pub fn state(&self) -> LoggerState {
        match *self.lifecycle.lock() {
            Lifecycle::Constructed => LoggerState::Constructed,
            Lifecycle::Running(_) => LoggerState::Running,
            Lifecycle::Degraded => LoggerState::Degraded,
            Lifecycle::Stopped => LoggerState::Stopped,
        }
    }

    pub fn config(&self) -> &LoggerConfig {
        &self.config
    }

    pub fn writer(&self) -> &SerialWriter {
        &self.writer
    }

    fn enqueue(&self, task: WriteTask) -> Result<TaskHandle> {
        self.queue.enqueue(task).map_err(|rejected| {
            trace!(
                len = rejected.len,
                capacity = rejected.capacity,
                "log line dropped"
            );
            LoggerError::QueueRejected
        })
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("queue", &self.queue)
            .finish()
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        let lifecycle = std::mem::replace(self.lifecycle.get_mut(), Lifecycle::Stopped);
        if let Lifecycle::Running(mut consumer) = lifecycle {
            consumer.stop();
            debug!(pending = self.queue.len(), "logger stopped");
        }
    }
}

/// Queues a formatted line on a [`Logger`].
///
/// Arguments follow `format!` syntax and are checked at compile time.
///
/// ```
/// # use rtos_logger::{log_printf, ClockState, Logger, LoggerConfig, SerialWriter, IoDevice};
/// # use std::sync::Arc;
/// # let writer = SerialWriter::new(IoDevice::new(std::io::sink()));
/// # let logger = Logger::new(LoggerConfig::default(), Arc::new(ClockState::new()), writer).unwrap();
/// let len = log_printf!(logger, "x={}\n", 5).unwrap();
/// assert_eq!(len, 4);
/// ```
#[macro_export]
macro_rules! log_printf {
    ($logger:expr, $($arg:tt)+) => {
        $logger.printf(::std::format_args!($($arg)+))
    };
}

/// Queues a timestamp-prefixed line on a [`Logger`].
#[macro_export]
macro_rules! log_printf_time {
    ($logger:expr, $($arg:tt)+) => {
        $logger.printf_time(::std::format_args!($($arg)+))
    };
}

/// Writes a line synchronously through the device lock of a [`Logger`].
#[macro_export]
macro_rules! log_locked {
    ($logger:expr, $($arg:tt)+) => {
        $logger.print_message_locked(::std::format_args!($($arg)+))
    };
}

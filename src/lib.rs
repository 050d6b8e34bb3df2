//! # RTOS Logger
//!
//! An asynchronous, thread-safe logger for devices where many tasks share a
//! single serial output:
//!
//! * **Non-blocking producers**: `printf` formats on the calling thread and
//!   enqueues; a full queue rejects instantly instead of stalling the caller
//! * **One consumer**: a dedicated thread owns the async path to the device
//! * **Whole lines**: every device write happens under one shared lock, so
//!   queued and direct writes never interleave mid-line
//! * **Timestamps**: optional `YYYY-MM-DD HH:MM:SS.mmm ` prefix from wall
//!   clock plus a monotonic millisecond counter
//!
//! ## Main Components
//!
//! * `Logger`: lifecycle and the public print operations
//! * `dispatch_queue`: bounded FIFO of tagged write tasks
//! * `consumer`: the thread draining the queue
//! * `serial_writer`: lock-guarded access to the output device
//! * `message`: line formatting and timestamp prefixing
//! * `clock`: monotonic counter and wall-clock source
//!
//! ## Quick Start
//!
//! ```
//! use rtos_logger::{log_locked, log_printf, log_printf_time};
//! use rtos_logger::{ClockState, Logger, LoggerConfig, SerialWriter, StdoutDevice};
//! use std::sync::Arc;
//!
//! // One clock and one writer per process, shared by every logger
//! let clock = Arc::new(ClockState::new());
//! let writer = SerialWriter::new(StdoutDevice);
//!
//! let logger = Logger::new(LoggerConfig::default(), clock, writer).unwrap();
//! logger.init().unwrap();
//!
//! log_printf!(logger, "plain line {}\r\n", 1).unwrap();
//! log_printf_time!(logger, "timestamped line\r\n").unwrap();
//! log_locked!(logger, "written synchronously\r\n");
//! ```

pub mod clock;
pub mod config;
pub mod consumer;
pub mod dispatch_queue;
pub mod error;
pub mod logger;
pub mod message;
pub mod serial_writer;

pub use clock::{ClockState, SystemWallClock, WallClock};
pub use config::LoggerConfig;
pub use dispatch_queue::{DispatchQueue, Rejected, TaskHandle, WriteOp, WriteTask};
pub use error::{LoggerError, QUEUE_REJECTED_CODE};
pub use logger::{Logger, LoggerState};
pub use message::{FormatError, LogMessage};
pub use serial_writer::{IoDevice, SerialDevice, SerialWriter, StdoutDevice};

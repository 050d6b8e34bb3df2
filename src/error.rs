use std::io;

use thiserror::Error;

use crate::message::FormatError;

/// Numeric code for a rejected enqueue, kept distinct from formatting codes.
pub const QUEUE_REJECTED_CODE: i32 = -1001;
/// Numeric code for a message that failed to format.
pub const FORMAT_ERROR_CODE: i32 = -1;
/// Numeric code for a consumer thread that failed to start.
pub const RTOS_ERROR_CODE: i32 = 1;
/// Numeric code for a second `init()` call.
pub const ALREADY_INITIALIZED_CODE: i32 = 2;
/// Numeric code for a rejected configuration.
pub const INVALID_CONFIG_CODE: i32 = -22;

/// Everything the logger facade can report.
///
/// All failures are local: a failed `printf` drops that one message, a failed
/// `init()` leaves the logger without a consumer. Device write failures are
/// never reported.
#[derive(Debug, Error)]
pub enum LoggerError {
    /// The consumer thread could not be started.
    #[error("logger consumer thread failed to start: {0}")]
    Startup(#[source] io::Error),

    /// `init()` was already called on this logger.
    #[error("logger is already initialized")]
    AlreadyInitialized,

    /// The message could not be rendered; nothing was enqueued.
    #[error(transparent)]
    Format(#[from] FormatError),

    /// The dispatch queue was full; the formatted message was discarded.
    #[error("log queue is full, message dropped")]
    QueueRejected,

    /// A configuration value is unusable.
    #[error("invalid logger configuration: {0}")]
    InvalidConfig(&'static str),
}

impl LoggerError {
    /// The C-style return code for this error.
    pub fn code(&self) -> i32 {
        match self {
            LoggerError::Startup(_) => RTOS_ERROR_CODE,
            LoggerError::AlreadyInitialized => ALREADY_INITIALIZED_CODE,
            LoggerError::Format(_) => FORMAT_ERROR_CODE,
            LoggerError::QueueRejected => QUEUE_REJECTED_CODE,
            LoggerError::InvalidConfig(_) => INVALID_CONFIG_CODE,
        }
    }
}

pub type Result<T> = std::result::Result<T, LoggerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct() {
        let errors = [
            LoggerError::Startup(io::Error::new(io::ErrorKind::Other, "no memory")),
            LoggerError::AlreadyInitialized,
            LoggerError::Format(FormatError::Message),
            LoggerError::QueueRejected,
            LoggerError::InvalidConfig("queue_capacity"),
        ];
        let mut codes: Vec<i32> = errors.iter().map(LoggerError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_rejected_sentinel() {
        assert_eq!(LoggerError::QueueRejected.code(), -1001);
        assert!(LoggerError::Format(FormatError::Timestamp).code() < 0);
    }
}

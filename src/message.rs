use std::fmt::{self, Write};

use thiserror::Error;

use crate::clock::ClockState;

/// Failure while rendering a log line.
///
/// Nothing is enqueued or written when formatting fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FormatError {
    /// A `Display`/`Debug` implementation in the arguments returned an error.
    #[error("message arguments failed to format")]
    Message,
    /// The clock reading could not be rendered as a calendar date.
    #[error("timestamp is out of the representable range")]
    Timestamp,
}

/// One fully rendered, ready-to-write log line.
///
/// Owned and immutable: it is built on the producer thread, moved into the
/// dispatch queue and consumed once by the writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMessage {
    text: Box<str>,
    body_start: usize,
}

impl LogMessage {
    /// Wraps an already rendered line with no timestamp prefix.
    pub fn new(text: impl Into<Box<str>>) -> Self {
        Self {
            text: text.into(),
            body_start: 0,
        }
    }

    /// The complete line, timestamp prefix included.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// The caller-formatted part of the line, without any timestamp prefix.
    pub fn body(&self) -> &str {
        &self.text[self.body_start..]
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl fmt::Display for LogMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Expands `args` into a freshly allocated, size-fitted line.
///
/// # Examples
///
/// ```
/// # use rtos_logger::message::format_message;
/// let msg = format_message(format_args!("temp={} C\r\n", 21)).unwrap();
/// assert_eq!(msg.as_str(), "temp=21 C\r\n");
/// ```
pub fn format_message(args: fmt::Arguments<'_>) -> Result<LogMessage, FormatError> {
    let mut rendered = String::new();
    rendered.write_fmt(args).map_err(|_| FormatError::Message)?;
    Ok(LogMessage::new(rendered))
}

/// Expands `args` and prepends the current timestamp.
///
/// The prefix has the form `YYYY-MM-DD HH:MM:SS.mmm ` (see
/// [`crate::clock::render_timestamp`]). The body is formatted first so a
/// failing argument never costs a clock read.
pub fn format_timestamped(
    clock: &ClockState,
    timezone_offset: i32,
    args: fmt::Arguments<'_>,
) -> Result<LogMessage, FormatError> {
    let body = format_message(args)?;
    let prefix = clock.timestamp(timezone_offset)?;
    Ok(prepend(prefix, body))
}

fn prepend(prefix: String, body: LogMessage) -> LogMessage {
    let body_start = prefix.len();
    let mut text = prefix;
    text.push_str(body.as_str());
    LogMessage {
        text: text.into_boxed_str(),
        body_start,
    }
}

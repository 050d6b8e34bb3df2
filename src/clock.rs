//! Timestamp sources for rendered log lines.
//!
//! Two clocks feed every timestamp: a monotonic millisecond counter that is
//! started once when the `ClockState` is built and never reset, and a
//! wall-clock source with second precision. The two are not calibrated
//! against each other, so the sub-second part of a timestamp is only
//! best-effort.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

use time::macros::format_description;
use time::OffsetDateTime;

use crate::message::FormatError;

/// Source of wall-clock seconds since the UNIX epoch.
///
/// The board layer decides where wall-clock time comes from (RTC, NTP,
/// host clock). Implementations must be callable from any producer thread.
pub trait WallClock: Send + Sync {
    /// Seconds elapsed since `1970-01-01T00:00:00Z`.
    fn unix_seconds(&self) -> i64;
}

/// Wall clock backed by the host system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemWallClock;

impl WallClock for SystemWallClock {
    fn unix_seconds(&self) -> i64 {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(elapsed) => elapsed.as_secs() as i64,
            Err(before_epoch) => -(before_epoch.duration().as_secs() as i64),
        }
    }
}

/// Shared clock state handed to every logger instance.
///
/// Create one per process and share it through an `Arc`; the monotonic
/// counter starts in [`ClockState::new`] and keeps running for as long as
/// the state is alive.
///
/// # Examples
///
/// ```
/// # use rtos_logger::ClockState;
/// let clock = ClockState::new();
/// let first = clock.millis();
/// let second = clock.millis();
/// assert!(second >= first);
/// ```
pub struct ClockState {
    started: Instant,
    wall: Box<dyn WallClock>,
}

impl ClockState {
    /// Starts the monotonic counter and reads wall time from the host.
    pub fn new() -> Self {
        Self::with_wall_clock(SystemWallClock)
    }

    /// Starts the monotonic counter with an externally supplied wall clock.
    pub fn with_wall_clock(wall: impl WallClock + 'static) -> Self {
        Self {
            started: Instant::now(),
            wall: Box::new(wall),
        }
    }

    /// Milliseconds elapsed since this state was created.
    #[inline]
    pub fn millis(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Current wall-clock reading in seconds since the UNIX epoch.
    #[inline]
    pub fn unix_seconds(&self) -> i64 {
        self.wall.unix_seconds()
    }

    /// Renders the current time as `YYYY-MM-DD HH:MM:SS.mmm `.
    ///
    /// The date and time come from the wall clock shifted by
    /// `timezone_offset` seconds; `mmm` is the monotonic counter modulo 1000.
    pub fn timestamp(&self, timezone_offset: i32) -> Result<String, FormatError> {
        render_timestamp(self.unix_seconds(), timezone_offset, self.millis())
    }
}

impl Default for ClockState {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ClockState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClockState")
            .field("millis", &self.millis())
            .finish_non_exhaustive()
    }
}

/// Renders a timestamp prefix from raw clock readings.
///
/// Returns `YYYY-MM-DD HH:MM:SS.mmm ` (note the trailing space) where the
/// date/time part is `unix_seconds + timezone_offset` in UTC and `mmm` is
/// `monotonic_ms % 1000`, zero padded.
///
/// # Examples
///
/// ```
/// # use rtos_logger::clock::render_timestamp;
/// let prefix = render_timestamp(0, 3600, 1_234_567).unwrap();
/// assert_eq!(prefix, "1970-01-01 01:00:00.567 ");
/// ```
pub fn render_timestamp(
    unix_seconds: i64,
    timezone_offset: i32,
    monotonic_ms: u64,
) -> Result<String, FormatError> {
    let local_seconds = unix_seconds
        .checked_add(i64::from(timezone_offset))
        .ok_or(FormatError::Timestamp)?;
    let datetime =
        OffsetDateTime::from_unix_timestamp(local_seconds).map_err(|_| FormatError::Timestamp)?;
    let mut rendered = datetime
        .format(format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second]"
        ))
        .map_err(|_| FormatError::Timestamp)?;

    rendered.push_str(&format!(".{:03} ", monotonic_ms % 1000));
    Ok(rendered)
}

//! Process-wide monotonic clock and local-time path formatting.
//!
//! Segment gating and motion windows are computed on a monotonic millisecond
//! scale so they are immune to wall-clock adjustments; only the on-disk
//! directory and file names use local time.

use std::sync::OnceLock;
use std::time::Instant;

use chrono::Local;

/// Strftime format for the per-day recording directory.
pub const DIR_FORMAT: &str = "%Y-%m-%d";
/// Strftime format for the segment file timestamp.
pub const FILE_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Milliseconds elapsed since the first call in this process.
pub fn monotonic_ms() -> u64 {
    EPOCH.get_or_init(Instant::now).elapsed().as_millis() as u64
}

/// Local date, e.g. `2026-08-01`.
pub fn local_date() -> String {
    Local::now().format(DIR_FORMAT).to_string()
}

/// Local timestamp, e.g. `2026-08-01_14-32-07`.
pub fn local_stamp() -> String {
    Local::now().format(FILE_FORMAT).to_string()
}

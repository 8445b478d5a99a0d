//! Constants for the scan scheduler.
//!
//! These are the default values behind [`crate::config::ScanTuning`],
//! [`crate::config::PlaybackConfig`] and [`crate::config::BackoffConfig`].
//! Every one of them can be overridden from the `scan` section of the
//! pmoconfig YAML file.

use std::time::Duration;

// ============================================================================
// Cadence
// ============================================================================

/// Base scheduler interval (milliseconds)
///
/// Scalar and audio channels are evaluated at this cadence, and it is the
/// amount of data a playback window request reaches past the play time.
///
/// Value: 1000 ms
pub const BASE_INTERVAL_MS: u64 = 1000;

/// Frame channel speed-up
///
/// When image or text channels are registered the loop runs this many
/// times faster than the base interval so frames track the play clock.
///
/// Value: 10
pub const MEDIA_SPEEDUP: u32 = 10;

/// Default visible time span (milliseconds)
///
/// Value: 60000 ms (one minute)
pub const VIEW_DURATION_MS: f64 = 60_000.0;

// ============================================================================
// Fetch tuning
// ============================================================================

/// Offset added to a channel's last data time so the next request does not
/// return the same sample again (milliseconds)
pub const EPSILON_MS: f64 = 0.001;

/// A frame channel behind `newest - FRAME_GAP_FACTOR × view` is caught up
pub const FRAME_GAP_FACTOR: f64 = 2.0;

/// A frame channel behind `newest - FRAME_JUMP_FACTOR × view` jumps straight
/// to newest instead of slewing halfway
pub const FRAME_JUMP_FACTOR: f64 = 5.0;

/// Above this media fetch duration real-time frames ask for the newest
/// frame instead of an absolute window (milliseconds)
pub const MEDIA_NEWEST_THRESHOLD_MS: f64 = 10_000.0;

/// Real-time window requests span this many view durations
pub const WINDOW_SPAN_FACTOR: f64 = 10.0;

/// Real-time window requests never start earlier than
/// `play time - WINDOW_JUMP_FACTOR × view`
pub const WINDOW_JUMP_FACTOR: f64 = 10.0;

/// Upper bound on a single window request, in view durations
pub const FETCH_CAP_FACTOR: f64 = 100.0;

/// Display delay snaps forward when the target exceeds the current value by
/// more than this fraction of the view duration
pub const SKOOTCH_SNAP_FRACTION: f64 = 0.1;

// ============================================================================
// Backoff
// ============================================================================

/// Stale tick tiers as `(exclusive upper bound, interval multiplier)`
///
/// Example: the 120th consecutive stale tick waits 10× the loop interval.
pub const BACKOFF_TIERS: [(u32, u32); 4] = [(100, 1), (150, 10), (740, 20), (4000, 50)];

/// Consecutive stale ticks after which the scheduler stops re-arming
pub const BACKOFF_TERMINAL_AFTER: u32 = 4000;

// ============================================================================
// Server
// ============================================================================

/// Default data server
pub const SERVER_BASE_URL: &str = "http://localhost:8000";

/// Default servlet root prefixed to every channel path
pub const SERVLET_ROOT: &str = "/CT";

/// Request timeout (seconds)
///
/// Value: 30 seconds
pub const SERVER_TIMEOUT_SECONDS: u64 = 30;

/// User agent for data requests
pub const USER_AGENT: &str = "PMOScan/0.1";

/// Helper to get the base interval as Duration
pub fn base_interval() -> Duration {
    Duration::from_millis(BASE_INTERVAL_MS)
}

/// Helper to get the server timeout as Duration
pub fn server_timeout() -> Duration {
    Duration::from_secs(SERVER_TIMEOUT_SECONDS)
}

//! Configuration structures for the scan scheduler.
//!
//! The `scan` section of the pmoconfig YAML maps onto [`ScanConfig`]. Every
//! field carries a serde default so a partial section (or none at all)
//! still yields a usable configuration.

use crate::constants;
use crate::models::Millis;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub tuning: ScanTuning,
    #[serde(default)]
    pub backoff: BackoffConfig,
    #[serde(default)]
    pub groups: Vec<GroupConfig>,
}

impl ScanConfig {
    /// Load the `scan` section from the global pmoconfig instance
    #[cfg(feature = "pmoconfig")]
    pub fn load_from_pmoconfig() -> anyhow::Result<Self> {
        let cfg = pmoconfig::get_config();
        Ok(Self::from_pmoconfig(&cfg))
    }

    /// Load the `scan` section from a specific configuration instance
    #[cfg(feature = "pmoconfig")]
    pub fn from_pmoconfig(cfg: &pmoconfig::Config) -> Self {
        match cfg.get_value(&["scan"]) {
            Ok(value) => Self::from_yaml_value(value),
            Err(_) => Self::default(),
        }
    }

    /// Deserialize a YAML value, falling back to defaults when it does not fit
    pub fn from_yaml_value(value: serde_yaml::Value) -> Self {
        match serde_yaml::from_value(value) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Invalid scan configuration, using defaults: {}", e);
                Self::default()
            }
        }
    }
}

/// Data server connection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "ServerConfig::default_base_url")]
    pub base_url: String,
    #[serde(default = "ServerConfig::default_servlet_root")]
    pub servlet_root: String,
    #[serde(default = "ServerConfig::default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "ServerConfig::default_user_agent")]
    pub user_agent: String,
}

impl ServerConfig {
    fn default_base_url() -> String {
        constants::SERVER_BASE_URL.to_string()
    }

    fn default_servlet_root() -> String {
        constants::SERVLET_ROOT.to_string()
    }

    const fn default_timeout_secs() -> u64 {
        constants::SERVER_TIMEOUT_SECONDS
    }

    fn default_user_agent() -> String {
        constants::USER_AGENT.to_string()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            servlet_root: Self::default_servlet_root(),
            timeout_secs: Self::default_timeout_secs(),
            user_agent: Self::default_user_agent(),
        }
    }
}

/// Mode the binary enters once channels are registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StartMode {
    #[default]
    Realtime,
    Playback,
    Pause,
}

/// Playback cadence and view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    #[serde(default = "PlaybackConfig::default_base_interval_ms")]
    pub base_interval_ms: u64,
    #[serde(default = "PlaybackConfig::default_view_duration_ms")]
    pub view_duration_ms: Millis,
    #[serde(default)]
    pub start_mode: StartMode,
}

impl PlaybackConfig {
    const fn default_base_interval_ms() -> u64 {
        constants::BASE_INTERVAL_MS
    }

    const fn default_view_duration_ms() -> Millis {
        constants::VIEW_DURATION_MS
    }

    pub fn base_interval(&self) -> Duration {
        Duration::from_millis(self.base_interval_ms.max(1))
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            base_interval_ms: Self::default_base_interval_ms(),
            view_duration_ms: Self::default_view_duration_ms(),
            start_mode: StartMode::default(),
        }
    }
}

/// Multipliers and thresholds used by the fetch policies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanTuning {
    #[serde(default = "ScanTuning::default_media_speedup")]
    pub media_speedup: u32,
    #[serde(default = "ScanTuning::default_epsilon_ms")]
    pub epsilon_ms: Millis,
    #[serde(default = "ScanTuning::default_frame_gap_factor")]
    pub frame_gap_factor: f64,
    #[serde(default = "ScanTuning::default_frame_jump_factor")]
    pub frame_jump_factor: f64,
    #[serde(default = "ScanTuning::default_media_newest_threshold_ms")]
    pub media_newest_threshold_ms: Millis,
    #[serde(default = "ScanTuning::default_window_span_factor")]
    pub window_span_factor: f64,
    #[serde(default = "ScanTuning::default_window_jump_factor")]
    pub window_jump_factor: f64,
    #[serde(default = "ScanTuning::default_fetch_cap_factor")]
    pub fetch_cap_factor: f64,
    #[serde(default = "ScanTuning::default_skootch_snap_fraction")]
    pub skootch_snap_fraction: f64,
}

impl ScanTuning {
    const fn default_media_speedup() -> u32 {
        constants::MEDIA_SPEEDUP
    }

    const fn default_epsilon_ms() -> Millis {
        constants::EPSILON_MS
    }

    const fn default_frame_gap_factor() -> f64 {
        constants::FRAME_GAP_FACTOR
    }

    const fn default_frame_jump_factor() -> f64 {
        constants::FRAME_JUMP_FACTOR
    }

    const fn default_media_newest_threshold_ms() -> Millis {
        constants::MEDIA_NEWEST_THRESHOLD_MS
    }

    const fn default_window_span_factor() -> f64 {
        constants::WINDOW_SPAN_FACTOR
    }

    const fn default_window_jump_factor() -> f64 {
        constants::WINDOW_JUMP_FACTOR
    }

    const fn default_fetch_cap_factor() -> f64 {
        constants::FETCH_CAP_FACTOR
    }

    const fn default_skootch_snap_fraction() -> f64 {
        constants::SKOOTCH_SNAP_FRACTION
    }
}

impl Default for ScanTuning {
    fn default() -> Self {
        Self {
            media_speedup: Self::default_media_speedup(),
            epsilon_ms: Self::default_epsilon_ms(),
            frame_gap_factor: Self::default_frame_gap_factor(),
            frame_jump_factor: Self::default_frame_jump_factor(),
            media_newest_threshold_ms: Self::default_media_newest_threshold_ms(),
            window_span_factor: Self::default_window_span_factor(),
            window_jump_factor: Self::default_window_jump_factor(),
            fetch_cap_factor: Self::default_fetch_cap_factor(),
            skootch_snap_fraction: Self::default_skootch_snap_fraction(),
        }
    }
}

/// One step of the stale-tick escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffTier {
    /// Exclusive upper bound on the consecutive stale tick count
    pub until: u32,
    /// Loop interval multiplier while below `until`
    pub multiplier: u32,
}

/// Stale-tick escalation table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    #[serde(default = "BackoffConfig::default_tiers")]
    pub tiers: Vec<BackoffTier>,
    #[serde(default = "BackoffConfig::default_terminal_after")]
    pub terminal_after: u32,
}

impl BackoffConfig {
    fn default_tiers() -> Vec<BackoffTier> {
        constants::BACKOFF_TIERS
            .iter()
            .map(|&(until, multiplier)| BackoffTier { until, multiplier })
            .collect()
    }

    const fn default_terminal_after() -> u32 {
        constants::BACKOFF_TERMINAL_AFTER
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            tiers: Self::default_tiers(),
            terminal_after: Self::default_terminal_after(),
        }
    }
}

/// A display group declared in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupConfig {
    pub name: String,
    #[serde(default)]
    pub channels: Vec<String>,
}

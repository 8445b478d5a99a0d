//! Extension trait adding scan settings to `pmoconfig::Config`
//!
//! # Example
//!
//! ```no_run
//! use pmoconfig::get_config;
//! use pmoscan::ScanConfigExt;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = get_config();
//! config.set_scan_view_duration_ms(30_000.0)?;
//! let scan = config.get_scan_config()?;
//! println!("{} groups configured", scan.groups.len());
//! # Ok(())
//! # }
//! ```

use crate::config::{GroupConfig, ScanConfig, StartMode};
use crate::constants::VIEW_DURATION_MS;
use anyhow::Result;
use pmoconfig::Config;
use serde_yaml::Value;

pub trait ScanConfigExt {
    /// Full `scan` section with defaults for missing fields
    fn get_scan_config(&self) -> Result<ScanConfig>;

    /// Display groups and their channels
    fn get_scan_groups(&self) -> Result<Vec<GroupConfig>>;

    /// Replace the configured display groups
    fn set_scan_groups(&self, groups: &[GroupConfig]) -> Result<()>;

    fn get_scan_start_mode(&self) -> Result<StartMode>;

    fn set_scan_start_mode(&self, mode: StartMode) -> Result<()>;

    /// Visible time span in milliseconds (default: 60000)
    fn get_scan_view_duration_ms(&self) -> Result<f64>;

    fn set_scan_view_duration_ms(&self, millis: f64) -> Result<()>;
}

impl ScanConfigExt for Config {
    fn get_scan_config(&self) -> Result<ScanConfig> {
        Ok(ScanConfig::from_pmoconfig(self))
    }

    fn get_scan_groups(&self) -> Result<Vec<GroupConfig>> {
        match self.get_value(&["scan", "groups"]) {
            Ok(value @ Value::Sequence(_)) => Ok(serde_yaml::from_value(value)?),
            _ => Ok(Vec::new()),
        }
    }

    fn set_scan_groups(&self, groups: &[GroupConfig]) -> Result<()> {
        let value = serde_yaml::to_value(groups)?;
        self.set_value(&["scan", "groups"], value)
    }

    fn get_scan_start_mode(&self) -> Result<StartMode> {
        match self.get_value(&["scan", "playback", "start_mode"]) {
            Ok(value) => Ok(serde_yaml::from_value(value).unwrap_or_default()),
            Err(_) => Ok(StartMode::default()),
        }
    }

    fn set_scan_start_mode(&self, mode: StartMode) -> Result<()> {
        self.set_value(
            &["scan", "playback", "start_mode"],
            serde_yaml::to_value(mode)?,
        )
    }

    fn get_scan_view_duration_ms(&self) -> Result<f64> {
        match self.get_value(&["scan", "playback", "view_duration_ms"]) {
            Ok(Value::Number(n)) => Ok(n.as_f64().unwrap_or(VIEW_DURATION_MS)),
            _ => Ok(VIEW_DURATION_MS),
        }
    }

    fn set_scan_view_duration_ms(&self, millis: f64) -> Result<()> {
        self.set_value(
            &["scan", "playback", "view_duration_ms"],
            Value::Number(millis.into()),
        )
    }
}

//! Playback session: mode, requested time and view

use crate::models::Millis;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayMode {
    #[default]
    Pause,
    RealTime,
    Playback,
}

impl PlayMode {
    pub fn is_running(self) -> bool {
        self != PlayMode::Pause
    }
}

/// Last navigation the user asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepDirection {
    #[default]
    None,
    Backward,
    Forward,
    Play,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSession {
    mode: PlayMode,
    /// Play time of the last tick or refresh
    pub requested_time: Option<Millis>,
    pub view_duration: Millis,
    pub step_direction: StepDirection,
    epoch: u64,
}

impl PlaybackSession {
    pub fn new(view_duration: Millis) -> Self {
        Self {
            mode: PlayMode::Pause,
            requested_time: None,
            view_duration,
            step_direction: StepDirection::None,
            epoch: 0,
        }
    }

    pub fn mode(&self) -> PlayMode {
        self.mode
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Switch mode. Every call starts a new epoch, even when the mode is
    /// unchanged, so responses to earlier requests are recognised as late.
    pub fn enter(&mut self, mode: PlayMode) -> u64 {
        self.mode = mode;
        self.epoch = self.epoch.wrapping_add(1);
        self.epoch
    }

    pub fn is_current(&self, epoch: u64) -> bool {
        self.epoch == epoch
    }
}

//! Bounds of the data available on the server across all channels

use crate::models::Millis;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimeWindowTracker {
    oldest: Option<Millis>,
    newest: Option<Millis>,
}

impl TimeWindowTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn oldest(&self) -> Option<Millis> {
        self.oldest
    }

    pub fn newest(&self) -> Option<Millis> {
        self.newest
    }

    /// Raise the newest bound. Older values are ignored.
    pub fn observe_newest(&mut self, value: Millis) {
        if !value.is_finite() {
            return;
        }
        if self.newest.is_none_or(|newest| value > newest) {
            self.newest = Some(value);
        }
        self.keep_ordered();
    }

    /// Record an oldest bound reported by a channel.
    ///
    /// `authoritative` is set when the response answered an explicit oldest
    /// request. When the value is accepted, the bound becomes the minimum of
    /// the value and `channel_min` (the smallest oldest any channel reported).
    pub fn observe_oldest(&mut self, value: Millis, authoritative: bool, channel_min: Option<Millis>) {
        if !value.is_finite() {
            return;
        }
        if authoritative || self.oldest.is_none_or(|oldest| value < oldest) {
            let oldest = channel_min.map_or(value, |min| min.min(value));
            self.oldest = Some(oldest);
            self.keep_ordered();
        }
    }

    /// Apply the result of a time-only probe of either edge
    pub fn observe_limit(&mut self, newest: Option<Millis>, oldest: Option<Millis>) {
        if let Some(value) = newest {
            self.observe_newest(value);
        }
        if let Some(value) = oldest.filter(|v| v.is_finite()) {
            if self.oldest.is_none_or(|known| value < known) {
                self.oldest = Some(value);
                self.keep_ordered();
            }
        }
    }

    /// Forget both bounds (the server index was rebuilt)
    pub fn reset(&mut self) {
        self.oldest = None;
        self.newest = None;
    }

    /// Forget only the oldest bound so the next probe re-establishes it
    pub fn forget_oldest(&mut self) {
        self.oldest = None;
    }

    /// Position of `time` in the scrollable range as a percentage.
    ///
    /// The range starts one view after the oldest bound so that the view
    /// always ends inside the available data.
    pub fn position_percent(&self, time: Millis, view: Millis) -> Option<f64> {
        let newest = self.newest?;
        let oldest = self.oldest.unwrap_or(newest);
        let lead = view.min(newest - oldest);
        let span = newest - oldest - lead;
        if span <= 0.0 {
            return Some(100.0);
        }
        Some((100.0 * (time - oldest - lead) / span).clamp(0.0, 100.0))
    }

    /// Inverse of [`position_percent`](Self::position_percent)
    pub fn time_at_percent(&self, percent: f64, view: Millis) -> Option<Millis> {
        let newest = self.newest?;
        let oldest = self.oldest.unwrap_or(newest);
        let lead = view.min(newest - oldest).max(0.0);
        let time = oldest + lead + percent * (newest - oldest - lead) / 100.0;
        Some(time.clamp(oldest + lead, newest.max(oldest + lead)))
    }

    fn keep_ordered(&mut self) {
        if let (Some(oldest), Some(newest)) = (self.oldest, self.newest) {
            if oldest > newest {
                self.oldest = Some(newest);
            }
        }
    }
}

//! Channel state and display groups
//!
//! A [`Channel`] is keyed by its path and holds everything the scheduler
//! knows about it. A [`DisplayGroup`] is what a renderer draws as one plot;
//! the same path may appear in several groups but its state lives once in
//! the [`ChannelRegistry`].

use crate::models::{MediaKind, Millis, ResponseMeta};
use std::collections::{HashMap, HashSet};

/// Request lifecycle of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelStatus {
    #[default]
    None,
    Pending,
    Gotten,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub path: String,
    pub media_kind: MediaKind,
    pub status: ChannelStatus,
    /// End time of the last data received
    pub got_time: Option<Millis>,
    pub observed_newest: Option<Millis>,
    pub observed_oldest: Option<Millis>,
    /// Gap between the last two distinct newest values reported by the server
    pub block_duration: Option<Millis>,
    pub lag_time: Millis,
    /// Fresh metadata not yet used to re-derive the play delay
    pub is_new_entry: bool,
    /// Registration this state belongs to; bumped when a path is re-added
    pub generation: u64,
}

impl Channel {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            media_kind: MediaKind::from_path(&path),
            path,
            status: ChannelStatus::None,
            got_time: None,
            observed_newest: None,
            observed_oldest: None,
            block_duration: None,
            lag_time: 0.0,
            is_new_entry: false,
            generation: 0,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == ChannelStatus::Pending
    }

    /// Mark a request as outstanding. Returns false if one already is.
    pub fn issue(&mut self) -> bool {
        if self.is_pending() {
            return false;
        }
        self.status = ChannelStatus::Pending;
        true
    }

    /// Apply a data response. Returns true when `got_time` moved forward.
    ///
    /// `fallback_time` is used when the server did not send a `time` header.
    pub fn apply_data(&mut self, meta: &ResponseMeta, fallback_time: Option<Millis>) -> bool {
        let previous = self.got_time;

        if let Some(newest) = meta.newest {
            if self.observed_newest.is_none_or(|known| newest > known) {
                if let Some(known) = self.observed_newest {
                    self.block_duration = Some(newest - known);
                }
                self.observed_newest = Some(newest);
            }
        }
        if let Some(oldest) = meta.oldest {
            self.observed_oldest = Some(oldest);
        }
        self.lag_time = meta.lag_time.unwrap_or(0.0);
        self.is_new_entry = true;

        let received = match meta.time {
            Some(time) => Some(time + meta.duration.unwrap_or(0.0)),
            None => fallback_time,
        };
        if received.is_some() {
            self.got_time = received;
        }
        self.status = ChannelStatus::Gotten;

        match (previous, self.got_time) {
            (None, Some(_)) => true,
            (Some(before), Some(after)) => after > before,
            _ => false,
        }
    }

    pub fn mark_not_modified(&mut self) {
        self.status = ChannelStatus::Gotten;
    }

    /// No data at the requested time, or the request failed
    pub fn mark_none(&mut self) {
        self.status = ChannelStatus::None;
    }

    /// A response arrived for a superseded session
    pub fn clear_pending(&mut self) {
        if self.is_pending() {
            self.status = ChannelStatus::None;
        }
    }

    /// Forget per-session progress. Outstanding requests stay outstanding.
    pub fn reset_progress(&mut self) {
        self.got_time = None;
        self.is_new_entry = false;
        if self.status == ChannelStatus::Gotten {
            self.status = ChannelStatus::None;
        }
    }
}

/// One renderer plot.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayGroup {
    pub name: String,
    pub paths: Vec<String>,
    /// Delay the renderer applies to this group's scalar traces
    pub display_delay: Millis,
}

impl DisplayGroup {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            paths: Vec::new(),
            display_delay: 0.0,
        }
    }
}

/// Channels keyed by path plus the ordered list of display groups.
#[derive(Debug, Default, Clone)]
pub struct ChannelRegistry {
    channels: HashMap<String, Channel>,
    groups: Vec<DisplayGroup>,
    next_generation: u64,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a path to a group, creating either as needed.
    ///
    /// Returns false if the path was already in that group.
    pub fn add(&mut self, group: &str, path: &str) -> bool {
        let index = match self.groups.iter().position(|g| g.name == group) {
            Some(index) => index,
            None => {
                self.groups.push(DisplayGroup::new(group));
                self.groups.len() - 1
            }
        };

        let display = &mut self.groups[index];
        if display.paths.iter().any(|p| p == path) {
            return false;
        }
        display.paths.push(path.to_string());

        if !self.channels.contains_key(path) {
            self.next_generation += 1;
            let mut channel = Channel::new(path);
            channel.generation = self.next_generation;
            self.channels.insert(path.to_string(), channel);
        }
        true
    }

    /// Remove a path from every group. Returns the dropped channel.
    pub fn remove(&mut self, path: &str) -> Option<Channel> {
        for group in &mut self.groups {
            group.paths.retain(|p| p != path);
        }
        self.groups.retain(|g| !g.paths.is_empty());
        self.channels.remove(path)
    }

    /// Remove a group and every channel no other group references.
    pub fn clear_group(&mut self, group: &str) -> bool {
        let Some(index) = self.groups.iter().position(|g| g.name == group) else {
            return false;
        };
        let removed = self.groups.remove(index);
        let still_used: HashSet<&str> = self
            .groups
            .iter()
            .flat_map(|g| g.paths.iter().map(String::as_str))
            .collect();
        for path in removed.paths {
            if !still_used.contains(path.as_str()) {
                self.channels.remove(&path);
            }
        }
        true
    }

    pub fn get(&self, path: &str) -> Option<&Channel> {
        self.channels.get(path)
    }

    pub fn get_mut(&mut self, path: &str) -> Option<&mut Channel> {
        self.channels.get_mut(path)
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn groups(&self) -> &[DisplayGroup] {
        &self.groups
    }

    pub fn group_mut(&mut self, index: usize) -> Option<&mut DisplayGroup> {
        self.groups.get_mut(index)
    }

    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }

    pub fn channels_mut(&mut self) -> impl Iterator<Item = &mut Channel> {
        self.channels.values_mut()
    }

    /// Paths in group order, each visited once, with the index of the first
    /// group that lists it.
    pub fn visit_order(&self) -> Vec<(usize, String)> {
        let mut seen = HashSet::new();
        let mut order = Vec::with_capacity(self.channels.len());
        for (index, group) in self.groups.iter().enumerate() {
            for path in &group.paths {
                if seen.insert(path.as_str()) {
                    order.push((index, path.clone()));
                }
            }
        }
        order
    }

    /// Indices of every group that lists `path`
    pub fn groups_containing(&self, path: &str) -> Vec<usize> {
        self.groups
            .iter()
            .enumerate()
            .filter(|(_, g)| g.paths.iter().any(|p| p == path))
            .map(|(index, _)| index)
            .collect()
    }

    pub fn has_frame_channels(&self) -> bool {
        self.channels.values().any(|c| c.media_kind.is_frame())
    }

    /// Smallest oldest bound any channel has reported
    pub fn min_observed_oldest(&self) -> Option<Millis> {
        self.channels
            .values()
            .filter_map(|c| c.observed_oldest)
            .reduce(f64::min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(time: f64, duration: f64, newest: f64) -> ResponseMeta {
        ResponseMeta {
            time: Some(time),
            duration: Some(duration),
            newest: Some(newest),
            ..ResponseMeta::default()
        }
    }

    #[test]
    fn test_issue_guards_single_outstanding_request() {
        let mut channel = Channel::new("src/a.csv");
        assert!(channel.issue());
        assert!(!channel.issue());
        channel.mark_none();
        assert!(channel.issue());
    }

    #[test]
    fn test_apply_data_sets_got_time_and_newest() {
        let mut channel = Channel::new("src/a.csv");
        channel.issue();
        let advanced = channel.apply_data(&meta(1000.0, 500.0, 1500.0), None);

        assert!(advanced);
        assert_eq!(channel.status, ChannelStatus::Gotten);
        assert_eq!(channel.got_time, Some(1500.0));
        assert_eq!(channel.observed_newest, Some(1500.0));
        assert!(channel.is_new_entry);
        assert_eq!(channel.block_duration, None);
    }

    #[test]
    fn test_block_duration_tracks_newest_delta() {
        let mut channel = Channel::new("src/a.csv");
        channel.apply_data(&meta(1000.0, 0.0, 1500.0), None);
        channel.apply_data(&meta(1500.0, 0.0, 2500.0), None);
        assert_eq!(channel.block_duration, Some(1000.0));

        // An older newest never lowers the observed value
        channel.apply_data(&meta(1500.0, 0.0, 2000.0), None);
        assert_eq!(channel.observed_newest, Some(2500.0));
    }

    #[test]
    fn test_same_data_does_not_advance() {
        let mut channel = Channel::new("src/a.csv");
        assert!(channel.apply_data(&meta(1000.0, 0.0, 1000.0), None));
        assert!(!channel.apply_data(&meta(1000.0, 0.0, 1000.0), None));
    }

    #[test]
    fn test_fallback_time_used_without_header() {
        let mut channel = Channel::new("src/a.csv");
        let advanced = channel.apply_data(&ResponseMeta::default(), Some(42.0));
        assert!(advanced);
        assert_eq!(channel.got_time, Some(42.0));
    }

    #[test]
    fn test_reset_progress_keeps_pending() {
        let mut channel = Channel::new("src/a.csv");
        channel.apply_data(&meta(1000.0, 0.0, 1000.0), None);
        channel.issue();
        channel.reset_progress();
        assert!(channel.is_pending());
        assert_eq!(channel.got_time, None);
        assert_eq!(channel.observed_newest, Some(1000.0));
    }

    #[test]
    fn test_registry_shares_state_between_groups() {
        let mut registry = ChannelRegistry::new();
        assert!(registry.add("plot1", "src/a.csv"));
        assert!(registry.add("plot2", "src/a.csv"));
        assert!(!registry.add("plot1", "src/a.csv"));
        registry.add("plot2", "src/cam.jpg");

        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.visit_order(),
            vec![(0, "src/a.csv".to_string()), (1, "src/cam.jpg".to_string())]
        );
        assert_eq!(registry.groups_containing("src/a.csv"), vec![0, 1]);
        assert!(registry.has_frame_channels());
    }

    #[test]
    fn test_clear_group_keeps_shared_channels() {
        let mut registry = ChannelRegistry::new();
        registry.add("plot1", "src/a.csv");
        registry.add("plot1", "src/b.csv");
        registry.add("plot2", "src/a.csv");

        assert!(registry.clear_group("plot1"));
        assert!(registry.get("src/a.csv").is_some());
        assert!(registry.get("src/b.csv").is_none());
        assert_eq!(registry.groups().len(), 1);
        assert!(!registry.clear_group("plot1"));
    }

    #[test]
    fn test_remove_drops_empty_groups() {
        let mut registry = ChannelRegistry::new();
        registry.add("plot1", "src/a.csv");
        assert!(registry.remove("src/a.csv").is_some());
        assert!(registry.is_empty());
        assert!(registry.groups().is_empty());
    }

    #[test]
    fn test_min_observed_oldest() {
        let mut registry = ChannelRegistry::new();
        registry.add("plot1", "a");
        registry.add("plot1", "b");
        assert_eq!(registry.min_observed_oldest(), None);
        registry.get_mut("a").unwrap().observed_oldest = Some(50.0);
        registry.get_mut("b").unwrap().observed_oldest = Some(20.0);
        assert_eq!(registry.min_observed_oldest(), Some(20.0));
    }

    #[test]
    fn test_readding_a_path_starts_a_new_generation() {
        let mut registry = ChannelRegistry::new();
        registry.add("plot1", "src/a.csv");
        let first = registry.get("src/a.csv").unwrap().generation;

        // A second group sharing the path keeps the same registration
        registry.add("plot2", "src/a.csv");
        assert_eq!(registry.get("src/a.csv").unwrap().generation, first);

        registry.remove("src/a.csv");
        registry.add("plot1", "src/a.csv");
        assert!(registry.get("src/a.csv").unwrap().generation > first);
    }
}

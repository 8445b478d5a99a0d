//! Temporal synchronization and adaptive fetch scheduling
//!
//! [`FetchScheduler`] owns every piece of mutable scan state through a
//! single [`SchedulerContext`]. It performs no I/O: [`FetchScheduler::tick`]
//! plans the requests for one loop iteration and decides when the next one
//! should run, [`FetchScheduler::complete`] folds a response back into the
//! channel state. The async driver lives in [`crate::worker`].
//!
//! # Tick
//!
//! Each tick reads the play clock, then visits every registered channel once
//! in display-group order:
//!
//! - image and text channels (frame policy) are planned every tick,
//! - scalar and audio channels (window policy) only once per base interval,
//! - a channel with a request in flight is skipped.
//!
//! In real time the first channel's fresh metadata re-anchors the play
//! delay on the newest data, so the display trails the source by its
//! observed lag rather than by a fixed amount.

use crate::backoff::{BackoffController, BackoffDecision, BackoffState};
use crate::channel::{Channel, ChannelRegistry, DisplayGroup};
use crate::clock::{PlayClock, WallClock};
use crate::config::{ScanConfig, ScanTuning};
use crate::error::{Error, Result};
use crate::models::{FetchPolicy, FetchRequest, FetchResponse, MediaKind, Millis, ReferenceMode};
use crate::session::{PlayMode, PlaybackSession, StepDirection};
use crate::sink::{self, Payload};
use crate::time_window::TimeWindowTracker;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Why the loop stopped re-arming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Paused on request
    Paused,
    /// Every channel was removed
    NoChannels,
    /// Playback reached the newest data
    ReachedNewest,
    /// Too many ticks without new data
    Stale,
    /// A request failed
    TransportFailure,
    /// Playback asked past the newest data and got nothing
    PassedNewest,
}

/// When to run the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextTick {
    After(Duration),
    Stop(StopReason),
}

/// Result of one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    pub requests: Vec<FetchRequest>,
    /// Display delay for each group with an evaluated window channel
    pub display_delays: Vec<(String, Millis)>,
    /// Play time of this tick, if the loop was running
    pub play_time: Option<Millis>,
    pub next: NextTick,
}

/// What the driver must do after a completion was applied.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CompletionEffect {
    /// Decoded data for the sink
    pub payload: Option<Payload>,
    /// Follow-up time-only probes
    pub probes: Vec<FetchRequest>,
    /// Set when the completion stopped the loop
    pub stopped: Option<StopReason>,
    /// The response belonged to a superseded session
    pub late: bool,
}

/// All mutable scan state.
#[derive(Debug, Clone)]
pub struct SchedulerContext {
    pub channels: ChannelRegistry,
    pub window: TimeWindowTracker,
    pub session: PlaybackSession,
    pub backoff: BackoffController,
    pub clock: PlayClock,
}

/// Read-only copy of the scheduler state
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerSnapshot {
    pub mode: PlayMode,
    pub epoch: u64,
    pub requested_time: Option<Millis>,
    pub play_delay: Millis,
    pub view_duration: Millis,
    pub step_direction: StepDirection,
    pub oldest: Option<Millis>,
    pub newest: Option<Millis>,
    pub backoff: BackoffState,
    pub channels: Vec<Channel>,
    pub groups: Vec<DisplayGroup>,
}

impl SchedulerSnapshot {
    pub fn channel(&self, path: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.path == path)
    }
}

#[derive(Debug)]
pub struct FetchScheduler {
    ctx: SchedulerContext,
    tuning: ScanTuning,
    base_interval: Duration,
    /// Wall time of the last window policy evaluation
    last_window_eval: Option<Millis>,
    skootch: Millis,
    /// Some channel's got_time advanced since the previous tick
    advanced: bool,
}

impl FetchScheduler {
    pub fn new(config: &ScanConfig, wall: Arc<dyn WallClock>) -> Self {
        Self {
            ctx: SchedulerContext {
                channels: ChannelRegistry::new(),
                window: TimeWindowTracker::new(),
                session: PlaybackSession::new(config.playback.view_duration_ms),
                backoff: BackoffController::new(&config.backoff),
                clock: PlayClock::new(wall),
            },
            tuning: config.tuning.clone(),
            base_interval: config.playback.base_interval(),
            last_window_eval: None,
            skootch: 0.0,
            advanced: false,
        }
    }

    pub fn context(&self) -> &SchedulerContext {
        &self.ctx
    }

    pub fn mode(&self) -> PlayMode {
        self.ctx.session.mode()
    }

    pub fn snapshot(&self) -> SchedulerSnapshot {
        let mut channels: Vec<Channel> = self.ctx.channels.channels().cloned().collect();
        channels.sort_by(|a, b| a.path.cmp(&b.path));
        SchedulerSnapshot {
            mode: self.ctx.session.mode(),
            epoch: self.ctx.session.epoch(),
            requested_time: self.ctx.session.requested_time,
            play_delay: self.ctx.clock.play_delay(),
            view_duration: self.ctx.session.view_duration,
            step_direction: self.ctx.session.step_direction,
            oldest: self.ctx.window.oldest(),
            newest: self.ctx.window.newest(),
            backoff: self.ctx.backoff.state(),
            channels,
            groups: self.ctx.channels.groups().to_vec(),
        }
    }

    fn base_ms(&self) -> Millis {
        self.base_interval.as_secs_f64() * 1000.0
    }

    fn view(&self) -> Millis {
        self.ctx.session.view_duration
    }

    /// Delay between ticks before backoff
    pub fn loop_interval(&self) -> Duration {
        if self.ctx.channels.has_frame_channels() {
            self.base_interval / self.tuning.media_speedup.max(1)
        } else {
            self.base_interval
        }
    }

    // ------------------------------------------------------------------
    // Channel registration
    // ------------------------------------------------------------------

    pub fn add_channel(&mut self, group: &str, path: &str) -> bool {
        let added = self.ctx.channels.add(group, path);
        if added {
            debug!(channel = path, group, kind = %MediaKind::from_path(path), "channel added");
        }
        added
    }

    pub fn remove_channel(&mut self, path: &str) -> Result<()> {
        match self.ctx.channels.remove(path) {
            Some(_) => {
                debug!(channel = path, "channel removed");
                Ok(())
            }
            None => Err(Error::UnknownChannel(path.to_string())),
        }
    }

    pub fn clear_group(&mut self, group: &str) -> bool {
        self.ctx.channels.clear_group(group)
    }

    pub fn set_view_duration(&mut self, view: Millis) {
        if view.is_finite() && view > 0.0 {
            self.ctx.session.view_duration = view;
        } else {
            warn!(view, "ignoring invalid view duration");
        }
    }

    /// Forget the known data bounds, for example after the server index
    /// was rebuilt
    pub fn reset_window(&mut self) {
        self.ctx.window.reset();
    }

    // ------------------------------------------------------------------
    // Mode changes
    // ------------------------------------------------------------------

    /// Enter real-time mode. Returns limit probes for unknown bounds.
    pub fn start_realtime(&mut self) -> Vec<FetchRequest> {
        self.enter(PlayMode::RealTime, None);
        self.limit_probes(false, false)
    }

    /// Enter playback mode from `from`, or from the last requested time.
    pub fn start_playback(&mut self, from: Option<Millis>) -> Vec<FetchRequest> {
        let start = from.or(self.ctx.session.requested_time);
        self.enter(PlayMode::Playback, start);
        self.limit_probes(false, false)
    }

    fn enter(&mut self, mode: PlayMode, start: Option<Millis>) {
        let epoch = self.ctx.session.enter(mode);
        self.ctx.session.step_direction = StepDirection::Play;
        self.ctx
            .clock
            .establish(start, mode == PlayMode::RealTime, self.ctx.window.newest());
        for channel in self.ctx.channels.channels_mut() {
            channel.reset_progress();
        }
        self.ctx.backoff.reset();
        self.advanced = false;
        self.last_window_eval = None;
        self.skootch = 0.0;
        self.ctx.session.requested_time = Some(self.ctx.clock.now());
        info!(
            ?mode,
            epoch,
            play_delay = self.ctx.clock.play_delay(),
            "scan started"
        );
    }

    /// Stop the loop. Returns false if it was not running.
    pub fn pause(&mut self) -> bool {
        self.stop(StopReason::Paused)
    }

    fn stop(&mut self, reason: StopReason) -> bool {
        let was_running = self.ctx.session.mode().is_running();
        if was_running {
            let epoch = self.ctx.session.enter(PlayMode::Pause);
            info!(?reason, epoch, "scan paused");
        }
        self.ctx.session.step_direction = StepDirection::None;
        was_running
    }

    // ------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------

    /// Plan one loop iteration.
    pub fn tick(&mut self) -> TickOutcome {
        let mode = self.ctx.session.mode();
        if !mode.is_running() {
            return TickOutcome {
                requests: Vec::new(),
                display_delays: Vec::new(),
                play_time: None,
                next: NextTick::Stop(StopReason::Paused),
            };
        }

        let realtime = mode == PlayMode::RealTime;
        let wall = self.ctx.clock.wall_now();
        let mut ptime = self.ctx.clock.now();
        let run_window = self
            .last_window_eval
            .is_none_or(|last| wall - last >= self.base_ms());

        let mut requests = Vec::new();
        let mut delayed_groups: Vec<usize> = Vec::new();
        let mut first_channel = true;
        let mut skootch_done = false;

        for (_, path) in self.ctx.channels.visit_order() {
            let Some(channel) = self.ctx.channels.get_mut(&path) else {
                continue;
            };

            if realtime && first_channel && channel.is_new_entry {
                channel.is_new_entry = false;
                if let Some(newest) = channel.observed_newest {
                    ptime = newest;
                    self.ctx.clock.set_play_delay(wall - newest);
                }
            }
            first_channel = false;

            if channel.is_pending() {
                continue;
            }
            let kind = channel.media_kind;
            let got_time = channel.got_time;

            let request = match kind.policy() {
                FetchPolicy::Frame => Some(self.plan_frame(&path, kind, got_time, ptime, realtime)),
                FetchPolicy::Window => {
                    if !run_window {
                        continue;
                    }
                    if !skootch_done {
                        self.update_skootch(realtime);
                        skootch_done = true;
                    }
                    for index in self.ctx.channels.groups_containing(&path) {
                        if !delayed_groups.contains(&index) {
                            delayed_groups.push(index);
                        }
                    }
                    self.plan_window(&path, kind, got_time, ptime, realtime)
                }
            };

            if let Some(request) = request {
                if let Some(channel) = self.ctx.channels.get_mut(&path) {
                    channel.issue();
                    requests.push(request.for_generation(channel.generation));
                }
            }
        }

        if run_window {
            self.last_window_eval = Some(wall);
        }

        let mut display_delays = Vec::with_capacity(delayed_groups.len());
        for index in delayed_groups {
            if let Some(display) = self.ctx.channels.group_mut(index) {
                display.display_delay = self.skootch;
                display_delays.push((display.name.clone(), self.skootch));
            }
        }

        self.ctx.session.requested_time = Some(ptime);
        debug!(
            ?mode,
            ptime,
            requests = requests.len(),
            play_delay = self.ctx.clock.play_delay(),
            "tick"
        );

        let next = self.next_tick(realtime, ptime);
        if let NextTick::Stop(reason) = next {
            // Their answers would come back under the next epoch
            for request in requests.drain(..) {
                if let Some(channel) = self.ctx.channels.get_mut(&request.channel_path) {
                    channel.clear_pending();
                }
            }
            debug!(?reason, "tick stopped the loop, nothing issued");
        }
        TickOutcome {
            requests,
            display_delays,
            play_time: Some(ptime),
            next,
        }
    }

    fn next_tick(&mut self, realtime: bool, ptime: Millis) -> NextTick {
        if self.ctx.channels.is_empty() {
            self.stop(StopReason::NoChannels);
            return NextTick::Stop(StopReason::NoChannels);
        }
        if !realtime {
            if let Some(newest) = self.ctx.window.newest() {
                if ptime - self.view() >= newest {
                    self.stop(StopReason::ReachedNewest);
                    return NextTick::Stop(StopReason::ReachedNewest);
                }
            }
        }

        let advanced = std::mem::take(&mut self.advanced);
        let decision = self.ctx.backoff.next(advanced);
        match decision.delay(self.loop_interval()) {
            Some(delay) => {
                if let BackoffDecision::Continue(multiplier @ 2..) = decision {
                    debug!(
                        stale = self.ctx.backoff.state().consecutive_stale_ticks,
                        multiplier, "slowing down"
                    );
                }
                NextTick::After(delay)
            }
            None => {
                warn!(
                    stale = self.ctx.backoff.state().consecutive_stale_ticks,
                    "no new data, stopping"
                );
                self.stop(StopReason::Stale);
                NextTick::Stop(StopReason::Stale)
            }
        }
    }

    fn plan_frame(
        &self,
        path: &str,
        kind: MediaKind,
        got_time: Option<Millis>,
        ptime: Millis,
        realtime: bool,
    ) -> FetchRequest {
        let epoch = self.ctx.session.epoch();
        if !realtime {
            return FetchRequest::new(path, kind, ReferenceMode::Absolute, ptime, 0.0, epoch)
                .with_dedupe(dedupe_token(path, got_time, ReferenceMode::Absolute, false, 0.0));
        }

        let mut target = got_time.map_or(ptime, |t| t + self.tuning.epsilon_ms);
        if let Some(newest) = self.ctx.window.newest() {
            let view = self.view();
            if target < newest - self.tuning.frame_gap_factor * view {
                debug!(channel = path, behind = newest - target, "frame jump ahead");
                target = if target > newest - self.tuning.frame_jump_factor * view {
                    (target + newest) / 2.0
                } else {
                    newest
                };
            }
        }

        let duration = (2.0 * self.ctx.clock.play_delay()).max(0.0);
        if duration > self.tuning.media_newest_threshold_ms {
            FetchRequest::new(path, kind, ReferenceMode::Newest, 0.0, 0.0, epoch)
        } else {
            FetchRequest::new(path, kind, ReferenceMode::Absolute, target, duration, epoch)
                .with_dedupe(dedupe_token(path, got_time, ReferenceMode::Absolute, true, duration))
        }
    }

    fn plan_window(
        &self,
        path: &str,
        kind: MediaKind,
        got_time: Option<Millis>,
        ptime: Millis,
        realtime: bool,
    ) -> Option<FetchRequest> {
        let view = self.view();
        let mut start = match got_time {
            Some(t) => t + self.tuning.epsilon_ms,
            None => self.ctx.session.requested_time.unwrap_or(ptime) - view,
        };

        let span = if realtime {
            let floor = ptime - self.tuning.window_jump_factor * view;
            if start < floor {
                debug!(channel = path, gap = floor - start, "jump ahead");
                start = floor;
            }
            self.tuning.window_span_factor * view
        } else {
            self.base_ms() + ptime - start
        };
        let span = span.min(self.tuning.fetch_cap_factor * view);
        if span <= 0.0 {
            return None;
        }

        Some(
            FetchRequest::new(path, kind, ReferenceMode::Absolute, start, span, self.ctx.session.epoch())
                .with_dedupe(dedupe_token(path, got_time, ReferenceMode::Absolute, realtime, span)),
        )
    }

    fn update_skootch(&mut self, realtime: bool) {
        let play_delay = self.ctx.clock.play_delay();
        let base = self.base_ms();
        if realtime {
            let target = play_delay / 2.0 + base;
            if target < self.skootch {
                self.skootch = (target + self.skootch) / 2.0;
            } else if target - self.skootch > self.view() * self.tuning.skootch_snap_fraction {
                self.skootch = target;
            }
        } else {
            self.skootch = play_delay + base;
        }
    }

    // ------------------------------------------------------------------
    // Completions
    // ------------------------------------------------------------------

    /// Fold a response into the channel state.
    pub fn complete(
        &mut self,
        request: &FetchRequest,
        result: Result<FetchResponse>,
    ) -> CompletionEffect {
        if request.time_only {
            self.complete_probe(request, result);
            return CompletionEffect::default();
        }

        let path = request.channel_path.as_str();
        let mode = self.ctx.session.mode();
        let current = self.ctx.session.is_current(request.epoch);

        let Some(channel) = self.ctx.channels.get_mut(path) else {
            debug!(channel = path, "response for removed channel");
            return CompletionEffect::default();
        };

        if channel.generation != request.generation {
            debug!(channel = path, "response for a previous registration ignored");
            return CompletionEffect {
                late: true,
                ..CompletionEffect::default()
            };
        }

        if !current {
            channel.clear_pending();
            debug!(channel = path, epoch = request.epoch, "late response ignored");
            return CompletionEffect {
                late: true,
                ..CompletionEffect::default()
            };
        }

        let mut effect = CompletionEffect::default();
        match result {
            Ok(FetchResponse::Data { meta, body }) => {
                let payload = Payload::decode(request, &meta, body);
                if channel.apply_data(&meta, payload.latest_time()) {
                    self.advanced = true;
                }
                let newest = channel.observed_newest;

                match meta.newest {
                    Some(value) => self.ctx.window.observe_newest(value),
                    None => effect.probes.push(FetchRequest::limit_probe(
                        path,
                        request.media_kind,
                        ReferenceMode::Newest,
                        request.epoch,
                    )),
                }
                if let Some(oldest) = meta.oldest {
                    let channel_min = self.ctx.channels.min_observed_oldest();
                    self.ctx.window.observe_oldest(
                        oldest,
                        request.reference == ReferenceMode::Oldest,
                        channel_min,
                    );
                }
                debug!(channel = path, ?newest, "data received");
                effect.payload = Some(payload);
            }
            Ok(FetchResponse::NotModified) => {
                channel.mark_not_modified();
                debug!(channel = path, "not modified");
            }
            Ok(FetchResponse::NoData) => {
                channel.mark_none();
                debug!(channel = path, time = request.fetch_time, "no data");
                if mode == PlayMode::Playback {
                    let passed = self
                        .ctx
                        .window
                        .newest()
                        .is_some_and(|newest| request.end_time() >= newest);
                    if passed {
                        self.stop(StopReason::PassedNewest);
                        effect.stopped = Some(StopReason::PassedNewest);
                    }
                }
            }
            Err(e) => {
                channel.mark_none();
                warn!(channel = path, "fetch failed: {}", e);
                if mode.is_running() {
                    self.stop(StopReason::TransportFailure);
                    effect.stopped = Some(StopReason::TransportFailure);
                }
            }
        }
        effect
    }

    fn complete_probe(&mut self, request: &FetchRequest, result: Result<FetchResponse>) {
        let path = request.channel_path.as_str();
        let value = match result {
            Ok(FetchResponse::Data { meta, body }) => parse_time_body(&body).or_else(|e| {
                meta.time.ok_or(e)
            }),
            Ok(other) => {
                debug!(channel = path, reference = request.reference.as_str(), ?other, "limit probe empty");
                return;
            }
            Err(e) => Err(e),
        };

        match value {
            Ok(time) => {
                debug!(channel = path, reference = request.reference.as_str(), time, "limit probe");
                match request.reference {
                    ReferenceMode::Newest => self.ctx.window.observe_limit(Some(time), None),
                    ReferenceMode::Oldest => self.ctx.window.observe_limit(None, Some(time)),
                    _ => {}
                }
            }
            Err(e) => warn!(channel = path, "limit probe failed: {}", e),
        }
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// Time-only requests for the window edges.
    ///
    /// Without forcing, only unknown edges are probed. Forcing the oldest
    /// edge forgets it so the probes re-establish it from scratch.
    pub fn limit_probes(&mut self, force_oldest: bool, force_newest: bool) -> Vec<FetchRequest> {
        let want_newest = force_newest || self.ctx.window.newest().is_none();
        let want_oldest = force_oldest || self.ctx.window.oldest().is_none();
        if force_oldest {
            self.ctx.window.forget_oldest();
        }

        let epoch = self.ctx.session.epoch();
        let mut probes = Vec::new();
        for (_, path) in self.ctx.channels.visit_order() {
            let kind = MediaKind::from_path(&path);
            if want_newest {
                probes.push(FetchRequest::limit_probe(&path, kind, ReferenceMode::Newest, epoch));
            }
            if want_oldest {
                probes.push(FetchRequest::limit_probe(&path, kind, ReferenceMode::Oldest, epoch));
            }
        }
        probes
    }

    /// One-shot fetch of every channel around `time`. Pauses first.
    pub fn refresh(&mut self, time: Millis, reference: ReferenceMode) -> Vec<FetchRequest> {
        self.stop(StopReason::Paused);
        self.ctx.session.step_direction = match reference {
            ReferenceMode::Oldest | ReferenceMode::Prev => StepDirection::Backward,
            ReferenceMode::Newest | ReferenceMode::Next => StepDirection::Forward,
            ReferenceMode::Absolute => StepDirection::None,
        };

        let view = self.view();
        let (time, reference) = self.clamp_reference(time, reference, view);
        self.ctx.session.requested_time = match reference {
            ReferenceMode::Newest => self.ctx.window.newest(),
            ReferenceMode::Oldest => self.ctx.window.oldest().map(|oldest| oldest + view),
            _ => Some(time),
        }
        .or(self.ctx.session.requested_time);

        let epoch = self.ctx.session.epoch();
        let mut requests = Vec::new();
        for (_, path) in self.ctx.channels.visit_order() {
            let Some(channel) = self.ctx.channels.get_mut(&path) else {
                continue;
            };
            if channel.is_pending() {
                debug!(channel = %path, "refresh skipped, request in flight");
                continue;
            }
            let kind = channel.media_kind;
            let duration = if kind.is_frame() { 0.0 } else { view };
            let request = FetchRequest::new(&path, kind, reference, time - duration, duration, epoch)
                .with_dedupe(dedupe_token(&path, channel.got_time, reference, false, duration))
                .for_generation(channel.generation);
            channel.issue();
            requests.push(request);
        }
        info!(reference = reference.as_str(), time, requests = requests.len(), "refresh");
        requests
    }

    fn clamp_reference(
        &self,
        time: Millis,
        reference: ReferenceMode,
        view: Millis,
    ) -> (Millis, ReferenceMode) {
        if reference != ReferenceMode::Absolute {
            return (time, reference);
        }
        if self.ctx.window.newest().is_some_and(|newest| time > newest) {
            return (0.0, ReferenceMode::Newest);
        }
        if self.ctx.window.oldest().is_some_and(|oldest| time - view < oldest) {
            return (0.0, ReferenceMode::Oldest);
        }
        (time, reference)
    }

    /// Step one frame from the first channel of a group.
    ///
    /// `reference` is [`ReferenceMode::Next`] or [`ReferenceMode::Prev`].
    /// Without data in that channel the step starts at the oldest edge.
    pub fn step(&mut self, group: usize, reference: ReferenceMode) -> Vec<FetchRequest> {
        let anchor = self
            .ctx
            .channels
            .groups()
            .get(group)
            .and_then(|g| g.paths.first())
            .and_then(|path| self.ctx.channels.get(path))
            .and_then(|channel| channel.got_time)
            .filter(|t| *t >= 1.0);

        match anchor {
            Some(time) => self.refresh(time, reference),
            None => self.refresh(0.0, ReferenceMode::Oldest),
        }
    }

    /// Jump to a slider position between `oldest + view` and `newest`.
    pub fn go_to_percent(&mut self, percent: f64) -> Vec<FetchRequest> {
        match self.ctx.window.time_at_percent(percent, self.view()) {
            Some(time) => self.refresh(time, ReferenceMode::Absolute),
            None => {
                warn!(percent, "newest data unknown, cannot seek");
                Vec::new()
            }
        }
    }

    pub fn go_oldest(&mut self) -> Vec<FetchRequest> {
        self.refresh(0.0, ReferenceMode::Oldest)
    }

    pub fn go_newest(&mut self) -> Vec<FetchRequest> {
        self.refresh(0.0, ReferenceMode::Newest)
    }

    /// Timestamp line for the current requested time
    pub fn time_label(&self) -> Option<String> {
        let time = self.ctx.session.requested_time?;
        sink::time_label(
            time,
            self.view(),
            self.ctx.session.mode(),
            self.ctx.clock.wall_now(),
        )
    }

    /// Slider position of the current requested time
    pub fn position_percent(&self) -> Option<f64> {
        let time = self.ctx.session.requested_time?;
        self.ctx.window.position_percent(time, self.view())
    }
}

/// Conditional request token sent as `If-None-Match`.
///
/// Only absolute requests for a channel that already holds data qualify, and
/// only in real time or for a single frame.
fn dedupe_token(
    path: &str,
    got_time: Option<Millis>,
    reference: ReferenceMode,
    realtime: bool,
    duration: Millis,
) -> Option<String> {
    let got_time = got_time?;
    (reference == ReferenceMode::Absolute && (realtime || duration == 0.0))
        .then(|| format!("{}:{}", path, got_time))
}

/// Parse a time-only response body (float seconds) into milliseconds
pub fn parse_time_body(body: &[u8]) -> Result<Millis> {
    let text = String::from_utf8_lossy(body);
    let trimmed = text.trim();
    match trimmed.parse::<f64>() {
        Ok(seconds) if seconds.is_finite() => Ok(seconds * 1000.0),
        _ => Err(Error::InvalidTime(trimmed.to_string())),
    }
}

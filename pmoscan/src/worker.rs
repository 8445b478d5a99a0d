//! Background worker driving a [`FetchScheduler`].
//!
//! One tokio task owns the scheduler, so no state is shared or locked. The
//! task waits on three things at once: commands from a [`ScanHandle`],
//! completions sent back by detached fetch tasks, and the single scheduled
//! tick. Re-arming replaces the tick; pausing drops it.

use crate::error::{Error, Result};
use crate::models::{FetchRequest, FetchResponse, Millis, ReferenceMode};
use crate::scheduler::{FetchScheduler, NextTick, SchedulerSnapshot, StopReason};
use crate::session::PlayMode;
use crate::sink::DataSink;
use crate::transport::Transport;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Sleep};
use tracing::{debug, info, warn};

/// Commands sent to the background worker.
#[derive(Debug)]
pub enum ScanCommand {
    AddChannel { group: String, path: String },
    RemoveChannel { path: String },
    ClearGroup { group: String },
    StartRealTime,
    StartPlayback { from: Option<Millis> },
    Pause,
    Refresh { time: Millis, reference: ReferenceMode },
    Step { group: usize, reference: ReferenceMode },
    GoToPercent { percent: f64 },
    GoOldest,
    GoNewest,
    ProbeLimits { force_oldest: bool, force_newest: bool },
    SetViewDuration { millis: Millis },
    ResetWindow,
    Snapshot { reply: oneshot::Sender<SchedulerSnapshot> },
    Shutdown,
}

/// A finished fetch, sent back to the worker loop
#[derive(Debug)]
struct Completion {
    request: FetchRequest,
    result: Result<FetchResponse>,
}

/// Handle to the spawned worker task.
pub struct ScanWorker {
    join_handle: JoinHandle<()>,
}

impl ScanWorker {
    pub fn spawn(
        scheduler: FetchScheduler,
        transport: Arc<dyn Transport>,
        sink: Box<dyn DataSink>,
    ) -> (Self, ScanHandle) {
        let (tx, mut rx) = mpsc::channel(32);
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();

        let join_handle = tokio::spawn(async move {
            info!("Starting scan worker");
            let mut state = WorkerState {
                scheduler,
                transport,
                sink,
                done_tx,
                scheduled_tick: None,
                shutdown: false,
            };

            loop {
                let event = if let Some(tick) = state.scheduled_tick.as_mut() {
                    tokio::select! {
                        cmd = rx.recv() => Event::Command(cmd),
                        Some(done) = done_rx.recv() => Event::Completion(done),
                        _ = tick => Event::Tick,
                    }
                } else {
                    tokio::select! {
                        cmd = rx.recv() => Event::Command(cmd),
                        Some(done) = done_rx.recv() => Event::Completion(done),
                    }
                };

                match event {
                    Event::Command(Some(cmd)) => {
                        state.handle_command(cmd);
                        if state.shutdown {
                            break;
                        }
                    }
                    // Every handle dropped, terminate
                    Event::Command(None) => break,
                    Event::Completion(done) => state.handle_completion(done),
                    Event::Tick => {
                        state.scheduled_tick = None;
                        state.run_tick();
                    }
                }
            }

            info!("Scan worker stopped");
        });

        (Self { join_handle }, ScanHandle { tx })
    }

    pub async fn wait(self) -> Result<()> {
        if let Err(err) = self.join_handle.await {
            if err.is_cancelled() {
                warn!("Scan worker task cancelled: {err}");
                return Ok(());
            }
            return Err(Error::other(format!("Scan worker panicked: {err}")));
        }
        Ok(())
    }
}

enum Event {
    Command(Option<ScanCommand>),
    Completion(Completion),
    Tick,
}

struct WorkerState {
    scheduler: FetchScheduler,
    transport: Arc<dyn Transport>,
    sink: Box<dyn DataSink>,
    done_tx: mpsc::UnboundedSender<Completion>,
    scheduled_tick: Option<Pin<Box<Sleep>>>,
    shutdown: bool,
}

impl WorkerState {
    fn handle_command(&mut self, cmd: ScanCommand) {
        debug!(?cmd, "scan command");
        let was_running = self.scheduler.mode().is_running();

        match cmd {
            ScanCommand::AddChannel { group, path } => {
                self.scheduler.add_channel(&group, &path);
            }
            ScanCommand::RemoveChannel { path } => {
                if let Err(err) = self.scheduler.remove_channel(&path) {
                    warn!("{err}");
                }
            }
            ScanCommand::ClearGroup { group } => {
                if !self.scheduler.clear_group(&group) {
                    warn!(group, "unknown display group");
                }
            }
            ScanCommand::StartRealTime => {
                let probes = self.scheduler.start_realtime();
                self.dispatch(probes);
                self.schedule_tick(Duration::ZERO);
                self.sink.on_mode(PlayMode::RealTime, None);
            }
            ScanCommand::StartPlayback { from } => {
                let probes = self.scheduler.start_playback(from);
                self.dispatch(probes);
                self.schedule_tick(Duration::ZERO);
                self.sink.on_mode(PlayMode::Playback, None);
            }
            ScanCommand::Pause => {
                self.scheduler.pause();
            }
            ScanCommand::Refresh { time, reference } => {
                let requests = self.scheduler.refresh(time, reference);
                self.dispatch(requests);
            }
            ScanCommand::Step { group, reference } => {
                let requests = self.scheduler.step(group, reference);
                self.dispatch(requests);
            }
            ScanCommand::GoToPercent { percent } => {
                let requests = self.scheduler.go_to_percent(percent);
                self.dispatch(requests);
            }
            ScanCommand::GoOldest => {
                let requests = self.scheduler.go_oldest();
                self.dispatch(requests);
            }
            ScanCommand::GoNewest => {
                let requests = self.scheduler.go_newest();
                self.dispatch(requests);
            }
            ScanCommand::ProbeLimits {
                force_oldest,
                force_newest,
            } => {
                let probes = self.scheduler.limit_probes(force_oldest, force_newest);
                self.dispatch(probes);
            }
            ScanCommand::SetViewDuration { millis } => {
                self.scheduler.set_view_duration(millis);
            }
            ScanCommand::ResetWindow => {
                self.scheduler.reset_window();
            }
            ScanCommand::Snapshot { reply } => {
                let _ = reply.send(self.scheduler.snapshot());
            }
            ScanCommand::Shutdown => {
                self.scheduler.pause();
                self.shutdown = true;
            }
        }

        if was_running && !self.scheduler.mode().is_running() {
            self.cancel_tick();
            self.sink.on_mode(PlayMode::Pause, Some(StopReason::Paused));
        }
    }

    fn handle_completion(&mut self, done: Completion) {
        let path = done.request.channel_path.clone();
        let effect = self.scheduler.complete(&done.request, done.result);

        if let Some(payload) = effect.payload {
            self.sink.on_payload(&path, payload);
        }
        self.dispatch(effect.probes);
        if let Some(reason) = effect.stopped {
            self.cancel_tick();
            self.sink.on_mode(PlayMode::Pause, Some(reason));
        }
    }

    fn run_tick(&mut self) {
        let outcome = self.scheduler.tick();

        for (group, delay) in &outcome.display_delays {
            self.sink.on_display_delay(group, *delay);
        }
        if let Some(time) = outcome.play_time {
            self.sink.on_time(time, self.scheduler.mode());
        }
        self.dispatch(outcome.requests);

        match outcome.next {
            NextTick::After(delay) => self.schedule_tick(delay),
            NextTick::Stop(reason) => {
                self.cancel_tick();
                self.sink.on_mode(PlayMode::Pause, Some(reason));
            }
        }
    }

    /// Run each request on its own task; results come back as completions.
    fn dispatch(&self, requests: Vec<FetchRequest>) {
        for request in requests {
            let transport = Arc::clone(&self.transport);
            let done_tx = self.done_tx.clone();
            tokio::spawn(async move {
                let result = transport.fetch(&request).await;
                // The worker may have shut down meanwhile
                let _ = done_tx.send(Completion { request, result });
            });
        }
    }

    fn schedule_tick(&mut self, delay: Duration) {
        self.scheduled_tick = Some(Box::pin(sleep(delay)));
    }

    fn cancel_tick(&mut self) {
        self.scheduled_tick = None;
    }
}

/// Typed sender for [`ScanCommand`]s.
#[derive(Debug, Clone)]
pub struct ScanHandle {
    tx: mpsc::Sender<ScanCommand>,
}

impl ScanHandle {
    pub async fn send(&self, cmd: ScanCommand) -> Result<()> {
        self.tx.send(cmd).await.map_err(|_| Error::WorkerClosed)
    }

    pub async fn add_channel(&self, group: impl Into<String>, path: impl Into<String>) -> Result<()> {
        self.send(ScanCommand::AddChannel {
            group: group.into(),
            path: path.into(),
        })
        .await
    }

    pub async fn remove_channel(&self, path: impl Into<String>) -> Result<()> {
        self.send(ScanCommand::RemoveChannel { path: path.into() }).await
    }

    pub async fn clear_group(&self, group: impl Into<String>) -> Result<()> {
        self.send(ScanCommand::ClearGroup { group: group.into() }).await
    }

    pub async fn start_realtime(&self) -> Result<()> {
        self.send(ScanCommand::StartRealTime).await
    }

    pub async fn start_playback(&self, from: Option<Millis>) -> Result<()> {
        self.send(ScanCommand::StartPlayback { from }).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.send(ScanCommand::Pause).await
    }

    pub async fn refresh(&self, time: Millis, reference: ReferenceMode) -> Result<()> {
        self.send(ScanCommand::Refresh { time, reference }).await
    }

    pub async fn step(&self, group: usize, reference: ReferenceMode) -> Result<()> {
        self.send(ScanCommand::Step { group, reference }).await
    }

    pub async fn go_to_percent(&self, percent: f64) -> Result<()> {
        self.send(ScanCommand::GoToPercent { percent }).await
    }

    pub async fn go_oldest(&self) -> Result<()> {
        self.send(ScanCommand::GoOldest).await
    }

    pub async fn go_newest(&self) -> Result<()> {
        self.send(ScanCommand::GoNewest).await
    }

    pub async fn probe_limits(&self, force_oldest: bool, force_newest: bool) -> Result<()> {
        self.send(ScanCommand::ProbeLimits {
            force_oldest,
            force_newest,
        })
        .await
    }

    pub async fn set_view_duration(&self, millis: Millis) -> Result<()> {
        self.send(ScanCommand::SetViewDuration { millis }).await
    }

    pub async fn reset_window(&self) -> Result<()> {
        self.send(ScanCommand::ResetWindow).await
    }

    /// Copy of the scheduler state as seen by the worker
    pub async fn snapshot(&self) -> Result<SchedulerSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(ScanCommand::Snapshot { reply }).await?;
        rx.await.map_err(|_| Error::WorkerClosed)
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.send(ScanCommand::Shutdown).await
    }
}

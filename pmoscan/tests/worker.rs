//! ScanWorker driven end to end against a scripted in-memory server.
//!
//! Tokio time is paused, so sleeps advance virtually and the wall clock
//! handed to the scheduler follows the same virtual time.

use async_trait::async_trait;
use pmoscan::{
    ChannelStatus, Error, FetchRequest, FetchResponse, FetchScheduler, Millis, Payload, PlayMode,
    RecordingSink, ReferenceMode, ResponseMeta, ScanConfig, ScanHandle, ScanWorker, SinkEvent,
    StopReason, Transport, WallClock,
};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{sleep, Instant};

const T0: Millis = 1_700_000_000_000.0;
const OLDEST: Millis = T0 - 3_600_000.0;

/// Wall clock following tokio's (virtual) time
#[derive(Debug)]
struct TokioClock {
    origin: Instant,
}

impl TokioClock {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            origin: Instant::now(),
        })
    }
}

impl WallClock for TokioClock {
    fn now_ms(&self) -> Millis {
        T0 + self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

type Responder = Box<dyn Fn(&FetchRequest) -> pmoscan::Result<FetchResponse> + Send + Sync>;

struct ScriptedTransport {
    respond: Responder,
    latency: Duration,
    log: Mutex<Vec<FetchRequest>>,
}

impl ScriptedTransport {
    fn new(latency: Duration, respond: Responder) -> Arc<Self> {
        Arc::new(Self {
            respond,
            latency,
            log: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<FetchRequest> {
        self.log.lock().unwrap().clone()
    }

    fn data_requests(&self) -> Vec<FetchRequest> {
        self.requests().into_iter().filter(|r| !r.time_only).collect()
    }
}

impl fmt::Debug for ScriptedTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedTransport")
            .field("latency", &self.latency)
            .finish()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn fetch(&self, request: &FetchRequest) -> pmoscan::Result<FetchResponse> {
        self.log.lock().unwrap().push(request.clone());
        if !self.latency.is_zero() {
            sleep(self.latency).await;
        }
        (self.respond)(request)
    }
}

fn seconds_body(millis: Millis) -> Vec<u8> {
    format!("{}", millis / 1000.0).into_bytes()
}

/// A source whose newest sample trails the wall clock by 500 ms
fn live_source(clock: Arc<TokioClock>) -> Responder {
    Box::new(move |request| {
        let newest = clock.now_ms() - 500.0;
        if request.time_only {
            let time = match request.reference {
                ReferenceMode::Oldest => OLDEST,
                _ => newest,
            };
            return Ok(FetchResponse::Data {
                meta: ResponseMeta::default(),
                body: seconds_body(time),
            });
        }
        Ok(FetchResponse::Data {
            meta: ResponseMeta {
                time: Some(newest),
                duration: Some(0.0),
                oldest: Some(OLDEST),
                newest: Some(newest),
                lag_time: None,
            },
            body: format!("{},1\n", newest / 1000.0).into_bytes(),
        })
    })
}

/// A finished recording whose last sample is at `T0`
fn archive_source() -> Responder {
    Box::new(|request| {
        if request.time_only {
            let time = match request.reference {
                ReferenceMode::Oldest => OLDEST,
                _ => T0,
            };
            return Ok(FetchResponse::Data {
                meta: ResponseMeta::default(),
                body: seconds_body(time),
            });
        }
        let time = request.end_time().min(T0);
        Ok(FetchResponse::Data {
            meta: ResponseMeta {
                time: Some(time),
                duration: Some(0.0),
                oldest: Some(OLDEST),
                newest: Some(T0),
                lag_time: None,
            },
            body: format!("{},1\n", time / 1000.0).into_bytes(),
        })
    })
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("pmoscan=debug")
        .with_test_writer()
        .try_init();
}

fn spawn(
    clock: Arc<TokioClock>,
    transport: Arc<ScriptedTransport>,
) -> (ScanWorker, ScanHandle, RecordingSink) {
    init_tracing();
    let mut config = ScanConfig::default();
    config.playback.view_duration_ms = 1_000.0;
    let scheduler = FetchScheduler::new(&config, clock);
    let sink = RecordingSink::new();
    let (worker, handle) = ScanWorker::spawn(scheduler, transport, Box::new(sink.clone()));
    (worker, handle, sink)
}

#[tokio::test(start_paused = true)]
async fn test_realtime_tracks_live_source() {
    let clock = TokioClock::new();
    let transport = ScriptedTransport::new(Duration::ZERO, live_source(clock.clone()));
    let (worker, handle, sink) = spawn(clock, transport.clone());

    handle.add_channel("plot", "src/temp.csv").await.unwrap();
    handle.start_realtime().await.unwrap();
    sleep(Duration::from_millis(5_500)).await;

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.mode, PlayMode::RealTime);
    assert!(snapshot.newest.is_some());
    assert_eq!(snapshot.oldest, Some(OLDEST));
    assert!(snapshot.channel("src/temp.csv").unwrap().got_time.is_some());
    // The play clock trails the source by its lag plus at most one tick
    assert!(snapshot.play_delay >= 500.0 && snapshot.play_delay <= 2_000.0);
    assert_eq!(snapshot.backoff.consecutive_stale_ticks, 0);

    assert!(sink.payloads("src/temp.csv").len() >= 4);
    assert!(matches!(
        sink.payloads("src/temp.csv")[0],
        Payload::Scalar { ref samples } if samples.len() == 1
    ));
    assert!(sink
        .events()
        .iter()
        .any(|e| matches!(e, SinkEvent::DisplayDelay { group, .. } if group == "plot")));
    assert_eq!(sink.modes()[0], (PlayMode::RealTime, None));

    // At most one outstanding request: one data request per window tick
    assert!(transport.data_requests().len() <= 7);

    handle.shutdown().await.unwrap();
    worker.wait().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_frames_tick_faster_than_scalars() {
    let clock = TokioClock::new();
    let transport = ScriptedTransport::new(Duration::ZERO, live_source(clock.clone()));
    let (worker, handle, sink) = spawn(clock, transport.clone());

    handle.add_channel("plot1", "src/temp.csv").await.unwrap();
    handle.add_channel("plot2", "src/cam.jpg").await.unwrap();
    handle.start_realtime().await.unwrap();
    sleep(Duration::from_millis(2_050)).await;

    let requests = transport.data_requests();
    let frames = requests.iter().filter(|r| r.channel_path == "src/cam.jpg").count();
    let scalars = requests.iter().filter(|r| r.channel_path == "src/temp.csv").count();
    assert!(scalars <= 3, "scalars: {scalars}");
    assert!(frames >= 10, "frames: {frames}");
    assert!(!sink.payloads("src/cam.jpg").is_empty());

    handle.shutdown().await.unwrap();
    worker.wait().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_transport_failure_pauses() {
    let clock = TokioClock::new();
    let transport = ScriptedTransport::new(
        Duration::ZERO,
        Box::new(|_| Err(Error::Status(500))),
    );
    let (worker, handle, sink) = spawn(clock, transport.clone());

    handle.add_channel("plot", "src/temp.csv").await.unwrap();
    handle.start_realtime().await.unwrap();
    sleep(Duration::from_secs(3)).await;

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.mode, PlayMode::Pause);
    assert_eq!(snapshot.channel("src/temp.csv").unwrap().status, ChannelStatus::None);
    assert!(sink
        .modes()
        .contains(&(PlayMode::Pause, Some(StopReason::TransportFailure))));

    // Nothing is scheduled any more
    let before = transport.data_requests().len();
    sleep(Duration::from_secs(5)).await;
    assert_eq!(transport.data_requests().len(), before);

    handle.shutdown().await.unwrap();
    worker.wait().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_playback_stops_at_newest() {
    let clock = TokioClock::new();
    let transport = ScriptedTransport::new(Duration::ZERO, archive_source());
    let (worker, handle, sink) = spawn(clock, transport);

    handle.add_channel("plot", "src/temp.csv").await.unwrap();
    handle.probe_limits(false, false).await.unwrap();
    sleep(Duration::from_millis(10)).await;
    assert_eq!(handle.snapshot().await.unwrap().newest, Some(T0));

    handle.start_playback(Some(T0 - 3_000.0)).await.unwrap();
    sleep(Duration::from_secs(10)).await;

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.mode, PlayMode::Pause);
    assert_eq!(
        sink.modes().last(),
        Some(&(PlayMode::Pause, Some(StopReason::ReachedNewest)))
    );
    assert_eq!(snapshot.channel("src/temp.csv").unwrap().got_time, Some(T0));

    handle.shutdown().await.unwrap();
    worker.wait().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_late_responses_after_pause_are_inert() {
    let clock = TokioClock::new();
    let transport = ScriptedTransport::new(Duration::from_secs(2), live_source(clock.clone()));
    let (worker, handle, sink) = spawn(clock, transport);

    handle.add_channel("plot", "src/temp.csv").await.unwrap();
    handle.start_realtime().await.unwrap();
    sleep(Duration::from_millis(100)).await;
    assert!(handle
        .snapshot()
        .await
        .unwrap()
        .channel("src/temp.csv")
        .unwrap()
        .is_pending());

    handle.pause().await.unwrap();
    sleep(Duration::from_secs(5)).await;

    let snapshot = handle.snapshot().await.unwrap();
    let channel = snapshot.channel("src/temp.csv").unwrap();
    assert_eq!(snapshot.mode, PlayMode::Pause);
    assert_eq!(channel.status, ChannelStatus::None);
    assert_eq!(channel.got_time, None);
    assert!(sink.payloads("src/temp.csv").is_empty());
    assert_eq!(
        sink.modes().last(),
        Some(&(PlayMode::Pause, Some(StopReason::Paused)))
    );

    handle.shutdown().await.unwrap();
    worker.wait().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_refresh_while_paused() {
    let clock = TokioClock::new();
    let transport = ScriptedTransport::new(Duration::ZERO, archive_source());
    let (worker, handle, sink) = spawn(clock, transport.clone());

    handle.add_channel("plot", "src/temp.csv").await.unwrap();
    handle.add_channel("plot", "src/cam.jpg").await.unwrap();
    handle.probe_limits(false, false).await.unwrap();
    sleep(Duration::from_millis(10)).await;

    handle.refresh(T0 - 5_000.0, ReferenceMode::Absolute).await.unwrap();
    sleep(Duration::from_millis(10)).await;

    let data = transport.data_requests();
    let scalar = data.iter().find(|r| r.channel_path == "src/temp.csv").unwrap();
    let frame = data.iter().find(|r| r.channel_path == "src/cam.jpg").unwrap();
    assert_eq!(scalar.fetch_time, T0 - 6_000.0);
    assert_eq!(scalar.fetch_duration, 1_000.0);
    assert_eq!(frame.fetch_time, T0 - 5_000.0);
    assert_eq!(frame.fetch_duration, 0.0);

    assert_eq!(sink.payloads("src/temp.csv").len(), 1);
    assert_eq!(sink.payloads("src/cam.jpg").len(), 1);
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.mode, PlayMode::Pause);
    assert_eq!(snapshot.requested_time, Some(T0 - 5_000.0));

    // Past the newest data the refresh asks for the newest instead
    handle.refresh(T0 + 60_000.0, ReferenceMode::Absolute).await.unwrap();
    sleep(Duration::from_millis(10)).await;
    let last = transport.data_requests().last().cloned().unwrap();
    assert_eq!(last.reference, ReferenceMode::Newest);

    handle.shutdown().await.unwrap();
    worker.wait().await.unwrap();
}

#[tokio::test]
async fn test_handle_fails_after_shutdown() {
    let clock = TokioClock::new();
    let transport = ScriptedTransport::new(Duration::ZERO, archive_source());
    let (worker, handle, _sink) = spawn(clock, transport);

    handle.shutdown().await.unwrap();
    worker.wait().await.unwrap();
    assert!(matches!(handle.pause().await, Err(Error::WorkerClosed)));
}

//! Adaptive fetch scheduler for time-indexed data channels
//!
//! This crate keeps many heterogeneous channels (scalar time series,
//! periodic images, audio chunks, text blobs) fetched from a remote
//! time-indexed data server aligned on a single play clock, both live
//! ("real time") and over history ("playback").
//!
//! # Features
//!
//! - **Single-owner scheduler**: [`FetchScheduler`] holds all state and
//!   performs no I/O, so every decision is testable with a [`ManualClock`]
//! - **Adaptive pacing**: frame channels tick faster than window channels,
//!   stale ticks back off tier by tier and finally pause
//! - **Lag tracking**: in real time the play clock re-anchors on the newest
//!   data the server reports
//! - **HTTP transport**: [`HttpTransport`] speaks the servlet query protocol
//!   with conditional requests
//! - **Async worker**: [`ScanWorker`] drives the scheduler on tokio and
//!   hands decoded payloads to a [`DataSink`]
//! - **Configuration Extension**: [`ScanConfigExt`] on `pmoconfig::Config`
//!
//! # Example
//!
//! ```no_run
//! use pmoscan::{FetchScheduler, HttpTransport, ScanConfig, ScanWorker, SystemClock, TracingSink};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ScanConfig::default();
//!     let transport = HttpTransport::from_config(&config.server).await?;
//!     let scheduler = FetchScheduler::new(&config, Arc::new(SystemClock));
//!     let sink = TracingSink::new(config.playback.view_duration_ms);
//!
//!     let (worker, handle) = ScanWorker::spawn(scheduler, Arc::new(transport), Box::new(sink));
//!     handle.add_channel("plot1", "mysource/temperature.csv").await?;
//!     handle.add_channel("plot2", "mysource/webcam.jpg").await?;
//!     handle.start_realtime().await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     handle.shutdown().await?;
//!     worker.wait().await?;
//!     Ok(())
//! }
//! ```

pub mod backoff;
pub mod channel;
pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod scheduler;
pub mod session;
pub mod sink;
pub mod time_window;
pub mod transport;
pub mod worker;

#[cfg(feature = "pmoconfig")]
pub mod config_ext;

// Re-exports
pub use backoff::{BackoffController, BackoffDecision, BackoffState};
pub use channel::{Channel, ChannelRegistry, ChannelStatus, DisplayGroup};
pub use clock::{ManualClock, PlayClock, SystemClock, WallClock};
pub use config::{
    BackoffConfig, BackoffTier, GroupConfig, PlaybackConfig, ScanConfig, ScanTuning, ServerConfig,
    StartMode,
};
pub use error::{Error, Result};
pub use models::{
    FetchPolicy, FetchRequest, FetchResponse, MediaKind, Millis, ReferenceMode, ResponseMeta,
};
pub use scheduler::{
    CompletionEffect, FetchScheduler, NextTick, SchedulerContext, SchedulerSnapshot, StopReason,
    TickOutcome,
};
pub use session::{PlayMode, PlaybackSession, StepDirection};
pub use sink::{DataSink, Payload, RecordingSink, Sample, SinkEvent, TracingSink};
pub use time_window::TimeWindowTracker;
pub use transport::{HttpTransport, Transport, TransportBuilder};
pub use worker::{ScanCommand, ScanHandle, ScanWorker};

#[cfg(feature = "pmoconfig")]
pub use config_ext::ScanConfigExt;

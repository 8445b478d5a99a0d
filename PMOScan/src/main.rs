use pmoconfig::get_config;
use pmoscan::{
    FetchScheduler, HttpTransport, ScanConfig, ScanWorker, StartMode, SystemClock, TracingSink,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(min_level: &str) {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(min_level.to_ascii_lowercase()));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ========== Configuration ==========
    let config = get_config();
    if config.get_log_enable_console()? {
        init_logging(&config.get_log_min_level()?);
    }

    let scan = ScanConfig::from_pmoconfig(&config);
    info!(
        server = %scan.server.base_url,
        groups = scan.groups.len(),
        "Configuration loaded from {}",
        config.directory()
    );

    // ========== Worker ==========
    let transport = HttpTransport::from_config(&scan.server).await?;
    let scheduler = FetchScheduler::new(&scan, Arc::new(SystemClock));
    let sink = TracingSink::new(scan.playback.view_duration_ms);
    let (worker, handle) = ScanWorker::spawn(scheduler, Arc::new(transport), Box::new(sink));

    let mut channels = 0;
    for group in &scan.groups {
        for path in &group.channels {
            handle.add_channel(group.name.as_str(), path.as_str()).await?;
            channels += 1;
        }
    }
    if channels == 0 {
        warn!("No channels configured under scan.groups, nothing to fetch");
    }

    match scan.playback.start_mode {
        StartMode::Realtime => handle.start_realtime().await?,
        StartMode::Playback => {
            handle.probe_limits(false, false).await?;
            handle.start_playback(None).await?;
        }
        StartMode::Pause => handle.probe_limits(false, false).await?,
    }

    info!("✅ PMOScan is running ({} channel(s))", channels);
    info!("Press Ctrl+C to stop...");

    // ========== Shutdown ==========
    tokio::signal::ctrl_c().await?;
    info!("Stopping...");
    handle.shutdown().await?;
    worker.wait().await?;

    Ok(())
}

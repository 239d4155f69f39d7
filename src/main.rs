//! Fallwatch: webcam frames to a fall-detection server, boxes back onto a canvas

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use color_eyre::Result;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use fallwatch::alert::CommandAlert;
use fallwatch::capture::{self, FrameFeed};
use fallwatch::detect::HttpDetector;
use fallwatch::sink::ChannelText;
use fallwatch::surface::Canvas;
use fallwatch::{Config, Pipeline};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling and logging
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fallwatch=info")),
        )
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();

    info!("Fallwatch launching...");

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("fallwatch.toml"));
    let config = Config::load(Some(&config_path))?;

    // No camera means no pipeline, and nothing else to do
    let source = match capture::open_source(&config.capture) {
        Ok(source) => source,
        Err(e) => {
            error!("Error accessing webcam: {:#}", e);
            return Ok(());
        }
    };
    let feed = FrameFeed::spawn(source)?;

    let canvas = Arc::new(Mutex::new(Canvas::new(
        config.canvas.width,
        config.canvas.height,
        config.canvas.jpeg_quality,
    )));
    let (text, results) = ChannelText::new();

    let pipeline = Pipeline::new(
        canvas.clone(),
        Arc::new(text),
        Arc::new(CommandAlert::new(&config.alert)),
        Arc::new(HttpDetector::new()),
    )
    .with_overlap(config.pipeline.overlap);

    let _printer = tokio::spawn(async move {
        while let Ok(line) = results.recv_async().await {
            info!(target: "fallwatch::result", "{}", line);
            println!("{}", line);
        }
    });

    if let Some(path) = config.canvas.snapshot_path.clone() {
        let canvas = canvas.clone();
        let period = Duration::from_millis(config.canvas.snapshot_interval_ms.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                // Copy out so the disk write does not hold up capture ticks
                let snapshot = canvas
                    .lock()
                    .map(|canvas| canvas.clone())
                    .map_err(|_| ());
                let saved = match snapshot {
                    Ok(snapshot) => snapshot.save(&path).map_err(|e| e.to_string()),
                    Err(_) => Err("canvas lock poisoned".to_string()),
                };
                if let Err(e) = saved {
                    error!("Failed to save snapshot to {}: {}", path.display(), e);
                }
            }
        });
    }

    let interval = Duration::from_millis(config.pipeline.capture_interval_ms);
    tokio::select! {
        res = pipeline.run(feed, interval) => res?,
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
    }

    info!("Fallwatch shutting down");
    Ok(())
}

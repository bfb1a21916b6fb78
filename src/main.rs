//! Replays a recorded detector session through the game engine and prints
//! the final roster and timing summary.
//!
//! Usage: mugunghwa <session.jsonl>

use std::fs::File;
use std::io::BufReader;
use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};

use mugunghwa::announcer::PacedAnnouncer;
use mugunghwa::frame_loop::FRAME_QUEUE_CAPACITY;
use mugunghwa::metrics::MetricsRegistry;
use mugunghwa::replay::{parse_replay, run_replay};
use mugunghwa::{run_frame_loop, EventSink, FrameFeed, GameController};

#[tokio::main]
async fn main() -> ExitCode {
    mugunghwa::init_tracing();

    let Some(path) = std::env::args().nth(1) else {
        eprintln!("usage: mugunghwa <session.jsonl>");
        return ExitCode::from(2);
    };

    let lines = match File::open(&path)
        .map_err(mugunghwa::replay::ReplayError::from)
        .and_then(|f| parse_replay(BufReader::new(f)))
    {
        Ok(lines) => lines,
        Err(e) => {
            error!(error = %e, path = %path, "failed to read session");
            return ExitCode::FAILURE;
        }
    };

    let config = mugunghwa::load_config();
    let (sink, events) = EventSink::channel();
    let controller = GameController::new(
        config,
        Arc::new(PacedAnnouncer::default()),
        sink,
        Arc::new(MetricsRegistry::new()),
    );

    std::thread::Builder::new()
        .name("event-log".into())
        .spawn(move || {
            for event in events.iter() {
                match serde_json::to_string(&event) {
                    Ok(json) => info!(event = %json, "ui_event"),
                    Err(e) => error!(error = %e, "event serialization failed"),
                }
            }
        })
        .ok();

    let feed = FrameFeed::new(FRAME_QUEUE_CAPACITY);
    let frame_thread = match run_frame_loop(feed.receiver(), Arc::clone(&controller)) {
        Ok(handle) => handle,
        Err(e) => {
            error!(error = %e, "failed to spawn frame loop");
            return ExitCode::FAILURE;
        }
    };

    let summary = run_replay(&lines, &controller, &feed).await;
    drop(feed);
    match tokio::task::spawn_blocking(move || frame_thread.join()).await {
        Ok(Ok(_)) => {}
        Ok(Err(_)) => {
            error!("frame loop panicked");
            return ExitCode::FAILURE;
        }
        Err(e) => {
            error!(error = %e, "frame loop join task failed");
            return ExitCode::FAILURE;
        }
    }
    controller.stop_game();

    let report = serde_json::json!({
        "frames_submitted": summary.frames_submitted,
        "frames_dropped": summary.frames_dropped,
        "roster": controller.roster(),
        "metrics": controller.metrics().summary(),
    });
    match serde_json::to_string_pretty(&report) {
        Ok(text) => println!("{text}"),
        Err(e) => {
            error!(error = %e, "report serialization failed");
            return ExitCode::FAILURE;
        }
    }
    ExitCode::SUCCESS
}

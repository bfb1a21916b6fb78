//! Mugunghwa: red light / green light game engine.
//! Tracks players from pose-detector frames, runs the phase loop, and reports
//! eliminations. Capture, rendering and speech stay with the caller.

pub mod announcer;
pub mod cancellation;
pub mod config;
pub mod events;
pub mod frame_loop;
pub mod game;
pub mod metrics;
pub mod pose;
pub mod replay;
pub mod state_machine;
pub mod tracker;

use std::path::PathBuf;

use tracing::{info, warn};

pub use config::{ConfigError, GameConfig};
pub use events::{EventSink, GameEvent, GameOutcome};
pub use frame_loop::{run_frame_loop, Frame, FrameFeed};
pub use game::GameController;
pub use pose::{measure_movement, Landmark, LandmarkKind, Pose};
pub use state_machine::GamePhase;
pub use tracker::{FrameReport, GameState, PlayerId, PlayerSlot};

/// Environment variable naming the JSON config file.
pub const CONFIG_ENV: &str = "MUGUNGHWA_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "mugunghwa.json";

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// filter; `MUGUNGHWA_LOG_JSON=1` switches to JSON lines.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("mugunghwa=debug"));
    let json = std::env::var("MUGUNGHWA_LOG_JSON").is_ok_and(|v| v == "1");

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true);
    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if result.is_err() {
        warn!("tracing subscriber already installed");
    }
}

/// Load the game config from `$MUGUNGHWA_CONFIG` (or `mugunghwa.json`),
/// falling back to defaults when the file is missing or unusable.
pub fn load_config() -> GameConfig {
    let path = std::env::var(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    match GameConfig::load_from_file(&path) {
        Ok(config) => {
            info!(path = %path.display(), "config loaded");
            config
        }
        Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "no config file, using defaults");
            GameConfig::default()
        }
        Err(e) => {
            warn!(error = %e, path = %path.display(), "config load failed, using defaults");
            GameConfig::default()
        }
    }
}

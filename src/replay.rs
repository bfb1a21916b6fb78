//! Recorded detector sessions in JSON lines, replayed in real time.
//!
//! Each line is either a frame
//! `{"t": 33, "width": 1280, "height": 720, "poses": [{"keypoints": [...]}]}`
//! or a host action `{"t": 0, "control": "start"}`. `t` is milliseconds from
//! the start of the recording. Blank lines and `#` comments are skipped.

use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use crate::frame_loop::{Frame, FrameFeed};
use crate::game::GameController;
use crate::pose::Pose;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlCommand {
    Start,
    Stop,
    Winner,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawLine")]
pub enum ReplayLine {
    Control {
        t: u64,
        control: ControlCommand,
    },
    Frame {
        t: u64,
        width: f32,
        height: f32,
        poses: Vec<Pose>,
    },
}

/// Wire shape of a line. A `control` key makes it a host action, so an
/// unknown command fails to parse instead of passing as an empty frame.
#[derive(Deserialize)]
struct RawLine {
    t: u64,
    #[serde(default)]
    control: Option<ControlCommand>,
    #[serde(default = "default_width")]
    width: f32,
    #[serde(default = "default_height")]
    height: f32,
    #[serde(default)]
    poses: Vec<Pose>,
}

impl From<RawLine> for ReplayLine {
    fn from(raw: RawLine) -> Self {
        match raw.control {
            Some(control) => ReplayLine::Control { t: raw.t, control },
            None => ReplayLine::Frame {
                t: raw.t,
                width: raw.width,
                height: raw.height,
                poses: raw.poses,
            },
        }
    }
}

fn default_width() -> f32 {
    1280.0
}

fn default_height() -> f32 {
    720.0
}

impl ReplayLine {
    pub fn offset(&self) -> Duration {
        match self {
            ReplayLine::Control { t, .. } | ReplayLine::Frame { t, .. } => {
                Duration::from_millis(*t)
            }
        }
    }
}

#[derive(Debug)]
pub enum ReplayError {
    Io(std::io::Error),
    Parse {
        line: usize,
        source: serde_json::Error,
    },
}

impl std::fmt::Display for ReplayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplayError::Io(e) => write!(f, "replay IO error: {e}"),
            ReplayError::Parse { line, source } => {
                write!(f, "replay parse error on line {line}: {source}")
            }
        }
    }
}

impl std::error::Error for ReplayError {}

impl From<std::io::Error> for ReplayError {
    fn from(e: std::io::Error) -> Self {
        ReplayError::Io(e)
    }
}

pub fn parse_replay(reader: impl BufRead) -> Result<Vec<ReplayLine>, ReplayError> {
    let mut lines = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let parsed = serde_json::from_str(trimmed).map_err(|source| ReplayError::Parse {
            line: idx + 1,
            source,
        })?;
        lines.push(parsed);
    }
    Ok(lines)
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplaySummary {
    pub frames_submitted: u64,
    pub frames_dropped: u64,
    pub controls: u64,
}

/// Play the recording against a controller, pacing lines by their offsets.
pub async fn run_replay(
    lines: &[ReplayLine],
    controller: &Arc<GameController>,
    feed: &FrameFeed,
) -> ReplaySummary {
    let started = tokio::time::Instant::now();
    let mut summary = ReplaySummary::default();

    for line in lines {
        tokio::time::sleep_until(started + line.offset()).await;
        match line {
            ReplayLine::Control { control, .. } => {
                summary.controls += 1;
                match control {
                    ControlCommand::Start => {
                        controller.start_game();
                    }
                    ControlCommand::Stop => {
                        if !controller.stop_game() {
                            warn!("replay stop ignored, no game running");
                        }
                    }
                    ControlCommand::Winner => {
                        if !controller.declare_winner() {
                            warn!("replay winner ignored");
                        }
                    }
                }
            }
            ReplayLine::Frame {
                width,
                height,
                poses,
                ..
            } => {
                if feed.submit(Frame::new(*width, *height, poses.clone())) {
                    summary.frames_submitted += 1;
                } else {
                    summary.frames_dropped += 1;
                }
            }
        }
    }

    info!(
        frames = summary.frames_submitted,
        dropped = summary.frames_dropped,
        controls = summary.controls,
        "replay finished"
    );
    summary
}

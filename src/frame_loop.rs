//! Frame ingestion: the detector side submits frames into a small bounded
//! queue; one dedicated OS thread drains it into the game controller.
//! Frames are perishable, so a full queue drops the new frame instead of
//! blocking the detector.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel as cb;
use tracing::{debug, info};

use crate::game::GameController;
use crate::metrics::metric_names;
use crate::pose::Pose;

/// Default queue depth; about four frames of latency at most.
pub const FRAME_QUEUE_CAPACITY: usize = 4;

/// One detector result. An unavailable detector yields frames with no poses.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: f32,
    pub height: f32,
    pub poses: Vec<Pose>,
    pub captured_at: Instant,
}

impl Frame {
    pub fn new(width: f32, height: f32, poses: Vec<Pose>) -> Self {
        Self {
            width,
            height,
            poses,
            captured_at: Instant::now(),
        }
    }
}

pub struct FrameFeed {
    tx: cb::Sender<Frame>,
    rx: cb::Receiver<Frame>,
    dropped: AtomicU64,
}

impl FrameFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = cb::bounded(capacity.max(1));
        Self {
            tx,
            rx,
            dropped: AtomicU64::new(0),
        }
    }

    /// Queue a frame. Returns false if it was dropped.
    pub fn submit(&self, frame: Frame) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(cb::TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(dropped, "frame queue full, frame dropped");
                false
            }
            Err(cb::TrySendError::Disconnected(_)) => false,
        }
    }

    pub fn receiver(&self) -> cb::Receiver<Frame> {
        self.rx.clone()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Spawn the frame thread. It exits once every `FrameFeed` is dropped and
/// the queue is drained.
pub fn run_frame_loop(
    rx: cb::Receiver<Frame>,
    controller: Arc<GameController>,
) -> std::io::Result<std::thread::JoinHandle<u64>> {
    std::thread::Builder::new()
        .name("frame-loop".into())
        .spawn(move || {
            let mut processed = 0u64;
            let mut resolution: Option<(f32, f32)> = None;
            for frame in rx.iter() {
                let current = (frame.width, frame.height);
                if resolution != Some(current) {
                    info!(width = frame.width, height = frame.height, "frame resolution");
                    resolution = Some(current);
                }
                let wait_us = frame.captured_at.elapsed().as_micros() as f64;
                controller
                    .metrics()
                    .record(metric_names::FRAME_QUEUE_WAIT, wait_us);
                controller.process_frame(&frame);
                processed += 1;
            }
            info!(processed, "frame channel closed, exiting frame loop");
            processed
        })
}

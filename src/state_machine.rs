//! Game phase machine: Idle → Announcing → FrozenWarning → Frozen → Announcing …
//! `Over` ends a game; `Idle` is forced on stop. Only `Frozen` forbids movement.

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

/// Phases of one round of red light / green light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum GamePhase {
    /// No game running; players are still tracked.
    Idle,
    /// Green light: the cue is being spoken, movement allowed.
    Announcing,
    /// Stop cue and warning flash; movement still allowed.
    FrozenWarning,
    /// Red light: any movement eliminates.
    Frozen,
    /// Game finished with an outcome.
    Over,
}

impl std::fmt::Display for GamePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GamePhase::Idle => write!(f, "Idle"),
            GamePhase::Announcing => write!(f, "Announcing"),
            GamePhase::FrozenWarning => write!(f, "FrozenWarning"),
            GamePhase::Frozen => write!(f, "Frozen"),
            GamePhase::Over => write!(f, "Over"),
        }
    }
}

impl GamePhase {
    /// Returns whether moving from `self` to `next` is allowed.
    pub fn can_transition_to(self, next: GamePhase) -> bool {
        matches!(
            (self, next),
            (GamePhase::Idle, GamePhase::Announcing)
                | (GamePhase::Announcing, GamePhase::FrozenWarning)
                | (GamePhase::FrozenWarning, GamePhase::Frozen)
                | (GamePhase::Frozen, GamePhase::Announcing)
                | (GamePhase::Over, GamePhase::Announcing) // restart
                | (_, GamePhase::Over)
                | (_, GamePhase::Idle)
        )
    }

    /// Whether the tracker should be checking for movement.
    pub fn is_frozen(self) -> bool {
        self == GamePhase::Frozen
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub from: GamePhase,
    pub to: GamePhase,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid transition: {} -> {}", self.from, self.to)
    }
}

impl std::error::Error for TransitionError {}

/// Thread-safe phase holder with a watch channel for subscribers.
pub struct PhaseMachine {
    phase: RwLock<GamePhase>,
    phase_tx: watch::Sender<GamePhase>,
}

impl Default for PhaseMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseMachine {
    pub fn new() -> Self {
        let (phase_tx, _) = watch::channel(GamePhase::Idle);
        Self {
            phase: RwLock::new(GamePhase::Idle),
            phase_tx,
        }
    }

    pub fn current(&self) -> GamePhase {
        *self.phase.read()
    }

    /// Attempt a validated transition.
    pub fn transition(&self, next: GamePhase) -> Result<GamePhase, TransitionError> {
        let mut phase = self.phase.write();
        let current = *phase;
        if !current.can_transition_to(next) {
            let err = TransitionError { from: current, to: next };
            warn!("{}", err);
            return Err(err);
        }
        *phase = next;
        self.phase_tx.send_replace(next);
        info!(from = %current, to = %next, "phase_transition");
        Ok(next)
    }

    /// Force Idle from any phase (game stopped by the host).
    pub fn force_idle(&self) {
        let mut phase = self.phase.write();
        let prev = *phase;
        *phase = GamePhase::Idle;
        self.phase_tx.send_replace(GamePhase::Idle);
        info!(from = %prev, "force_idle");
    }

    pub fn subscribe(&self) -> watch::Receiver<GamePhase> {
        self.phase_tx.subscribe()
    }
}

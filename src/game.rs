//! Game controller: owns the single `GameState`, feeds it detector frames, and
//! runs the green light / red light phase loop as a cancellable Tokio task.
//!
//! Lock order is state, then phase. Every phase-loop write checks its
//! generation guard while holding the state lock, and start/stop advance the
//! generation under the same lock, so a stale loop can never write.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::announcer::{Announcer, Cue};
use crate::cancellation::{GameGeneration, GenerationGuard};
use crate::config::GameConfig;
use crate::events::{EventSink, GameEvent, GameOutcome};
use crate::frame_loop::Frame;
use crate::metrics::{metric_names, MetricsRegistry};
use crate::state_machine::{GamePhase, PhaseMachine};
use crate::tracker::{FrameReport, GameState, RosterEntry, SlotSnapshot};

pub struct GameController {
    state: Mutex<GameState>,
    phases: PhaseMachine,
    generations: GameGeneration,
    announcer: Arc<dyn Announcer>,
    events: EventSink,
    metrics: Arc<MetricsRegistry>,
    game_id: Mutex<Option<String>>,
}

impl GameController {
    pub fn new(
        config: GameConfig,
        announcer: Arc<dyn Announcer>,
        events: EventSink,
        metrics: Arc<MetricsRegistry>,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(GameState::new(config)),
            phases: PhaseMachine::new(),
            generations: GameGeneration::new(),
            announcer,
            events,
            metrics,
            game_id: Mutex::new(None),
        })
    }

    /// Track one detector frame. Runs whether or not a game is in progress.
    pub fn process_frame(&self, frame: &Frame) -> FrameReport {
        let span = self.metrics.span(metric_names::ASSIGN_SLOTS);
        let report = {
            let mut state = self.state.lock();
            state.assign_slots(&frame.poses, frame.width, frame.captured_at)
        };
        span.finish();

        for &(player_id, movement) in &report.eliminated {
            self.events
                .emit(GameEvent::PlayerEliminated { player_id, movement });
        }
        if report.discarded > 0 {
            debug!(discarded = report.discarded, "poses discarded");
        }
        report
    }

    /// Start (or restart) a game and spawn its phase loop. Must be called
    /// from within a Tokio runtime. Returns the new game id.
    pub fn start_game(self: &Arc<Self>) -> String {
        let game_id = uuid::Uuid::new_v4().to_string();
        let guard = {
            let mut state = self.state.lock();
            let guard = self.generations.cancel_and_advance();
            state.reset_for_new_game();
            state.set_running(true);
            if self.phases.current() != GamePhase::Idle {
                self.phases.force_idle();
            }
            guard
        };
        *self.game_id.lock() = Some(game_id.clone());

        info!(game_id = %game_id, generation = guard.my_generation(), "game_started");
        self.events.emit(GameEvent::GameStarted {
            game_id: game_id.clone(),
        });

        tokio::spawn(Arc::clone(self).run_phase_loop(guard));
        game_id
    }

    /// Stop the running game. Returns false if none was running.
    pub fn stop_game(&self) -> bool {
        let mut state = self.state.lock();
        if !state.is_running() {
            return false;
        }
        self.end_game_locked(&mut state, GameOutcome::Stopped);
        true
    }

    /// Declare the surviving players winners. Only valid while a game runs
    /// and at least one player is still in.
    pub fn declare_winner(&self) -> bool {
        let mut state = self.state.lock();
        if !state.is_running() || state.active_count() == 0 {
            debug!(running = state.is_running(), "winner declaration ignored");
            return false;
        }
        self.end_game_locked(&mut state, GameOutcome::Won);
        true
    }

    pub fn phase(&self) -> GamePhase {
        self.phases.current()
    }

    pub fn subscribe_phase(&self) -> tokio::sync::watch::Receiver<GamePhase> {
        self.phases.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().is_running()
    }

    pub fn game_id(&self) -> Option<String> {
        self.game_id.lock().clone()
    }

    pub fn snapshot(&self) -> Vec<SlotSnapshot> {
        self.state.lock().snapshot()
    }

    pub fn roster(&self) -> Vec<RosterEntry> {
        self.state.lock().roster()
    }

    /// Read access to the full state under the frame lock.
    pub fn with_state<R>(&self, f: impl FnOnce(&GameState) -> R) -> R {
        let state = self.state.lock();
        f(&state)
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    fn end_game_locked(&self, state: &mut GameState, outcome: GameOutcome) {
        self.generations.cancel();
        state.set_running(false);
        state.unfreeze();
        match outcome {
            GameOutcome::Stopped => {
                self.phases.force_idle();
                self.emit_phase(GamePhase::Idle);
            }
            GameOutcome::Won | GameOutcome::Lost => self.enter_phase(GamePhase::Over),
        }

        info!(
            outcome = ?outcome,
            active = state.active_count(),
            eliminated = state.eliminated_count(),
            "game_over"
        );
        self.events.emit(GameEvent::GameOver {
            outcome,
            message: outcome.message().to_string(),
        });
    }

    fn enter_phase(&self, phase: GamePhase) {
        if self.phases.transition(phase).is_ok() {
            self.emit_phase(phase);
        }
    }

    fn emit_phase(&self, phase: GamePhase) {
        self.events.emit(GameEvent::PhaseChanged { phase });
    }

    fn show_message(&self, text: &str) {
        self.events.emit(GameEvent::Message {
            text: text.to_string(),
            visible: true,
        });
    }

    async fn run_phase_loop(self: Arc<Self>, guard: GenerationGuard) {
        let config = self.state.lock().config().clone();
        let green_cue = Cue::korean(config.green_light_cue.as_str());
        let red_cue = Cue::korean(config.red_light_cue.as_str());

        loop {
            let cycle = self.metrics.span(metric_names::PHASE_CYCLE);

            // Green light, unless everyone is already out.
            {
                let mut state = self.state.lock();
                if !guard.should_continue() {
                    break;
                }
                if state.all_eliminated() {
                    self.end_game_locked(&mut state, GameOutcome::Lost);
                    break;
                }
                state.unfreeze();
                self.enter_phase(GamePhase::Announcing);
            }
            self.show_message(&green_cue.text);
            if !self.announce(&guard, &green_cue).await {
                break;
            }

            {
                let _state = self.state.lock();
                if !guard.should_continue() {
                    break;
                }
                self.enter_phase(GamePhase::FrozenWarning);
            }
            self.events.emit(GameEvent::FlashWarning {
                duration_ms: config.warning_flash_ms,
            });
            self.show_message(&red_cue.text);
            if !self.announce(&guard, &red_cue).await {
                break;
            }

            // Red light: flag and baselines change together, before any
            // frame can be checked against them.
            {
                let mut state = self.state.lock();
                if !guard.should_continue() {
                    break;
                }
                state.freeze();
                self.enter_phase(GamePhase::Frozen);
            }

            tokio::select! {
                _ = guard.token().cancelled() => break,
                _ = tokio::time::sleep(config.frozen_duration()) => {}
            }
            cycle.finish();
        }

        debug!(generation = guard.my_generation(), "phase loop exiting");
    }

    /// Speak a cue on the blocking pool. Returns false if the game was
    /// cancelled while speaking.
    async fn announce(&self, guard: &GenerationGuard, cue: &Cue) -> bool {
        let announcer = Arc::clone(&self.announcer);
        let owned = cue.clone();
        let span = self.metrics.span(metric_names::ANNOUNCE);
        let task = tokio::task::spawn_blocking(move || announcer.speak(&owned));

        tokio::select! {
            _ = guard.token().cancelled() => return false,
            result = task => match result {
                Ok(Ok(())) => {
                    span.finish();
                }
                Ok(Err(e)) => {
                    warn!(error = %e, text = %cue.text, "announcement failed, continuing");
                }
                Err(e) => {
                    error!(error = %e, "announcer task panicked");
                }
            },
        }
        guard.should_continue()
    }
}

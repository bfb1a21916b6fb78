//! Events emitted to the UI layer. Sent on an unbounded channel so the frame
//! path and phase loop never wait on a slow consumer.

use crossbeam_channel as cb;
use serde::Serialize;
use tracing::trace;

use crate::state_machine::GamePhase;
use crate::tracker::PlayerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GameOutcome {
    /// A winner was declared while at least one player was still in.
    Won,
    /// Every tracked player was eliminated.
    Lost,
    /// The host stopped the game.
    Stopped,
}

impl GameOutcome {
    pub fn message(self) -> &'static str {
        match self {
            GameOutcome::Won => "플레이어 승리!",
            GameOutcome::Lost => "패배! 모든 플레이어가 탈락했습니다.",
            GameOutcome::Stopped => "게임이 중단되었습니다.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    GameStarted { game_id: String },
    PhaseChanged { phase: GamePhase },
    Message { text: String, visible: bool },
    FlashWarning { duration_ms: u64 },
    PlayerEliminated { player_id: PlayerId, movement: f32 },
    GameOver { outcome: GameOutcome, message: String },
}

/// Sending half handed to the controller.
#[derive(Clone)]
pub struct EventSink {
    tx: cb::Sender<GameEvent>,
}

impl EventSink {
    pub fn channel() -> (EventSink, cb::Receiver<GameEvent>) {
        let (tx, rx) = cb::unbounded();
        (EventSink { tx }, rx)
    }

    /// Never blocks. Events are dropped silently once the UI has gone away.
    pub fn emit(&self, event: GameEvent) {
        trace!(?event, "game_event");
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let json = serde_json::to_value(GameEvent::PlayerEliminated {
            player_id: 2,
            movement: 30.0,
        })
        .unwrap();
        assert_eq!(json["type"], "player_eliminated");
        assert_eq!(json["player_id"], 2);
    }

    #[test]
    fn test_emit_after_receiver_dropped_is_harmless() {
        let (sink, rx) = EventSink::channel();
        drop(rx);
        sink.emit(GameEvent::FlashWarning { duration_ms: 500 });
    }
}

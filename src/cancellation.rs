//! Game generations: each start or stop cancels the running phase loop and
//! advances a counter, so a loop left over from an earlier game can tell it
//! is stale before it touches shared state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

pub struct GameGeneration {
    current_token: Mutex<CancellationToken>,
    generation: Arc<AtomicU64>,
}

impl Default for GameGeneration {
    fn default() -> Self {
        Self::new()
    }
}

impl GameGeneration {
    pub fn new() -> Self {
        Self {
            current_token: Mutex::new(CancellationToken::new()),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Cancel the current generation and hand out a guard for the next one.
    pub fn cancel_and_advance(&self) -> GenerationGuard {
        let mut token = self.current_token.lock();
        token.cancel();
        let fresh = CancellationToken::new();
        let child = fresh.child_token();
        *token = fresh;
        let gen = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        GenerationGuard {
            generation: Arc::clone(&self.generation),
            my_generation: gen,
            token: child,
        }
    }

    /// Cancel the current generation without starting a new one.
    pub fn cancel(&self) {
        self.current_token.lock().cancel();
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

/// Checked by a phase loop before every write.
#[derive(Clone)]
pub struct GenerationGuard {
    generation: Arc<AtomicU64>,
    my_generation: u64,
    token: CancellationToken,
}

impl GenerationGuard {
    #[inline]
    pub fn is_current(&self) -> bool {
        self.generation.load(Ordering::SeqCst) == self.my_generation
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    #[inline]
    pub fn should_continue(&self) -> bool {
        !self.is_cancelled() && self.is_current()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn my_generation(&self) -> u64 {
        self.my_generation
    }
}

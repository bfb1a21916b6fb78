//! Spoken game cues. Speech synthesis lives outside the crate; the phase loop
//! only needs something that blocks until the utterance has finished.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

/// One utterance and the voice settings it should be spoken with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cue {
    pub text: String,
    pub lang: &'static str,
    pub rate: f32,
    pub pitch: f32,
}

impl Cue {
    /// Korean cue with the game's caller voice (slightly fast, high pitch).
    pub fn korean(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            lang: "ko-KR",
            rate: 1.1,
            pitch: 1.5,
        }
    }
}

/// Speech backend. `speak` blocks until the cue has been spoken.
pub trait Announcer: Send + Sync {
    fn speak(&self, cue: &Cue) -> Result<(), AnnounceError>;
}

#[derive(Debug)]
pub enum AnnounceError {
    VoiceUnavailable(String),
}

impl std::fmt::Display for AnnounceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnnounceError::VoiceUnavailable(lang) => write!(f, "no voice available for {lang}"),
        }
    }
}

impl std::error::Error for AnnounceError {}

/// Stands in for a speech engine by waiting roughly as long as the cue would
/// take to say.
pub struct PacedAnnouncer {
    per_char: Duration,
}

impl PacedAnnouncer {
    pub fn new(per_char: Duration) -> Self {
        Self { per_char }
    }

    pub fn estimate(&self, cue: &Cue) -> Duration {
        let chars = cue.text.chars().filter(|c| !c.is_whitespace()).count() as u32;
        let rate = if cue.rate > 0.0 { cue.rate } else { 1.0 };
        self.per_char.mul_f32(chars as f32 / rate)
    }
}

impl Default for PacedAnnouncer {
    fn default() -> Self {
        // About four syllables a second at normal rate.
        Self::new(Duration::from_millis(250))
    }
}

impl Announcer for PacedAnnouncer {
    fn speak(&self, cue: &Cue) -> Result<(), AnnounceError> {
        let duration = self.estimate(cue);
        info!(text = %cue.text, lang = cue.lang, duration_ms = duration.as_millis() as u64, "announce");
        std::thread::sleep(duration);
        Ok(())
    }
}

/// Returns immediately. For headless runs and tests.
pub struct SilentAnnouncer;

impl Announcer for SilentAnnouncer {
    fn speak(&self, cue: &Cue) -> Result<(), AnnounceError> {
        debug!(text = %cue.text, "announce (silent)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_skips_spaces_and_scales_by_rate() {
        let announcer = PacedAnnouncer::new(Duration::from_millis(110));
        let mut cue = Cue::korean("정지 !");
        cue.rate = 1.0;
        let normal = announcer.estimate(&cue).as_secs_f64();
        assert!((normal - 0.330).abs() < 0.001);
        cue.rate = 1.1;
        let fast = announcer.estimate(&cue).as_secs_f64();
        assert!((fast - 0.300).abs() < 0.001);
    }

    #[test]
    fn test_korean_cue_voice() {
        let cue = Cue::korean("무궁화 꽃이 피었습니다");
        assert_eq!(cue.lang, "ko-KR");
        assert_eq!(cue.pitch, 1.5);
    }
}

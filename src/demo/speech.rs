use std::time::Duration;

/// Speaks text aloud in demo mode. Blocks until the utterance is done.
pub trait SpeechSynthesizer: Send + Sync {
    fn speak(&self, text: &str, language: &str);
}

/// Languages the demo voices cover; anything else is spoken as en-US.
const VOICE_LANGUAGES: &[&str] = &[
    "en-US", "es-ES", "es-MX", "fr-FR", "de-DE", "it-IT", "pt-BR", "zh-CN", "ja-JP", "ko-KR",
];

pub fn voice_language(language: &str) -> &'static str {
    VOICE_LANGUAGES
        .iter()
        .find(|l| **l == language)
        .copied()
        .unwrap_or("en-US")
}

/// Average speaking pace at rate 1.0.
const WORDS_PER_SECOND: f32 = 2.5;

/// Simulated speech: logs the utterance and takes as long as reading it
/// aloud would at `rate`.
pub struct PacedSpeaker {
    pub rate: f32,
}

impl Default for PacedSpeaker {
    fn default() -> Self {
        Self { rate: 0.9 }
    }
}

impl PacedSpeaker {
    pub fn utterance_duration(&self, text: &str) -> Duration {
        let words = text.split_whitespace().count() as f32;
        let rate = if self.rate > 0.0 { self.rate } else { 1.0 };
        Duration::from_secs_f32(words / (WORDS_PER_SECOND * rate))
    }
}

impl SpeechSynthesizer for PacedSpeaker {
    fn speak(&self, text: &str, language: &str) {
        let voice = voice_language(language);
        let duration = self.utterance_duration(text);
        log::info!(
            "[speech] {} ({:.1}s): {}",
            voice,
            duration.as_secs_f32(),
            text
        );
        std::thread::sleep(duration);
    }
}

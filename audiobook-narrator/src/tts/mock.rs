//! Mock speech engine for testing
//!
//! Produces short WAV tones and can be told to fail, return undecodable
//! bytes, hang, panic or answer slowly for segments containing given text.

use super::SpeechSynthesizer;
use crate::audio::AudioClip;
use crate::audio::tests::tone;
use crate::error::SynthesisError;
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const MOCK_SAMPLE_RATE: u32 = 24_000;

pub struct MockSynthesizer {
    /// Length of every synthesized clip
    clip_ms: u32,
    /// Current call count
    call_count: AtomicUsize,
    /// Calls currently running, and the most seen at once
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    /// Segments containing these fragments fail
    fail_on: Vec<String>,
    /// Segments containing these fragments return bytes that are not WAV
    garbage_on: Vec<String>,
    /// Segments containing these fragments never finish
    hang_on: Vec<String>,
    /// Segments containing these fragments panic the calling task
    panic_on: Vec<String>,
    /// Extra latency per matching fragment
    delays: Vec<(String, Duration)>,
    /// Voices seen, in call order
    voices: Mutex<Vec<String>>,
}

impl MockSynthesizer {
    pub fn new(clip_ms: u32) -> Self {
        Self {
            clip_ms,
            call_count: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            fail_on: Vec::new(),
            garbage_on: Vec::new(),
            hang_on: Vec::new(),
            panic_on: Vec::new(),
            delays: Vec::new(),
            voices: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_on(mut self, fragment: &str) -> Self {
        self.fail_on.push(fragment.to_string());
        self
    }

    pub fn garbage_on(mut self, fragment: &str) -> Self {
        self.garbage_on.push(fragment.to_string());
        self
    }

    pub fn hanging_on(mut self, fragment: &str) -> Self {
        self.hang_on.push(fragment.to_string());
        self
    }

    pub fn panicking_on(mut self, fragment: &str) -> Self {
        self.panic_on.push(fragment.to_string());
        self
    }

    pub fn delayed_on(mut self, fragment: &str, delay: Duration) -> Self {
        self.delays.push((fragment.to_string(), delay));
        self
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn voices(&self) -> Vec<String> {
        self.voices.lock().unwrap().clone()
    }

    fn matches(fragments: &[String], text: &str) -> bool {
        fragments.iter().any(|f| text.contains(f.as_str()))
    }

    async fn respond(&self, text: &str) -> Result<Vec<u8>, SynthesisError> {
        for (fragment, delay) in &self.delays {
            if text.contains(fragment.as_str()) {
                tokio::time::sleep(*delay).await;
            }
        }
        if Self::matches(&self.hang_on, text) {
            std::future::pending::<()>().await;
        }
        if Self::matches(&self.panic_on, text) {
            panic!("mock panic: {}", text);
        }
        if Self::matches(&self.fail_on, text) {
            return Err(SynthesisError::Backend(format!("mock failure: {}", text)));
        }
        if Self::matches(&self.garbage_on, text) {
            return Ok(b"not a wav file".to_vec());
        }

        let clip = AudioClip::new(tone(self.clip_ms, -12.0, MOCK_SAMPLE_RATE), MOCK_SAMPLE_RATE);
        clip.to_wav_bytes()
            .map_err(|e| SynthesisError::InvalidAudio(e.to_string()))
    }
}

#[async_trait]
impl SpeechSynthesizer for MockSynthesizer {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>, SynthesisError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.voices.lock().unwrap().push(voice.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let result = self.respond(text).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_succeeds_with_wav() {
        let synth = MockSynthesizer::new(200);
        let bytes = synth.synthesize("Hello there.", "v1").await.unwrap();

        let clip = AudioClip::from_wav_bytes(&bytes).unwrap();
        assert_eq!(clip.duration_ms(), 200);
        assert_eq!(synth.call_count(), 1);
        assert_eq!(synth.voices(), vec!["v1"]);
    }

    #[tokio::test]
    async fn test_configured_failures() {
        let synth = MockSynthesizer::new(100)
            .failing_on("broken")
            .garbage_on("noise");

        assert!(matches!(
            synth.synthesize("a broken line", "v").await,
            Err(SynthesisError::Backend(_))
        ));
        let bytes = synth.synthesize("pure noise", "v").await.unwrap();
        assert!(AudioClip::from_wav_bytes(&bytes).is_err());
        assert!(synth.synthesize("fine", "v").await.is_ok());
        assert_eq!(synth.call_count(), 3);
    }

    #[tokio::test]
    #[should_panic(expected = "mock panic")]
    async fn test_panicking_fragment() {
        let synth = MockSynthesizer::new(100).panicking_on("boom");
        let _ = synth.synthesize("boom goes the line", "v").await;
    }
}

//! Speech synthesis backends.

pub mod command;
#[cfg(test)]
pub mod mock;

pub use command::CommandSynthesizer;

use crate::config::SynthesisSettings;
use crate::error::{ConfigError, SynthesisError};
use async_trait::async_trait;
use std::sync::Arc;

/// A speech engine: text and an opaque voice id in, WAV bytes out.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize one segment. Every call is independent and may fail on its own.
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>, SynthesisError>;

    /// Backend name for logs.
    fn name(&self) -> &str;
}

/// Create the configured synthesis backend.
pub fn create_synthesizer(
    settings: &SynthesisSettings,
) -> Result<Arc<dyn SpeechSynthesizer>, ConfigError> {
    Ok(Arc::new(CommandSynthesizer::from_settings(settings)?))
}

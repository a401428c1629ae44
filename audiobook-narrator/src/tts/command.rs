//! Backend that runs an external text-to-speech program per segment.
//!
//! The program is given the segment text, the voice id and an output path as
//! separate arguments (no shell is involved). Output in any format other than
//! WAV is converted with ffmpeg.

use super::SpeechSynthesizer;
use crate::audio::export::ffmpeg_program;
use crate::config::{OUTPUT_PLACEHOLDER, SynthesisSettings, TEXT_PLACEHOLDER, VOICE_PLACEHOLDER};
use crate::error::{ConfigError, SynthesisError};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

#[derive(Debug, Clone)]
pub struct CommandSynthesizer {
    program: String,
    args: Vec<String>,
    output_extension: String,
}

impl CommandSynthesizer {
    pub fn from_settings(settings: &SynthesisSettings) -> Result<Self, ConfigError> {
        settings.validate()?;
        let (program, args) = settings
            .command
            .split_first()
            .ok_or_else(|| ConfigError::InvalidRule {
                table: "synthesis",
                message: "command is empty".to_string(),
            })?;

        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            output_extension: settings.output_extension.trim_start_matches('.').to_string(),
        })
    }

    fn render_args(&self, text: &str, voice: &str, output: &Path) -> Vec<String> {
        let output = output.to_string_lossy();
        self.args
            .iter()
            .map(|arg| {
                arg.replace(VOICE_PLACEHOLDER, voice)
                    .replace(OUTPUT_PLACEHOLDER, &output)
                    .replace(TEXT_PLACEHOLDER, text)
            })
            .collect()
    }

    fn writes_wav(&self) -> bool {
        self.output_extension.eq_ignore_ascii_case("wav")
    }
}

#[async_trait]
impl SpeechSynthesizer for CommandSynthesizer {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>, SynthesisError> {
        let work_dir = tempfile::tempdir()?;
        let raw_path = work_dir.path().join(format!("segment.{}", self.output_extension));

        let output = Command::new(&self.program)
            .args(self.render_args(text, voice, &raw_path))
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SynthesisError::Backend(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }
        if !raw_path.exists() {
            return Err(SynthesisError::Backend(format!(
                "{} produced no audio file",
                self.program
            )));
        }

        let wav_path = if self.writes_wav() {
            raw_path
        } else {
            let wav_path = work_dir.path().join("segment.wav");
            convert_to_wav(&raw_path, &wav_path).await?;
            wav_path
        };

        Ok(tokio::fs::read(&wav_path).await?)
    }

    fn name(&self) -> &str {
        &self.program
    }
}

/// Transcode any audio file ffmpeg understands to mono WAV.
async fn convert_to_wav(input: &Path, output: &Path) -> Result<(), SynthesisError> {
    let result = Command::new(ffmpeg_program())
        .args(["-y", "-loglevel", "error", "-i"])
        .arg(input)
        .args(["-ac", "1"])
        .arg(output)
        .kill_on_drop(true)
        .output()
        .await?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        return Err(SynthesisError::Backend(format!(
            "ffmpeg conversion failed: {}",
            stderr.trim()
        )));
    }
    Ok(())
}

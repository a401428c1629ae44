//! Writing the finished track to disk.

use super::{AudioClip, to_i16, wav_spec};
use crate::error::ExportError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Bitrate of MP3 exports.
pub const MP3_BITRATE: &str = "192k";

/// Environment variable naming the ffmpeg executable.
pub const FFMPEG_ENV: &str = "NARRATOR_FFMPEG";

/// Longest title prefix used in output file names.
const FILE_STEM_CHARS: usize = 30;

static UNSAFE_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s-]").expect("filename pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Mp3,
    Wav,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Mp3 => "mp3",
            OutputFormat::Wav => "wav",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Output file name for a book: the title stripped of punctuation, cut to
/// 30 characters, with whitespace turned into underscores.
pub fn output_file_name(title: &str, format: OutputFormat) -> String {
    let safe = UNSAFE_FILENAME_CHARS.replace_all(title, "");
    let stem: String = safe
        .chars()
        .take(FILE_STEM_CHARS)
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();
    format!("{}_audiobook.{}", stem, format.extension())
}

/// Path of the ffmpeg executable.
pub fn ffmpeg_program() -> PathBuf {
    std::env::var_os(FFMPEG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("ffmpeg"))
}

/// Check if ffmpeg is available.
pub fn is_ffmpeg_available() -> bool {
    Command::new(ffmpeg_program())
        .arg("-version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Write the track as 16-bit PCM mono WAV.
pub fn write_wav(track: &AudioClip, path: &Path) -> Result<(), ExportError> {
    let mut writer = hound::WavWriter::create(path, wav_spec(track.sample_rate))?;
    for &sample in &track.samples {
        writer.write_sample(to_i16(sample))?;
    }
    writer.finalize()?;
    Ok(())
}

/// Write the track in the requested format.
///
/// MP3 is encoded by ffmpeg from an intermediate WAV file.
pub fn export_track(track: &AudioClip, path: &Path, format: OutputFormat) -> Result<(), ExportError> {
    match format {
        OutputFormat::Wav => write_wav(track, path)?,
        OutputFormat::Mp3 => {
            let temp_dir = tempfile::tempdir()?;
            let wav_path = temp_dir.path().join("track.wav");
            write_wav(track, &wav_path)?;

            let output = Command::new(ffmpeg_program())
                .args(["-y", "-loglevel", "error", "-i"])
                .arg(&wav_path)
                .args(["-codec:a", "libmp3lame", "-b:a", MP3_BITRATE])
                .arg(path)
                .output()?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(ExportError::Encoder(format!("ffmpeg MP3 encoding failed: {}", stderr.trim())));
            }
        }
    }

    log::info!("Wrote {} ({} ms)", path.display(), track.duration_ms());
    Ok(())
}

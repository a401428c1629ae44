//! Audio assembly: joining synthesized clips into one narrated track.

pub mod assembler;
pub mod export;

pub use assembler::{AssemblySettings, AudioAssembler};
pub use export::{OutputFormat, export_track, output_file_name};

use crate::error::SynthesisError;
use std::io::Cursor;

/// Sample rate used when a track has no source clip to inherit one from.
pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;

/// Mono PCM audio with samples in [-1.0, 1.0].
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn empty(sample_rate: u32) -> Self {
        Self::new(Vec::new(), sample_rate)
    }

    /// Digital silence of the given length.
    pub fn silence(duration_ms: u32, sample_rate: u32) -> Self {
        Self::new(vec![0.0; samples_for_ms(duration_ms, sample_rate)], sample_rate)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.samples.len() as u64 * 1000 / self.sample_rate as u64
    }

    /// Loudness of the whole clip in dBFS.
    pub fn dbfs(&self) -> f32 {
        dbfs(&self.samples)
    }

    /// Decode a WAV file held in memory, mixing all channels down to mono.
    pub fn from_wav_bytes(bytes: &[u8]) -> Result<Self, SynthesisError> {
        let mut reader = hound::WavReader::new(Cursor::new(bytes))
            .map_err(|e| SynthesisError::InvalidAudio(e.to_string()))?;
        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<_, _>>()
                .map_err(|e| SynthesisError::InvalidAudio(e.to_string()))?,
            hound::SampleFormat::Int => {
                let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<_, _>>()
                    .map_err(|e| SynthesisError::InvalidAudio(e.to_string()))?
            }
        };

        let samples = interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();

        Ok(Self::new(samples, spec.sample_rate))
    }

    /// Encode as a 16-bit PCM mono WAV file in memory.
    pub fn to_wav_bytes(&self) -> Result<Vec<u8>, hound::Error> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, wav_spec(self.sample_rate))?;
            for &s in &self.samples {
                writer.write_sample(to_i16(s))?;
            }
            writer.finalize()?;
        }
        Ok(cursor.into_inner())
    }

    /// Linearly resample to another rate.
    pub fn resampled(&self, sample_rate: u32) -> Self {
        if sample_rate == self.sample_rate || self.samples.is_empty() || self.sample_rate == 0 {
            return Self::new(self.samples.clone(), sample_rate);
        }

        let ratio = self.sample_rate as f64 / sample_rate as f64;
        let len = self.samples.len();
        let out_len = (len as f64 / ratio).round() as usize;
        let samples = (0..out_len)
            .map(|i| {
                let pos = i as f64 * ratio;
                let idx = (pos.floor() as usize).min(len - 1);
                let frac = (pos - idx as f64) as f32;
                let a = self.samples[idx];
                let b = self.samples[(idx + 1).min(len - 1)];
                a + (b - a) * frac
            })
            .collect();

        Self::new(samples, sample_rate)
    }
}

/// A synthesized segment ready for assembly.
///
/// The pause that follows the clip travels with it, so a segment that failed
/// to synthesize cannot shift the pauses of the clips after it.
#[derive(Debug, Clone, PartialEq)]
pub struct NarratedClip {
    pub segment_id: usize,
    pub clip: AudioClip,
    pub pause_after_ms: u32,
}

pub(crate) fn wav_spec(sample_rate: u32) -> hound::WavSpec {
    hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

/// Convert f32 [-1.0, 1.0] to i16.
pub(crate) fn to_i16(sample: f32) -> i16 {
    (sample * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

pub fn samples_for_ms(duration_ms: u32, sample_rate: u32) -> usize {
    (duration_ms as u64 * sample_rate as u64 / 1000) as usize
}

pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum / samples.len() as f64).sqrt() as f32
}

/// RMS loudness relative to full scale; negative infinity for silence.
pub fn dbfs(samples: &[f32]) -> f32 {
    let rms = rms(samples);
    if rms <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * rms.log10()
    }
}

pub fn db_to_amplitude(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

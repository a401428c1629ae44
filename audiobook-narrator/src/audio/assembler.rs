//! Joining synthesized clips into one track.
//!
//! Clips are trimmed of the near-silent lead-in and tail that synthesis
//! engines add, separated by pauses (room tone or silence), joined with short
//! crossfades and finally peak-normalized.

use super::{AudioClip, DEFAULT_SAMPLE_RATE, NarratedClip, db_to_amplitude, dbfs, rms, samples_for_ms};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Tunable constants of the assembler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblySettings {
    /// Windows quieter than this (dBFS) count as silence when trimming
    pub silence_threshold_db: f32,
    /// Trim scan window
    pub window_ms: u32,
    /// Audio kept before the first and after the last loud window
    pub guard_ms: u32,
    /// Room tone level (dBFS)
    pub room_tone_db: f32,
    /// Upper bound for every crossfade
    pub crossfade_ms: u32,
    /// Pause used when none is supplied for a join
    pub default_pause_ms: u32,
    /// Peak level after normalization, in dB below full scale
    pub headroom_db: f32,
}

impl Default for AssemblySettings {
    fn default() -> Self {
        Self {
            silence_threshold_db: -50.0,
            window_ms: 10,
            guard_ms: 20,
            room_tone_db: -65.0,
            crossfade_ms: 15,
            default_pause_ms: 600,
            headroom_db: 0.1,
        }
    }
}

/// Assembles clips and pauses into a single narrated track.
#[derive(Debug, Clone, Default)]
pub struct AudioAssembler {
    settings: AssemblySettings,
}

impl AudioAssembler {
    pub fn new(settings: AssemblySettings) -> Self {
        Self { settings }
    }

    /// Join clips separated by positional pauses.
    ///
    /// Pause `i` goes between clip `i` and clip `i + 1`; missing values use
    /// the default pause. No clips gives an empty track.
    pub fn assemble(&self, clips: &[AudioClip], pauses_ms: &[u32], room_tone: bool) -> AudioClip {
        let Some((first, rest)) = clips.split_first() else {
            return AudioClip::empty(DEFAULT_SAMPLE_RATE);
        };

        let joins = rest.iter().enumerate().map(|(i, clip)| {
            let pause = pauses_ms
                .get(i)
                .copied()
                .unwrap_or(self.settings.default_pause_ms);
            (pause, clip)
        });
        self.assemble_joins(first, joins, room_tone)
    }

    /// Join narrated clips, each followed by its own pause.
    pub fn assemble_narration(&self, clips: &[NarratedClip], room_tone: bool) -> AudioClip {
        let Some(first) = clips.first() else {
            return AudioClip::empty(DEFAULT_SAMPLE_RATE);
        };

        let joins = clips.windows(2).map(|w| (w[0].pause_after_ms, &w[1].clip));
        self.assemble_joins(&first.clip, joins, room_tone)
    }

    fn assemble_joins<'a, I>(&self, first: &AudioClip, joins: I, room_tone: bool) -> AudioClip
    where
        I: Iterator<Item = (u32, &'a AudioClip)>,
    {
        let rate = first.sample_rate;
        let mut out = self.trim(first).samples;
        let mut hard_joins = 0usize;

        for (pause_ms, clip) in joins {
            let clip = if clip.sample_rate == rate {
                Cow::Borrowed(clip)
            } else {
                log::debug!("Resampling clip from {} Hz to {} Hz", clip.sample_rate, rate);
                Cow::Owned(clip.resampled(rate))
            };
            let trimmed = self.trim(&clip);
            let pause = self.pause(pause_ms, rate, room_tone);

            let pause_fade = self.crossfade_samples(&pause, rate);
            let clip_fade = self.crossfade_samples(&trimmed, rate);
            if !crossfade_append(&mut out, &pause.samples, pause_fade) {
                hard_joins += 1;
            }
            if !crossfade_append(&mut out, &trimmed.samples, clip_fade) {
                hard_joins += 1;
            }
        }

        if hard_joins > 0 {
            log::debug!("{} joins fell back to hard concatenation", hard_joins);
        }

        let mut track = AudioClip::new(out, rate);
        self.normalize(&mut track);
        log::info!("Assembled track: {:.1} s", track.duration_ms() as f64 / 1000.0);
        track
    }

    /// Remove sub-threshold audio from both ends of a clip.
    ///
    /// A clip that never rises above the threshold is returned untouched.
    pub fn trim(&self, clip: &AudioClip) -> AudioClip {
        let samples = &clip.samples;
        let len = samples.len();
        let window = samples_for_ms(self.settings.window_ms, clip.sample_rate).max(1);
        let guard = samples_for_ms(self.settings.guard_ms, clip.sample_rate);
        let threshold = self.settings.silence_threshold_db;

        let Some(first_loud) = (0..len)
            .step_by(window)
            .find(|&i| dbfs(&samples[i..(i + window).min(len)]) > threshold)
        else {
            return clip.clone();
        };
        let start = first_loud.saturating_sub(guard);

        let mut end = len;
        let mut i = len;
        while i > 0 {
            let lo = i.saturating_sub(window);
            if dbfs(&samples[lo..i]) > threshold {
                end = (i + guard).min(len);
                break;
            }
            i = lo;
        }

        AudioClip::new(samples[start..end].to_vec(), clip.sample_rate)
    }

    /// Pause of the given length: room tone or digital silence.
    pub fn pause(&self, duration_ms: u32, sample_rate: u32, room_tone: bool) -> AudioClip {
        if room_tone {
            self.room_tone(duration_ms, sample_rate)
        } else {
            AudioClip::silence(duration_ms, sample_rate)
        }
    }

    /// Gaussian noise at the configured room tone level.
    pub fn room_tone(&self, duration_ms: u32, sample_rate: u32) -> AudioClip {
        let len = samples_for_ms(duration_ms, sample_rate);
        let target = db_to_amplitude(self.settings.room_tone_db);

        let Ok(normal) = Normal::new(0.0f32, target) else {
            log::warn!("Invalid room tone level {} dBFS, using silence", self.settings.room_tone_db);
            return AudioClip::silence(duration_ms, sample_rate);
        };

        let mut rng = rand::thread_rng();
        let mut samples: Vec<f32> = (0..len).map(|_| normal.sample(&mut rng)).collect();

        // scale to the exact target level
        let level = rms(&samples);
        if level > 0.0 {
            let gain = target / level;
            samples.iter_mut().for_each(|s| *s *= gain);
        }

        AudioClip::new(samples, sample_rate)
    }

    /// Peak-normalize in place; silent tracks are left alone.
    pub fn normalize(&self, track: &mut AudioClip) {
        let peak = track.samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        if peak <= 0.0 {
            return;
        }
        let gain = db_to_amplitude(-self.settings.headroom_db) / peak;
        track.samples.iter_mut().for_each(|s| *s *= gain);
    }

    /// Crossfade length for appending `segment`: the configured window capped
    /// at half the segment.
    fn crossfade_samples(&self, segment: &AudioClip, sample_rate: u32) -> usize {
        samples_for_ms(self.settings.crossfade_ms, sample_rate).min(segment.len() / 2)
    }
}

/// Append `next` to `out`, overlapping the last `crossfade` samples with a
/// linear fade. Returns false when the overlap does not fit and the audio was
/// concatenated without fading.
fn crossfade_append(out: &mut Vec<f32>, next: &[f32], crossfade: usize) -> bool {
    if crossfade == 0 || crossfade > out.len() || crossfade > next.len() {
        out.extend_from_slice(next);
        return crossfade == 0;
    }

    let start = out.len() - crossfade;
    for (k, &incoming) in next[..crossfade].iter().enumerate() {
        let t = (k as f32 + 0.5) / crossfade as f32;
        out[start + k] = out[start + k] * (1.0 - t) + incoming * t;
    }
    out.extend_from_slice(&next[crossfade..]);
    true
}

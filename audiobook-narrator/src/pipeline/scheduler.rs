//! Bounded-concurrency synthesis of narration segments.
//!
//! One task per segment, gated by a semaphore. Results come back over a
//! channel in completion order and are put back into segment id order before
//! they are handed to the assembler.

use crate::audio::{AudioClip, NarratedClip};
use crate::config::SynthesisSettings;
use crate::error::{PipelineError, Result, SynthesisError};
use crate::text::Segment;
use crate::tts::SpeechSynthesizer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinHandle;

/// What to do when a segment cannot be synthesized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Leave the segment out of the track and keep going
    #[default]
    Skip,
    /// Fail the whole run
    Abort,
}

/// Progress reported after every finished synthesis call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerProgress {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
}

impl SchedulerProgress {
    pub fn finished(&self) -> usize {
        self.completed + self.failed
    }
}

#[derive(Debug)]
pub struct SegmentFailure {
    pub segment_id: usize,
    pub error: SynthesisError,
}

/// Outcome of synthesizing a run's segments.
#[derive(Debug, Default)]
pub struct SynthesisReport {
    /// Successful clips in segment id order
    pub clips: Vec<NarratedClip>,
    /// Skipped segments in id order
    pub failures: Vec<SegmentFailure>,
}

impl SynthesisReport {
    pub fn failed_ids(&self) -> Vec<usize> {
        self.failures.iter().map(|f| f.segment_id).collect()
    }
}

pub struct SynthesisScheduler {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    max_concurrent: usize,
    timeout: Duration,
    policy: FailurePolicy,
}

impl SynthesisScheduler {
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>, settings: &SynthesisSettings) -> Self {
        Self {
            synthesizer,
            max_concurrent: settings.max_concurrent.max(1),
            timeout: Duration::from_secs(settings.timeout_secs),
            policy: settings.failure_policy,
        }
    }

    /// Synthesize every segment with `voice`.
    ///
    /// Under [`FailurePolicy::Abort`] the first failure cancels the calls
    /// still running and ends the run.
    pub async fn run<F>(&self, segments: &[Segment], voice: &str, mut on_progress: F) -> Result<SynthesisReport>
    where
        F: FnMut(SchedulerProgress),
    {
        log::info!(
            "Synthesizing {} segments with {} (up to {} at once)",
            segments.len(),
            self.synthesizer.name(),
            self.max_concurrent
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let (tx, mut rx) = mpsc::channel::<(usize, std::result::Result<AudioClip, SynthesisError>)>(
            self.max_concurrent * 2,
        );

        let handles: Vec<(usize, JoinHandle<()>)> = segments
            .iter()
            .map(|segment| {
                let semaphore = Arc::clone(&semaphore);
                let synthesizer = Arc::clone(&self.synthesizer);
                let tx = tx.clone();
                let id = segment.id;
                let text = segment.text.clone();
                let voice = voice.to_string();
                let timeout = self.timeout;

                let handle = tokio::spawn(async move {
                    let Ok(_permit) = semaphore.acquire_owned().await else {
                        return;
                    };
                    let result = synthesize_clip(synthesizer.as_ref(), &text, &voice, timeout).await;
                    let _ = tx.send((id, result)).await;
                });
                (id, handle)
            })
            .collect();
        drop(tx);

        let mut clips: BTreeMap<usize, AudioClip> = BTreeMap::new();
        let mut failures: BTreeMap<usize, SynthesisError> = BTreeMap::new();
        let progress = |clips: &BTreeMap<usize, AudioClip>, failures: &BTreeMap<usize, SynthesisError>| {
            SchedulerProgress {
                total: segments.len(),
                completed: clips.len(),
                failed: failures.len(),
            }
        };

        while let Some((id, result)) = rx.recv().await {
            if let Err(e) = self.record(id, result, &mut clips, &mut failures) {
                handles.iter().for_each(|(_, handle)| handle.abort());
                return Err(e);
            }
            on_progress(progress(&clips, &failures));
        }

        // The channel only closes once every task is gone, so a segment with
        // no result here belongs to a task that died before sending one.
        for (id, handle) in handles {
            let outcome = handle.await;
            if clips.contains_key(&id) || failures.contains_key(&id) {
                continue;
            }
            let message = match outcome {
                Err(e) if e.is_panic() => "synthesis task panicked",
                _ => "synthesis task ended without a result",
            };
            let error = SynthesisError::Backend(message.to_string());
            self.record(id, Err(error), &mut clips, &mut failures)?;
            on_progress(progress(&clips, &failures));
        }

        let clips = segments
            .iter()
            .filter_map(|segment| {
                clips.remove(&segment.id).map(|clip| NarratedClip {
                    segment_id: segment.id,
                    clip,
                    pause_after_ms: segment.pause_ms,
                })
            })
            .collect();
        let failures = failures
            .into_iter()
            .map(|(segment_id, error)| SegmentFailure { segment_id, error })
            .collect();

        Ok(SynthesisReport { clips, failures })
    }

    /// File one segment's result. Under [`FailurePolicy::Abort`] a failure
    /// comes back as the run's error instead.
    fn record(
        &self,
        id: usize,
        result: std::result::Result<AudioClip, SynthesisError>,
        clips: &mut BTreeMap<usize, AudioClip>,
        failures: &mut BTreeMap<usize, SynthesisError>,
    ) -> Result<()> {
        match result {
            Ok(clip) => {
                log::debug!("Segment {} synthesized ({} ms)", id, clip.duration_ms());
                clips.insert(id, clip);
            }
            Err(error) => {
                if self.policy == FailurePolicy::Abort {
                    return Err(PipelineError::SynthesisAborted {
                        segment_id: id,
                        source: error,
                    });
                }
                log::warn!("Skipping segment {}: {}", id, error);
                failures.insert(id, error);
            }
        }
        Ok(())
    }
}

async fn synthesize_clip(
    synthesizer: &dyn SpeechSynthesizer,
    text: &str,
    voice: &str,
    timeout: Duration,
) -> std::result::Result<AudioClip, SynthesisError> {
    match tokio::time::timeout(timeout, synthesizer.synthesize(text, voice)).await {
        Ok(Ok(bytes)) => AudioClip::from_wav_bytes(&bytes),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(SynthesisError::Timeout {
            secs: timeout.as_secs(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::PauseClass;
    use crate::tts::mock::MockSynthesizer;

    fn segment(id: usize, text: &str, pause: PauseClass) -> Segment {
        Segment {
            id,
            text: text.to_string(),
            pause,
            pause_ms: pause.default_ms(),
        }
    }

    fn segments() -> Vec<Segment> {
        vec![
            segment(1, "Chapter One", PauseClass::Chapter),
            segment(2, "First sentence.", PauseClass::Sentence),
            segment(3, "\"Hello,\" she said.", PauseClass::Dialogue),
            segment(4, "Last sentence.", PauseClass::Paragraph),
        ]
    }

    fn scheduler(synth: Arc<MockSynthesizer>, settings: SynthesisSettings) -> SynthesisScheduler {
        SynthesisScheduler::new(synth, &settings)
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_in_id_order() {
        let synth = Arc::new(
            MockSynthesizer::new(100)
                .delayed_on("Chapter", Duration::from_millis(300))
                .delayed_on("First", Duration::from_millis(200)),
        );
        let scheduler = scheduler(synth.clone(), SynthesisSettings::default());

        let report = scheduler.run(&segments(), "voice-a", |_| {}).await.unwrap();

        let ids: Vec<usize> = report.clips.iter().map(|c| c.segment_id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        let pauses: Vec<u32> = report.clips.iter().map(|c| c.pause_after_ms).collect();
        assert_eq!(pauses, vec![3000, 600, 700, 1200]);
        assert!(report.failures.is_empty());
        assert_eq!(synth.call_count(), 4);
        assert!(synth.voices().iter().all(|v| v == "voice-a"));
    }

    #[tokio::test]
    async fn test_skip_keeps_pauses_aligned() {
        let synth = Arc::new(MockSynthesizer::new(100).failing_on("First"));
        let scheduler = scheduler(synth, SynthesisSettings::default());

        let report = scheduler.run(&segments(), "v", |_| {}).await.unwrap();

        assert_eq!(report.failed_ids(), vec![2]);
        let kept: Vec<(usize, u32)> = report
            .clips
            .iter()
            .map(|c| (c.segment_id, c.pause_after_ms))
            .collect();
        assert_eq!(kept, vec![(1, 3000), (3, 700), (4, 1200)]);
    }

    #[tokio::test]
    async fn test_undecodable_audio_is_a_failure() {
        let synth = Arc::new(MockSynthesizer::new(100).garbage_on("Last"));
        let scheduler = scheduler(synth, SynthesisSettings::default());

        let report = scheduler.run(&segments(), "v", |_| {}).await.unwrap();
        assert_eq!(report.failed_ids(), vec![4]);
        assert!(matches!(
            report.failures[0].error,
            SynthesisError::InvalidAudio(_)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_a_failure() {
        let synth = Arc::new(MockSynthesizer::new(100).hanging_on("Hello"));
        let settings = SynthesisSettings {
            timeout_secs: 5,
            ..SynthesisSettings::default()
        };
        let report = scheduler(synth, settings)
            .run(&segments(), "v", |_| {})
            .await
            .unwrap();

        assert_eq!(report.failed_ids(), vec![3]);
        assert!(matches!(
            report.failures[0].error,
            SynthesisError::Timeout { secs: 5 }
        ));
        assert_eq!(report.clips.len(), 3);
    }

    #[tokio::test]
    async fn test_abort_policy_fails_run() {
        let synth = Arc::new(MockSynthesizer::new(100).failing_on("Hello"));
        let settings = SynthesisSettings {
            failure_policy: FailurePolicy::Abort,
            ..SynthesisSettings::default()
        };

        let err = scheduler(synth, settings)
            .run(&segments(), "v", |_| {})
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::SynthesisAborted { segment_id: 3, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_is_bounded() {
        let mut synth = MockSynthesizer::new(50);
        for text in ["Chapter", "First", "Hello", "Last"] {
            synth = synth.delayed_on(text, Duration::from_millis(100));
        }
        let synth = Arc::new(synth);
        let settings = SynthesisSettings {
            max_concurrent: 2,
            ..SynthesisSettings::default()
        };

        let report = scheduler(synth.clone(), settings)
            .run(&segments(), "v", |_| {})
            .await
            .unwrap();

        assert_eq!(report.clips.len(), 4);
        assert_eq!(synth.max_in_flight(), 2);
    }

    #[tokio::test]
    async fn test_progress_after_every_call() {
        let synth = Arc::new(MockSynthesizer::new(50).failing_on("Last"));
        let scheduler = scheduler(synth, SynthesisSettings::default());

        let mut seen = Vec::new();
        scheduler
            .run(&segments(), "v", |p| seen.push(p))
            .await
            .unwrap();

        assert_eq!(seen.len(), 4);
        let last = seen.last().unwrap();
        assert_eq!(last.total, 4);
        assert_eq!(last.completed, 3);
        assert_eq!(last.failed, 1);
        assert_eq!(last.finished(), 4);
    }

    #[tokio::test]
    async fn test_panicked_task_is_a_failure() {
        let synth = Arc::new(MockSynthesizer::new(50).panicking_on("First"));
        let scheduler = scheduler(synth, SynthesisSettings::default());

        let mut seen = Vec::new();
        let report = scheduler
            .run(&segments(), "v", |p| seen.push(p))
            .await
            .unwrap();

        assert_eq!(report.failed_ids(), vec![2]);
        match &report.failures[0].error {
            SynthesisError::Backend(message) => assert_eq!(message, "synthesis task panicked"),
            other => panic!("unexpected error: {:?}", other),
        }
        let kept: Vec<usize> = report.clips.iter().map(|c| c.segment_id).collect();
        assert_eq!(kept, vec![1, 3, 4]);

        let last = seen.last().unwrap();
        assert_eq!(last.total, 4);
        assert_eq!(last.failed, 1);
        assert_eq!(last.finished(), 4);
    }

    #[tokio::test]
    async fn test_panicked_task_aborts_run() {
        let synth = Arc::new(MockSynthesizer::new(50).panicking_on("Last"));
        let settings = SynthesisSettings {
            failure_policy: FailurePolicy::Abort,
            ..SynthesisSettings::default()
        };

        let err = scheduler(synth, settings)
            .run(&segments(), "v", |_| {})
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::SynthesisAborted { segment_id: 4, .. }
        ));
    }

    #[tokio::test]
    async fn test_no_segments() {
        let synth = Arc::new(MockSynthesizer::new(50));
        let report = scheduler(synth.clone(), SynthesisSettings::default())
            .run(&[], "v", |_| {})
            .await
            .unwrap();
        assert!(report.clips.is_empty());
        assert_eq!(synth.call_count(), 0);
    }
}

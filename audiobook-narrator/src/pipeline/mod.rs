//! The narration run: chapter selection, segmentation, synthesis and assembly.

pub mod scheduler;

pub use scheduler::{
    FailurePolicy, SchedulerProgress, SegmentFailure, SynthesisReport, SynthesisScheduler,
};

use crate::audio::{AudioAssembler, AudioClip};
use crate::book::BookData;
use crate::error::{PipelineError, Result};
use crate::text::{Segment, SegmentClassifier};
use std::ops::RangeInclusive;

/// Settings of a single narration run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Engine voice id
    pub voice: String,
    pub room_tone: bool,
    /// Inclusive chapter index range; `None` narrates every chapter
    pub chapters: Option<RangeInclusive<usize>>,
}

impl RunConfig {
    pub fn new(voice: impl Into<String>) -> Self {
        Self {
            voice: voice.into(),
            room_tone: true,
            chapters: None,
        }
    }

    pub fn with_room_tone(mut self, room_tone: bool) -> Self {
        self.room_tone = room_tone;
        self
    }

    /// Restrict the run to chapters `start..=end`.
    pub fn with_chapters(mut self, start: usize, end: usize) -> Result<Self> {
        if start > end {
            return Err(PipelineError::InvalidRange { start, end });
        }
        self.chapters = Some(start..=end);
        Ok(self)
    }
}

/// Result of a completed run.
#[derive(Debug)]
pub struct Narration {
    pub track: AudioClip,
    /// Segments planned for the run
    pub segment_count: usize,
    /// Segments left out because synthesis failed
    pub skipped: Vec<usize>,
}

/// Select the run's chapters and split them into segments.
pub fn plan(book: &BookData, run: &RunConfig, classifier: &SegmentClassifier) -> Result<Vec<Segment>> {
    if book.chapters.is_empty() {
        return Err(PipelineError::NoChapters);
    }

    let segments = match &run.chapters {
        Some(range) => {
            let chapters = book.select(range);
            if chapters.is_empty() {
                return Err(PipelineError::EmptySelection {
                    start: *range.start(),
                    end: *range.end(),
                });
            }
            classifier.classify(&chapters)
        }
        None => classifier.classify(&book.chapters),
    };

    if segments.is_empty() {
        return Err(PipelineError::NoSegments);
    }
    log::info!("Planned {} segments", segments.len());
    Ok(segments)
}

/// Narrate a book into a single track.
pub async fn narrate<F>(
    book: &BookData,
    run: &RunConfig,
    classifier: &SegmentClassifier,
    scheduler: &SynthesisScheduler,
    assembler: &AudioAssembler,
    on_progress: F,
) -> Result<Narration>
where
    F: FnMut(SchedulerProgress),
{
    let segments = plan(book, run, classifier)?;
    let report = scheduler.run(&segments, &run.voice, on_progress).await?;

    if report.clips.is_empty() {
        return Err(PipelineError::NoAudio);
    }
    if !report.failures.is_empty() {
        log::warn!(
            "{} of {} segments were skipped",
            report.failures.len(),
            segments.len()
        );
    }

    let track = assembler.assemble_narration(&report.clips, run.room_tone);
    Ok(Narration {
        track,
        segment_count: segments.len(),
        skipped: report.failed_ids(),
    })
}

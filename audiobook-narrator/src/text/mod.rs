//! Text processing: cleaning extracted text and splitting it into narration segments.

pub mod cleaner;
pub mod rules;
pub mod segmenter;

pub use cleaner::{deep_clean, light_clean};
pub use rules::SegmentRules;
pub use segmenter::SegmentClassifier;

use serde::{Deserialize, Serialize};
use std::fmt;

/// How much silence follows a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PauseClass {
    /// Between sentences of one paragraph
    Sentence,
    /// After the last sentence of a paragraph
    Paragraph,
    /// After a line of dialogue
    Dialogue,
    /// After a chapter title
    Chapter,
}

impl PauseClass {
    /// Default pause length in milliseconds.
    pub const fn default_ms(self) -> u32 {
        match self {
            Self::Sentence => 600,
            Self::Paragraph => 1200,
            Self::Dialogue => 700,
            Self::Chapter => 3000,
        }
    }
}

impl fmt::Display for PauseClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sentence => "SENTENCE",
            Self::Paragraph => "PARAGRAPH",
            Self::Dialogue => "DIALOGUE",
            Self::Chapter => "CHAPTER",
        };
        f.pad(name)
    }
}

/// Pause length per class, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PauseDurations {
    pub sentence_ms: u32,
    pub paragraph_ms: u32,
    pub dialogue_ms: u32,
    pub chapter_ms: u32,
}

impl Default for PauseDurations {
    fn default() -> Self {
        Self {
            sentence_ms: PauseClass::Sentence.default_ms(),
            paragraph_ms: PauseClass::Paragraph.default_ms(),
            dialogue_ms: PauseClass::Dialogue.default_ms(),
            chapter_ms: PauseClass::Chapter.default_ms(),
        }
    }
}

impl PauseDurations {
    pub fn for_class(&self, class: PauseClass) -> u32 {
        match class {
            PauseClass::Sentence => self.sentence_ms,
            PauseClass::Paragraph => self.paragraph_ms,
            PauseClass::Dialogue => self.dialogue_ms,
            PauseClass::Chapter => self.chapter_ms,
        }
    }
}

/// A single narration unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    /// Narration order, strictly increasing from 1
    pub id: usize,
    /// Text to synthesize
    pub text: String,
    /// Pause class of the silence that follows
    pub pause: PauseClass,
    /// Pause length derived from the class
    pub pause_ms: u32,
}

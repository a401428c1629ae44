//! Splitting chapter text into narration segments and classifying their pauses.

use super::rules::SegmentRules;
use super::{PauseClass, PauseDurations, Segment};
use crate::book::Chapter;
use crate::error::ConfigError;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Minimum number of characters a segment must exceed.
const MIN_SEGMENT_CHARS: usize = 2;

/// Sentence-ending punctuation followed by whitespace.
static SENTENCE_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]\s+").expect("sentence end pattern is valid"));

static PARAGRAPH_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*\n").expect("paragraph break pattern is valid"));

/// Placeholder standing in for a protected abbreviation. Private-use
/// delimiters keep it from ever looking like a sentence boundary.
static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new("\u{E000}([0-9]+)\u{E001}").expect("placeholder pattern is valid"));

fn placeholder(index: usize) -> String {
    format!("\u{E000}{}\u{E001}", index)
}

/// Turns chapters into an ordered list of narration segments.
#[derive(Debug, Clone)]
pub struct SegmentClassifier {
    abbreviations: Option<Regex>,
    said: Option<Regex>,
    quote_marks: Vec<char>,
    dialogue_dashes: Vec<char>,
    durations: PauseDurations,
}

impl SegmentClassifier {
    /// Build a classifier from rule tables and pause durations.
    pub fn new(rules: &SegmentRules, durations: PauseDurations) -> Result<Self, ConfigError> {
        Ok(Self {
            abbreviations: rules.abbreviation_pattern()?,
            said: rules.said_pattern()?,
            quote_marks: rules.quote_marks.chars().collect(),
            dialogue_dashes: rules.dialogue_dashes.chars().collect(),
            durations,
        })
    }

    /// Segment the chapters in order.
    ///
    /// Each titled chapter contributes a CHAPTER segment before its body.
    /// Ids start at 1 and increase across the whole chapter list.
    pub fn classify(&self, chapters: &[Chapter]) -> Vec<Segment> {
        let mut segments = Vec::new();
        let mut next_id = 1;

        for chapter in chapters {
            let title = chapter.title.trim();
            if title.chars().count() > MIN_SEGMENT_CHARS {
                segments.push(self.segment(next_id, title.to_string(), PauseClass::Chapter));
                next_id += 1;
            } else if !title.is_empty() {
                log::debug!("Chapter {} title {:?} too short to narrate", chapter.index, title);
            }

            for paragraph in split_paragraphs(&chapter.text) {
                let sentences = self.split_sentences(paragraph);
                let last = sentences.len().saturating_sub(1);

                for (i, sentence) in sentences.into_iter().enumerate() {
                    let pause = self.pause_class(&sentence, i == last);
                    segments.push(self.segment(next_id, sentence, pause));
                    next_id += 1;
                }
            }
        }

        segments
    }

    /// Split a paragraph into sentences without breaking at abbreviations.
    pub fn split_sentences(&self, text: &str) -> Vec<String> {
        let mut originals: Vec<String> = Vec::new();
        let protected = match &self.abbreviations {
            Some(re) => re
                .replace_all(text, |caps: &Captures<'_>| {
                    let ph = placeholder(originals.len());
                    originals.push(caps[0].to_string());
                    ph
                })
                .into_owned(),
            None => text.to_string(),
        };

        split_at_sentence_ends(&protected)
            .into_iter()
            .map(|fragment| restore_placeholders(fragment, &originals))
            .map(|sentence| sentence.trim().to_string())
            .filter(|sentence| sentence.chars().count() > MIN_SEGMENT_CHARS)
            .collect()
    }

    /// Pause class for a sentence; dialogue wins over paragraph end.
    pub fn pause_class(&self, sentence: &str, last_in_paragraph: bool) -> PauseClass {
        if self.is_dialogue(sentence) {
            PauseClass::Dialogue
        } else if last_in_paragraph {
            PauseClass::Paragraph
        } else {
            PauseClass::Sentence
        }
    }

    pub fn is_dialogue(&self, sentence: &str) -> bool {
        let mut chars = sentence.chars();
        let first = chars.next();
        let second = chars.next();

        match first {
            Some(c) if self.quote_marks.contains(&c) => return true,
            Some(c) if self.dialogue_dashes.contains(&c) && second.is_some_and(char::is_whitespace) => {
                return true;
            }
            _ => {}
        }

        self.said.as_ref().is_some_and(|re| re.is_match(sentence))
    }

    fn segment(&self, id: usize, text: String, pause: PauseClass) -> Segment {
        Segment {
            id,
            text,
            pause,
            pause_ms: self.durations.for_class(pause),
        }
    }
}

fn split_paragraphs(text: &str) -> impl Iterator<Item = &str> {
    PARAGRAPH_BREAK
        .split(text)
        .map(str::trim)
        .filter(|p| !p.is_empty())
}

/// Split after `.`, `!` or `?` when whitespace and then a cased letter follow.
fn split_at_sentence_ends(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;

    for m in SENTENCE_END.find_iter(text) {
        let next = text[m.end()..].chars().next();
        if next.is_some_and(|c| c.is_uppercase() || c.is_lowercase()) {
            // punctuation marks are single-byte
            parts.push(&text[start..m.start() + 1]);
            start = m.end();
        }
    }
    parts.push(&text[start..]);

    parts
}

fn restore_placeholders(fragment: &str, originals: &[String]) -> String {
    if originals.is_empty() {
        return fragment.to_string();
    }
    PLACEHOLDER
        .replace_all(fragment, |caps: &Captures<'_>| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|i| originals.get(i))
                .cloned()
                .unwrap_or_default()
        })
        .into_owned()
}

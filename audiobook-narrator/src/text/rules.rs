//! Locale rule tables for sentence splitting and dialogue detection.

use crate::error::ConfigError;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Heuristic rule tables used by the segment classifier.
///
/// Defaults cover English and Turkish narration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentRules {
    /// Tokens whose trailing period never ends a sentence (without the period)
    pub abbreviations: Vec<String>,
    /// Characters that open a quoted line of dialogue
    pub quote_marks: String,
    /// Characters that open a dash-introduced line of dialogue when followed by whitespace
    pub dialogue_dashes: String,
    /// Verbs that mark dialogue when they end a sentence ("said")
    pub said_verbs: Vec<String>,
}

impl Default for SegmentRules {
    fn default() -> Self {
        Self {
            abbreviations: [
                "Dr", "Prof", "Mr", "Mrs", "Ms", "St", "Jr", "Sr", "vs", "e.g", "i.e", "vb",
                "bkz", "örn",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            // double quotes only; a leading apostrophe is usually an elision
            quote_marks: "\"“”„«»".to_string(),
            dialogue_dashes: "-–—".to_string(),
            said_verbs: vec!["dedi".to_string(), "said".to_string()],
        }
    }
}

impl SegmentRules {
    /// Pattern matching an abbreviation, its period and trailing whitespace.
    pub(crate) fn abbreviation_pattern(&self) -> Result<Option<Regex>, ConfigError> {
        let tokens: Vec<String> = self
            .abbreviations
            .iter()
            .map(|a| a.trim().trim_end_matches('.'))
            .filter(|a| !a.is_empty())
            .map(regex::escape)
            .collect();
        if tokens.is_empty() {
            return Ok(None);
        }

        let pattern = format!(r"(?i)\b(?:{})\.\s*", tokens.join("|"));
        Regex::new(&pattern)
            .map(Some)
            .map_err(|e| ConfigError::InvalidRule {
                table: "abbreviations",
                message: e.to_string(),
            })
    }

    /// Pattern matching a sentence that ends with a said-verb.
    pub(crate) fn said_pattern(&self) -> Result<Option<Regex>, ConfigError> {
        let verbs: Vec<String> = self
            .said_verbs
            .iter()
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(regex::escape)
            .collect();
        if verbs.is_empty() {
            return Ok(None);
        }

        let pattern = format!(r"(?i)(?:{})[.!,]?$", verbs.join("|"));
        Regex::new(&pattern)
            .map(Some)
            .map_err(|e| ConfigError::InvalidRule {
                table: "said_verbs",
                message: e.to_string(),
            })
    }
}

//! Book and chapter types produced by document extraction.

use serde::Serialize;
use std::fmt;
use std::ops::RangeInclusive;

/// Sentinel used when a document carries no title or author metadata.
pub const UNKNOWN: &str = "Unknown";

/// Container variant a book was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerKind {
    /// Reflowable container (EPUB).
    Epub,
    /// Fixed-layout container (PDF).
    Pdf,
}

impl ContainerKind {
    /// Resolve a container kind from an extension-like discriminator.
    ///
    /// Accepts `epub`, `.epub`, `pdf` and `.pdf` in any case.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "epub" => Some(Self::Epub),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Epub => write!(f, "epub"),
            Self::Pdf => write!(f, "pdf"),
        }
    }
}

/// A chapter extracted from a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chapter {
    /// 1-based position in extraction order
    pub index: usize,
    /// Chapter title, empty when the source has none
    pub title: String,
    /// Cleaned body text
    pub text: String,
}

impl Chapter {
    pub fn new(index: usize, title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            index,
            title: title.into(),
            text: text.into(),
        }
    }

    /// Number of characters in the body text.
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    /// Title for display, falling back to a placeholder for untitled chapters.
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            "(untitled)"
        } else {
            &self.title
        }
    }
}

/// A parsed book.
#[derive(Debug, Clone, Serialize)]
pub struct BookData {
    /// Book title
    pub title: String,
    /// Book author
    pub author: String,
    /// Chapters ordered by index
    pub chapters: Vec<Chapter>,
    /// Container the book was read from
    pub format: ContainerKind,
}

impl BookData {
    /// Total character count across all chapters.
    pub fn total_chars(&self) -> usize {
        self.chapters.iter().map(Chapter::char_count).sum()
    }

    /// Chapters whose index falls inside the inclusive range.
    pub fn select(&self, range: &RangeInclusive<usize>) -> Vec<Chapter> {
        self.chapters
            .iter()
            .filter(|c| range.contains(&c.index))
            .cloned()
            .collect()
    }
}

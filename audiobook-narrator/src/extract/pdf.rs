//! PDF text extraction with running header/footer removal.
//!
//! Fixed-layout documents carry no chapter structure, so the whole document
//! becomes a single untitled chapter. Most of the work is removing what page
//! layout leaves behind: running titles repeated at the top or bottom of every
//! page, page numbers, and words hyphenated across line breaks.

use super::parse_error;
use crate::book::{BookData, Chapter, ContainerKind, UNKNOWN};
use crate::error::ExtractError;
use crate::text::deep_clean;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Number of leading pages inspected for running headers and footers.
pub const SAMPLE_PAGES: usize = 20;

/// A candidate must repeat on at least this many sampled pages.
pub const MIN_REPEATS: usize = 3;

/// Longer lines are body text even when they repeat.
pub const MAX_RUNNING_LINE_CHARS: usize = 100;

/// `12` or `- 12 -`
static PAGE_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:\s*\d+\s*|\s*-\s*\d+\s*-\s*)$").expect("page number pattern is valid")
});

/// Parse a PDF file into a single-chapter book.
pub fn extract_pdf(path: &Path) -> Result<BookData, ExtractError> {
    let bytes = std::fs::read(path)?;
    let pages = pdf_extract::extract_text_from_mem_by_pages(&bytes)
        .map_err(|e| parse_error(ContainerKind::Pdf, e))?;

    log::info!("Extracted {} pages from {}", pages.len(), path.display());
    Ok(book_from_pages(title_from_path(path), &pages))
}

/// PDFs are titled after their file name without the extension.
fn title_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Build a book from per-page text.
pub fn book_from_pages(title: String, pages: &[String]) -> BookData {
    let filter = RunningLineFilter::detect(pages);
    if filter.is_empty() {
        log::debug!("No running headers or footers detected");
    } else {
        log::debug!("Detected {} running header/footer lines", filter.len());
    }

    let page_texts: Vec<String> = pages
        .iter()
        .map(|page| filter.clean_page(page))
        .filter(|text| !text.is_empty())
        .collect();

    let text = deep_clean(&page_texts.join("\n\n"));
    if text.is_empty() {
        log::warn!("No text could be extracted; the PDF may be a scanned image");
    }

    BookData {
        title,
        author: UNKNOWN.to_string(),
        chapters: vec![Chapter::new(1, "", text)],
        format: ContainerKind::Pdf,
    }
}

/// Set of lowercase lines recognised as running headers or footers.
#[derive(Debug, Default, Clone)]
pub struct RunningLineFilter {
    blacklist: HashSet<String>,
}

impl RunningLineFilter {
    /// Tally the first and last non-empty line of each sampled page.
    ///
    /// Headers and footers are counted separately, ignoring case.
    pub fn detect(pages: &[String]) -> Self {
        let mut headers: HashMap<String, usize> = HashMap::new();
        let mut footers: HashMap<String, usize> = HashMap::new();

        for page in pages.iter().take(SAMPLE_PAGES) {
            let mut lines = page.lines().map(str::trim).filter(|l| !l.is_empty());
            let Some(first) = lines.next() else {
                continue;
            };
            let last = lines.last().unwrap_or(first);

            *headers.entry(first.to_lowercase()).or_default() += 1;
            *footers.entry(last.to_lowercase()).or_default() += 1;
        }

        let blacklist = headers
            .into_iter()
            .chain(footers)
            .filter(|(line, count)| {
                *count >= MIN_REPEATS && line.chars().count() < MAX_RUNNING_LINE_CHARS
            })
            .map(|(line, _)| line)
            .collect();

        Self { blacklist }
    }

    pub fn len(&self) -> usize {
        self.blacklist.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blacklist.is_empty()
    }

    pub fn contains(&self, line: &str) -> bool {
        self.blacklist.contains(&line.trim().to_lowercase())
    }

    /// Remove running lines and page numbers from one page.
    /// Blank lines are kept as paragraph breaks.
    pub fn clean_page(&self, page: &str) -> String {
        page.lines()
            .map(str::trim)
            .filter(|line| line.is_empty() || !(self.contains(line) || is_page_number(line)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn is_page_number(line: &str) -> bool {
    PAGE_NUMBER.is_match(line)
}

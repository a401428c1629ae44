//! Text cleaning applied after document extraction.
//!
//! Two levels exist. [`light_clean`] is enough for reflowable documents whose
//! markup already carries structure. [`deep_clean`] additionally repairs the
//! artifacts of fixed-layout text extraction: compatibility characters,
//! repeated running lines, words hyphenated across line breaks and the blank
//! runs left where page furniture was removed.
//!
//! Both functions are idempotent.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Any whitespace run that does not contain a newline.
static HORIZONTAL_WS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\S\n]+").expect("horizontal whitespace pattern is valid"));

static BLANK_RUNS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("blank run pattern is valid"));

/// A word split by a hyphen at a line break, e.g. `exam-\n  ple`.
static HYPHEN_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\w)-\n\s*(\w)").expect("hyphen break pattern is valid"));

static SPACE_RUNS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r" {2,}").expect("space run pattern is valid"));

/// Normalize whitespace in extracted text.
///
/// Collapses horizontal whitespace to single spaces, trims every line,
/// collapses three or more newlines to a paragraph break and trims the
/// result.
pub fn light_clean(text: &str) -> String {
    let text = HORIZONTAL_WS.replace_all(text, " ");
    let text = text.lines().map(str::trim).collect::<Vec<_>>().join("\n");
    let text = BLANK_RUNS.replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Clean text produced by fixed-layout extraction.
///
/// Every pass only removes characters once the text is NFKC-normalized, so
/// repeating it until nothing changes terminates and makes the result stable.
pub fn deep_clean(text: &str) -> String {
    let mut current = deep_clean_pass(text);
    loop {
        let next = deep_clean_pass(&current);
        if next == current {
            return next;
        }
        current = next;
    }
}

fn deep_clean_pass(text: &str) -> String {
    let text: String = text.nfkc().collect();
    let text = drop_repeated_lines(&text);
    let text = HYPHEN_BREAK.replace_all(&text, "${1}${2}");
    let text = SPACE_RUNS.replace_all(&text, " ");
    let text = BLANK_RUNS.replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Drop lines identical (after trimming) to the line before them.
/// A blank line resets the comparison.
fn drop_repeated_lines(text: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    let mut prev: Option<&str> = None;

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            kept.push("");
            prev = None;
            continue;
        }
        if prev == Some(trimmed) {
            continue;
        }
        kept.push(line);
        prev = Some(trimmed);
    }

    kept.join("\n")
}

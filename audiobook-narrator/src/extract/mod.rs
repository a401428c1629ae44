//! Document extraction: EPUB and PDF containers into chapter-structured books.

pub mod epub;
pub mod pdf;

use crate::book::{BookData, ContainerKind};
use crate::error::ExtractError;
use std::fmt::Display;
use std::path::Path;

/// Extract a book from `path`, treating it as the container named by `kind`.
///
/// `kind` is an extension-like discriminator such as `epub` or `.pdf`.
pub fn extract(path: &Path, kind: &str) -> Result<BookData, ExtractError> {
    let kind = ContainerKind::from_extension(kind)
        .ok_or_else(|| ExtractError::UnsupportedFormat(kind.to_string()))?;

    log::info!("Parsing {} document: {}", kind, path.display());
    match kind {
        ContainerKind::Epub => epub::extract_epub(path),
        ContainerKind::Pdf => pdf::extract_pdf(path),
    }
}

/// Extract a book, taking the container kind from the file extension.
pub fn extract_file(path: &Path) -> Result<BookData, ExtractError> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    extract(path, &ext)
}

pub(crate) fn parse_error(kind: ContainerKind, err: impl Display) -> ExtractError {
    ExtractError::Parse {
        kind,
        message: err.to_string(),
    }
}

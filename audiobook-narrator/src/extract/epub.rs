// EPUB parsing and chapter text extraction

use super::parse_error;
use crate::book::{BookData, Chapter, ContainerKind, UNKNOWN};
use crate::error::ExtractError;
use crate::text::light_clean;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::path::Path;

/// Chapters with less cleaned text than this are cover, toc or copyright pages.
pub const MIN_CHAPTER_CHARS: usize = 50;

/// Elements whose text is never narrated.
const NOISE_TAGS: &[&str] = &["script", "style", "nav", "header", "footer", "title"];

/// Elements that start a new paragraph in the extracted text.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "article", "aside", "blockquote", "li", "ul", "ol", "dd", "dt", "h1",
    "h2", "h3", "h4", "h5", "h6", "pre", "table", "tr", "td", "th", "figure", "figcaption", "hr",
    "body",
];

/// Title candidates, in order of preference.
static HEADING_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    ["h1", "h2", "h3"]
        .iter()
        .map(|tag| Selector::parse(tag).expect("heading selector is valid"))
        .collect()
});

/// Parse an EPUB file into chapters following the spine.
pub fn extract_epub(path: &Path) -> Result<BookData, ExtractError> {
    let mut doc = epub::doc::EpubDoc::new(path).map_err(|e| parse_error(ContainerKind::Epub, e))?;

    let title = doc
        .mdata("title")
        .map(|m| m.value.clone())
        .unwrap_or_else(|| UNKNOWN.to_string());
    let author = doc
        .mdata("creator")
        .map(|m| m.value.clone())
        .unwrap_or_else(|| UNKNOWN.to_string());

    let spine = doc.spine.clone();
    let mut documents = Vec::with_capacity(spine.len());
    for spine_item in spine.iter() {
        match doc.get_resource(&spine_item.idref) {
            Some((content_bytes, _mime)) => {
                documents.push(String::from_utf8_lossy(&content_bytes).into_owned());
            }
            None => log::warn!("Spine item {} has no resource, skipping", spine_item.idref),
        }
    }

    let chapters = chapters_from_documents(documents);
    log::info!(
        "Extracted {} chapters from {} spine items",
        chapters.len(),
        spine.len()
    );

    Ok(BookData {
        title,
        author,
        chapters,
        format: ContainerKind::Epub,
    })
}

/// Turn spine documents into chapters, numbering the kept ones from 1.
pub fn chapters_from_documents<I>(documents: I) -> Vec<Chapter>
where
    I: IntoIterator<Item = String>,
{
    let mut chapters = Vec::new();

    for (position, html) in documents.into_iter().enumerate() {
        let document = Html::parse_document(&html);
        let title = extract_heading(&document).unwrap_or_default();
        let text = light_clean(&visible_text(&document));

        if text.chars().count() < MIN_CHAPTER_CHARS {
            log::debug!(
                "Skipping spine item {} ({} chars of text)",
                position,
                text.chars().count()
            );
            continue;
        }

        chapters.push(Chapter::new(chapters.len() + 1, title, text));
    }

    chapters
}

/// Text of the first h1, else h2, else h3.
fn extract_heading(document: &Html) -> Option<String> {
    HEADING_SELECTORS.iter().find_map(|selector| {
        document
            .select(selector)
            .next()
            .map(|heading| heading.text().collect::<String>().trim().to_string())
    })
}

/// Visible text of a document with noise elements removed.
fn visible_text(document: &Html) -> String {
    let mut out = String::new();
    collect_text(document.root_element(), &mut out);
    out
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child_element) = ElementRef::wrap(child) {
            let name = child_element.value().name();
            if NOISE_TAGS.contains(&name) {
                continue;
            }
            if name == "br" {
                out.push('\n');
                continue;
            }

            let block = BLOCK_TAGS.contains(&name);
            if block {
                out.push_str("\n\n");
            }
            collect_text(child_element, out);
            if block {
                out.push_str("\n\n");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = "This paragraph has more than enough characters to count as a chapter.";

    fn xhtml(body: &str) -> String {
        format!(
            "<?xml version=\"1.0\"?><html><head><title>Ignored</title>\
             <style>p {{ color: red; }}</style></head><body>{}</body></html>",
            body
        )
    }

    #[test]
    fn test_heading_preference_order() {
        let doc = Html::parse_document(&xhtml("<h2>Second</h2><h1> First </h1><h3>Third</h3>"));
        assert_eq!(extract_heading(&doc), Some("First".to_string()));

        let doc = Html::parse_document(&xhtml("<h3>Third</h3><h2>Second</h2>"));
        assert_eq!(extract_heading(&doc), Some("Second".to_string()));

        let doc = Html::parse_document(&xhtml("<p>No headings</p>"));
        assert_eq!(extract_heading(&doc), None);
    }

    #[test]
    fn test_noise_elements_removed() {
        let doc = Html::parse_document(&xhtml(
            "<header>Running head</header><nav>Contents</nav>\
             <p>Kept <em>inline</em> text.</p><script>var x = 1;</script>\
             <footer>Page foot</footer>",
        ));
        let text = light_clean(&visible_text(&doc));
        assert_eq!(text, "Kept inline text.");
    }

    #[test]
    fn test_blocks_become_paragraphs() {
        let doc = Html::parse_document(&xhtml("<p>One.</p><p>Two.<br/>Three.</p>"));
        let text = light_clean(&visible_text(&doc));
        assert_eq!(text, "One.\n\nTwo.\nThree.");
    }

    #[test]
    fn test_short_chapters_filtered() {
        let exactly_49 = "a".repeat(49);
        let exactly_50 = "b".repeat(50);
        let chapters = chapters_from_documents(vec![
            xhtml(&format!("<p>{}</p>", exactly_49)),
            xhtml(&format!("<p>{}</p>", exactly_50)),
        ]);

        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].text, exactly_50);
        assert_eq!(chapters[0].index, 1);
    }

    #[test]
    fn test_indices_count_kept_chapters_only() {
        let chapters = chapters_from_documents(vec![
            xhtml("<h1>Cover</h1>"),
            xhtml(&format!("<h1>Chapter One</h1><p>{}</p>", BODY)),
            xhtml("<p>toc</p>"),
            xhtml(&format!("<h2>Chapter Two</h2><p>{}</p>", BODY)),
        ]);

        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].index, 1);
        assert_eq!(chapters[0].title, "Chapter One");
        assert!(chapters[0].text.ends_with(BODY));
        assert_eq!(chapters[1].index, 2);
        assert_eq!(chapters[1].title, "Chapter Two");
    }

    #[test]
    fn test_untitled_chapter_has_empty_title() {
        let chapters = chapters_from_documents(vec![xhtml(&format!("<p>{}</p>", BODY))]);
        assert_eq!(chapters[0].title, "");
    }

    #[test]
    fn test_invalid_epub_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.epub");
        std::fs::write(&path, b"not a zip archive").unwrap();

        let err = extract_epub(&path).unwrap_err();
        assert!(matches!(
            err,
            ExtractError::Parse {
                kind: ContainerKind::Epub,
                ..
            }
        ));
    }

    /// Write an EPUB whose spine lists `spine` idrefs over the given
    /// manifest `(id, href)` items and `(path, content)` files.
    fn write_epub(
        path: &Path,
        metadata: &str,
        manifest: &[(&str, &str)],
        spine: &[&str],
        files: &[(&str, String)],
    ) {
        use std::io::Write;
        use zip::write::SimpleFileOptions;

        let items: String = manifest
            .iter()
            .map(|(id, href)| {
                format!(
                    "<item id=\"{}\" href=\"{}\" media-type=\"application/xhtml+xml\"/>",
                    id, href
                )
            })
            .collect();
        let itemrefs: String = spine
            .iter()
            .map(|idref| format!("<itemref idref=\"{}\"/>", idref))
            .collect();
        let opf = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <package xmlns=\"http://www.idpf.org/2007/opf\" version=\"2.0\">\
             <metadata xmlns:dc=\"http://purl.org/dc/elements/1.1/\">{}</metadata>\
             <manifest>{}</manifest><spine>{}</spine></package>",
            metadata, items, itemrefs
        );
        let container = "<?xml version=\"1.0\"?>\
             <container version=\"1.0\" xmlns=\"urn:oasis:names:tc:opendocument:xmlns:container\">\
             <rootfiles><rootfile full-path=\"OEBPS/content.opf\" \
             media-type=\"application/oebps-package+xml\"/></rootfiles></container>";

        let stored = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        let mut writer = zip::ZipWriter::new(std::fs::File::create(path).unwrap());
        writer.start_file("mimetype", stored).unwrap();
        writer.write_all(b"application/epub+zip").unwrap();
        writer.start_file("META-INF/container.xml", stored).unwrap();
        writer.write_all(container.as_bytes()).unwrap();
        writer.start_file("OEBPS/content.opf", stored).unwrap();
        writer.write_all(opf.as_bytes()).unwrap();
        for (name, content) in files {
            writer.start_file(*name, stored).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_epub_follows_spine_and_skips_missing_resources() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.epub");
        write_epub(
            &path,
            "<dc:language>en</dc:language>",
            &[
                ("one", "text/one.xhtml"),
                ("two", "text/two.xhtml"),
                ("lost", "text/lost.xhtml"),
            ],
            &["two", "ghost", "one", "lost"],
            &[
                (
                    "OEBPS/text/one.xhtml",
                    xhtml(&format!("<h1>Chapter One</h1><p>{}</p>", BODY)),
                ),
                (
                    "OEBPS/text/two.xhtml",
                    xhtml(&format!("<h2>Chapter Two</h2><p>{}</p>", BODY)),
                ),
            ],
        );

        let book = extract_epub(&path).unwrap();

        assert_eq!(book.title, UNKNOWN);
        assert_eq!(book.author, UNKNOWN);
        assert_eq!(book.format, ContainerKind::Epub);
        let chapters: Vec<(usize, &str)> = book
            .chapters
            .iter()
            .map(|c| (c.index, c.title.as_str()))
            .collect();
        assert_eq!(chapters, vec![(1, "Chapter Two"), (2, "Chapter One")]);
        assert!(book.chapters[0].text.ends_with(BODY));
    }

    #[test]
    fn test_epub_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.epub");
        write_epub(
            &path,
            "<dc:title>Sefiller</dc:title><dc:creator>Victor Hugo</dc:creator>",
            &[("one", "one.xhtml")],
            &["one"],
            &[("OEBPS/one.xhtml", xhtml(&format!("<p>{}</p>", BODY)))],
        );

        let book = extract_epub(&path).unwrap();
        assert_eq!(book.title, "Sefiller");
        assert_eq!(book.author, "Victor Hugo");
        assert_eq!(book.chapters.len(), 1);
        assert_eq!(book.chapters[0].title, "");
    }
}

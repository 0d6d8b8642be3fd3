//! Turning files into [`Document`]s.
//!
//! [`DirectoryLoader`] walks a folder such as a notes export: `.txt` and
//! `.md` files are read verbatim, `.html`/`.htm` files are reduced to text
//! with [`html_to_text`], and `.pdf` files (feature `pdf`) go through
//! `pdf-extract`.

use std::path::{Path, PathBuf};

use scraper::{node::Node, ElementRef, Html};
use walkdir::WalkDir;

use crate::{Document, Error, Result};

/// A source of documents.
pub trait DocumentLoader {
    /// Load every document, in a stable order.
    fn load(&self) -> Result<Vec<Document>>;
}

const TEXT_EXTENSIONS: &[&str] = &["txt", "md"];
const HTML_EXTENSIONS: &[&str] = &["html", "htm"];
const PDF_EXTENSIONS: &[&str] = &["pdf"];

const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template"];
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "li", "h1", "h2", "h3", "h4", "h5", "h6", "tr", "blockquote", "pre", "section",
    "article", "header", "footer", "ul", "ol", "table", "title",
];

/// Recursively loads supported files under a root directory.
///
/// Files are visited in file-name order. Document ids are paths relative to
/// the root; sources are the full paths. Unreadable files are skipped.
#[derive(Debug, Clone)]
pub struct DirectoryLoader {
    root: PathBuf,
}

impl DirectoryLoader {
    /// Create a loader for `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory being walked.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl DocumentLoader for DirectoryLoader {
    fn load(&self) -> Result<Vec<Document>> {
        if !self.root.is_dir() {
            return Err(Error::Configuration(format!(
                "{} is not a directory",
                self.root.display()
            )));
        }

        let mut documents = Vec::new();
        for entry in WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let path = entry.path();
            if !is_supported(path) {
                continue;
            }

            match read_document(path) {
                Ok(mut document) => {
                    if let Ok(relative) = path.strip_prefix(&self.root) {
                        document.id = relative.display().to_string();
                    }
                    documents.push(document);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable file");
                }
            }
        }

        tracing::info!(root = %self.root.display(), documents = documents.len(), "loaded documents");
        Ok(documents)
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

fn is_supported(path: &Path) -> bool {
    extension(path).is_some_and(|ext| {
        TEXT_EXTENSIONS.contains(&ext.as_str())
            || HTML_EXTENSIONS.contains(&ext.as_str())
            || (cfg!(feature = "pdf") && PDF_EXTENSIONS.contains(&ext.as_str()))
    })
}

/// Read one file into a document whose id and source are its path.
///
/// HTML files are reduced to text, PDFs have their text layer extracted
/// (feature `pdf`), anything else is read verbatim. Invalid UTF-8 is
/// replaced rather than rejected.
///
/// # Errors
///
/// [`Error::Io`] if the file cannot be read, [`Error::Extract`] if a PDF
/// has no readable text layer or the `pdf` feature is off.
pub fn read_document(path: impl AsRef<Path>) -> Result<Document> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;

    let text = match extension(path) {
        Some(ext) if PDF_EXTENSIONS.contains(&ext.as_str()) => pdf_to_text(path, &bytes)?,
        Some(ext) if HTML_EXTENSIONS.contains(&ext.as_str()) => {
            html_to_text(&String::from_utf8_lossy(&bytes))
        }
        _ => String::from_utf8_lossy(&bytes).into_owned(),
    };

    Ok(Document::from_source(path.display().to_string(), text))
}

#[cfg(feature = "pdf")]
fn pdf_to_text(path: &Path, bytes: &[u8]) -> Result<String> {
    let text = pdf_extract::extract_text_from_mem(bytes).map_err(|e| Error::Extract {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(text.trim().to_string())
}

#[cfg(not(feature = "pdf"))]
fn pdf_to_text(path: &Path, _bytes: &[u8]) -> Result<String> {
    Err(Error::Extract {
        path: path.to_path_buf(),
        message: "built without the `pdf` feature".to_string(),
    })
}

/// Reduce an HTML page to readable text.
///
/// Parses the page, drops `<script>`/`<style>` subtrees and comments, ends
/// each block element with a line break, and collapses whitespace. Entities
/// are decoded by the parser.
///
/// ```rust
/// let text = quarry::html_to_text("<div>Dentist <b>Tuesday</b>&nbsp;9am</div><p>Bring card</p>");
/// assert_eq!(text, "Dentist Tuesday 9am\nBring card");
/// ```
#[must_use]
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut raw = String::with_capacity(html.len());
    collect_text(document.root_element(), &mut raw);
    normalize_lines(&raw)
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                out.extend(text.chars().map(|c| if c.is_whitespace() { ' ' } else { c }));
            }
            Node::Element(tag) => {
                let name = tag.name();
                if SKIPPED_TAGS.contains(&name) {
                    continue;
                }
                if name == "br" {
                    out.push('\n');
                    continue;
                }
                if let Some(inner) = ElementRef::wrap(child) {
                    collect_text(inner, out);
                }
                if BLOCK_TAGS.contains(&name) {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

/// Collapse whitespace per line and keep at most one blank line in a row.
fn normalize_lines(raw: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    for line in raw.lines() {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() && lines.last().map_or(true, String::is_empty) {
            continue;
        }
        lines.push(line);
    }
    while lines.last().is_some_and(String::is_empty) {
        lines.pop();
    }
    lines.join("\n")
}

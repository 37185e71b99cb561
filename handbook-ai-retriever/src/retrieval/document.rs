//! Loading source documents for indexing.
//!
//! The handbook ships as a PDF; text is extracted with the `pdftotext`
//! binary from poppler, which separates pages with form feeds. Plain text
//! and markdown files load directly as a single page, which keeps the rest
//! of the pipeline testable on machines without poppler.

use anyhow::{Context, Result, bail};
use std::path::Path;
use tokio::process::Command;

/// A loaded source document: full text plus a page map.
///
/// Pages are joined with paragraph breaks so the chunker sees a page
/// boundary as its most significant separator.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Identifier of the document (its file name)
    pub name: String,
    /// The full extracted text
    pub text: String,
    /// Character offset where each page begins; first entry is 0
    page_starts: Vec<usize>,
}

impl SourceDocument {
    /// Builds a document from per-page texts. Trailing empty pages
    /// (an artifact of form-feed-terminated extractor output) are dropped.
    pub fn from_pages(name: impl Into<String>, mut pages: Vec<String>) -> Self {
        while pages.last().is_some_and(|p| p.trim().is_empty()) {
            pages.pop();
        }

        let mut text = String::new();
        let mut page_starts = Vec::with_capacity(pages.len());
        let mut chars = 0usize;
        for (i, page) in pages.iter().enumerate() {
            if i > 0 {
                text.push_str("\n\n");
                chars += 2;
            }
            page_starts.push(chars);
            text.push_str(page);
            chars += page.chars().count();
        }
        if page_starts.is_empty() {
            page_starts.push(0);
        }

        Self {
            name: name.into(),
            text,
            page_starts,
        }
    }

    /// Builds a single-page document from raw text.
    pub fn single_page(name: impl Into<String>, text: String) -> Self {
        Self::from_pages(name, vec![text])
    }

    /// Number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.page_starts.len()
    }

    /// The 1-indexed page containing the given character offset.
    pub fn page_at(&self, char_offset: usize) -> usize {
        self.page_starts.partition_point(|&start| start <= char_offset)
    }
}

/// Loads a source document from disk, dispatching on file extension.
pub async fn load_document(path: &Path) -> Result<SourceDocument> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document")
        .to_string();

    match path.extension().and_then(|e| e.to_str()) {
        Some("pdf") => {
            let raw = extract_pdf_text(path).await?;
            let pages: Vec<String> = raw.split('\u{c}').map(|p| p.to_string()).collect();
            Ok(SourceDocument::from_pages(name, pages))
        }
        _ => {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            Ok(SourceDocument::single_page(name, text))
        }
    }
}

async fn extract_pdf_text(path: &Path) -> Result<String> {
    tracing::info!("Extracting PDF text from {}", path.display());

    let output = Command::new("pdftotext")
        .arg("-layout")
        .arg("-enc")
        .arg("UTF-8")
        .arg(path)
        .arg("-")
        .output()
        .await
        .context("failed to run pdftotext (is poppler installed?)")?;

    if !output.status.success() {
        bail!(
            "pdftotext failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    }

    let text = String::from_utf8_lossy(&output.stdout).to_string();
    if text.trim().is_empty() {
        bail!("pdftotext produced no text output for {}", path.display());
    }

    tracing::info!("Extracted {} characters", text.chars().count());
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_from_pages_builds_page_map() {
        let doc = SourceDocument::from_pages(
            "handbook.pdf",
            vec![
                "page one text".to_string(),
                "page two text".to_string(),
                "".to_string(), // trailing artifact of the extractor
            ],
        );

        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.text, "page one text\n\npage two text");
        assert_eq!(doc.page_at(0), 1);
        assert_eq!(doc.page_at(12), 1);
        // Offset 15 is the start of page two ("page one text" is 13 chars,
        // plus the 2-char separator).
        assert_eq!(doc.page_at(15), 2);
        assert_eq!(doc.page_at(doc.text.chars().count()), 2);
    }

    #[test]
    fn test_single_page() {
        let doc = SourceDocument::single_page("notes.txt", "hello".to_string());
        assert_eq!(doc.page_count(), 1);
        assert_eq!(doc.page_at(4), 1);
    }

    #[tokio::test]
    async fn test_load_plain_text_document() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("handbook.txt");
        tokio::fs::write(&path, "Vacation accrues monthly.").await?;

        let doc = load_document(&path).await?;
        assert_eq!(doc.name, "handbook.txt");
        assert_eq!(doc.text, "Vacation accrues monthly.");
        assert_eq!(doc.page_count(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_load_missing_document_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.txt");
        assert!(load_document(&path).await.is_err());
    }
}

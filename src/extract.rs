//! Page-wise text extraction for uploaded documents.
//!
//! PDFs are extracted with `pdf-extract`, one string per page; plain-text
//! files are treated as a single page. Extraction never panics: malformed
//! bytes surface as [`Error::Unreadable`] and a document with no extractable
//! text at all (e.g. a scanned PDF) surfaces as [`Error::EmptyDocument`],
//! both of which the ingestion coordinator records per file without
//! aborting the rest of the batch.

use std::path::Path;

use crate::error::{Error, Result};
use crate::models::DocumentPage;

/// Extract the text of every page of the document at `path`.
///
/// Returns at least one non-empty page, or an error classifying why the
/// document is unusable.
pub fn load_pages(path: &Path) -> Result<Vec<DocumentPage>> {
    let source = path.to_string_lossy().to_string();

    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    let pages = match extension.as_str() {
        "pdf" => load_pdf_pages(path, &source)?,
        // Everything else is read as UTF-8 plain text, one page.
        _ => {
            let text = std::fs::read_to_string(path).map_err(|e| Error::Unreadable {
                path: source.clone(),
                reason: e.to_string(),
            })?;
            vec![DocumentPage { text, page_no: 1 }]
        }
    };

    if pages.iter().all(|p| p.text.trim().is_empty()) {
        return Err(Error::EmptyDocument { path: source });
    }

    Ok(pages)
}

fn load_pdf_pages(path: &Path, source: &str) -> Result<Vec<DocumentPage>> {
    let page_texts = pdf_extract::extract_text_by_pages(path).map_err(|e| Error::Unreadable {
        path: source.to_string(),
        reason: e.to_string(),
    })?;

    Ok(page_texts
        .into_iter()
        .enumerate()
        .map(|(i, text)| DocumentPage {
            text,
            page_no: i + 1,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_pdf_is_unreadable() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("broken.pdf");
        std::fs::write(&path, b"not a pdf").unwrap();

        let err = load_pages(&path).unwrap_err();
        assert!(matches!(err, Error::Unreadable { .. }));
    }

    #[test]
    fn blank_text_file_is_empty_document() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("blank.txt");
        std::fs::write(&path, "   \n\t\n").unwrap();

        let err = load_pages(&path).unwrap_err();
        assert!(matches!(err, Error::EmptyDocument { .. }));
    }

    #[test]
    fn text_file_is_one_page() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("notes.txt");
        std::fs::write(&path, "Some notes about embeddings.").unwrap();

        let pages = load_pages(&path).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].page_no, 1);
        assert!(pages[0].text.contains("embeddings"));
    }

    #[test]
    fn missing_file_is_unreadable() {
        let err = load_pages(Path::new("/nonexistent/file.txt")).unwrap_err();
        assert!(matches!(err, Error::Unreadable { .. }));
    }
}

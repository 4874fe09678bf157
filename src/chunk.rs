//! Sliding-window text chunker.
//!
//! Splits a document's concatenated page text into overlapping windows of
//! `chunk_size` characters, advancing `chunk_size - overlap` characters per
//! step; the final window may be shorter. Windows are measured in `char`s,
//! never bytes, so multi-byte text is never split mid-character.
//!
//! Each chunk is tagged with its source identifier (the deletion/filter key)
//! and the page holding its first character, and fingerprinted with a
//! SHA-256 hash of its whitespace-normalized text.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Chunk, DocumentPage};

/// Split page texts into overlapping chunks tagged with `source`.
///
/// For a document of `N` characters this yields `ceil((N - O) / (W - O))`
/// chunks; a document no longer than one window yields exactly one.
/// Returns [`Error::EmptyDocument`] when the concatenated text is empty
/// after trimming. `overlap` must be smaller than `chunk_size` (validated
/// at config load).
pub fn split(
    pages: &[DocumentPage],
    source: &str,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>> {
    // Concatenate pages, remembering where each page starts (in chars).
    let mut text = String::new();
    let mut page_starts: Vec<(usize, usize)> = Vec::new(); // (char offset, page_no)
    let mut offset = 0usize;

    for page in pages {
        if !text.is_empty() {
            text.push('\n');
            offset += 1;
        }
        page_starts.push((offset, page.page_no));
        text.push_str(&page.text);
        offset += page.text.chars().count();
    }

    if text.trim().is_empty() {
        return Err(Error::EmptyDocument {
            path: source.to_string(),
        });
    }

    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();
    let stride = chunk_size - overlap;

    let mut chunks = Vec::new();
    let mut start = 0usize;

    loop {
        let end = (start + chunk_size).min(total);
        let window: String = chars[start..end].iter().collect();
        chunks.push(make_chunk(source, page_at(&page_starts, start), &window));

        if end == total {
            break;
        }
        start += stride;
    }

    Ok(chunks)
}

/// Page number containing the given character offset.
fn page_at(page_starts: &[(usize, usize)], offset: usize) -> usize {
    page_starts
        .iter()
        .rev()
        .find(|(start, _)| *start <= offset)
        .map(|(_, page_no)| *page_no)
        .unwrap_or(1)
}

fn make_chunk(source: &str, page: usize, text: &str) -> Chunk {
    Chunk {
        id: Uuid::new_v4().to_string(),
        source: source.to_string(),
        page: page as i64,
        text: text.to_string(),
        hash: fingerprint(text),
    }
}

/// Stable content fingerprint: SHA-256 over the whitespace-normalized text.
pub fn fingerprint(text: &str) -> String {
    let normalized = normalize_whitespace(text);
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Collapse all whitespace runs (including newlines) to single spaces.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages(texts: &[&str]) -> Vec<DocumentPage> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| DocumentPage {
                text: (*t).to_string(),
                page_no: i + 1,
            })
            .collect()
    }

    fn expected_count(n: usize, w: usize, o: usize) -> usize {
        if n <= w {
            1
        } else {
            (n - o).div_ceil(w - o)
        }
    }

    #[test]
    fn short_text_single_chunk() {
        let chunks = split(&pages(&["Hello, world!"]), "a.txt", 100, 20).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Hello, world!");
        assert_eq!(chunks[0].source, "a.txt");
        assert_eq!(chunks[0].page, 1);
    }

    #[test]
    fn text_exactly_one_window_single_chunk() {
        let text = "x".repeat(50);
        let chunks = split(&pages(&[&text]), "a.txt", 50, 10).unwrap();
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn chunk_count_matches_formula() {
        for (n, w, o) in [(10, 4, 1), (100, 30, 10), (1000, 200, 50), (7, 7, 2), (8, 7, 2)] {
            let text = "a".repeat(n);
            let chunks = split(&pages(&[&text]), "a.txt", w, o).unwrap();
            assert_eq!(
                chunks.len(),
                expected_count(n, w, o),
                "N={} W={} O={}",
                n,
                w,
                o
            );
        }
    }

    #[test]
    fn windows_overlap_by_configured_amount() {
        let text: String = ('a'..='z').collect();
        let chunks = split(&pages(&[&text]), "a.txt", 10, 4).unwrap();
        // Second window starts 6 chars in, repeating the last 4 of the first.
        assert_eq!(chunks[0].text, "abcdefghij");
        assert_eq!(chunks[1].text, "ghijklmnop");
    }

    #[test]
    fn last_chunk_may_be_shorter() {
        let text = "a".repeat(25);
        let chunks = split(&pages(&[&text]), "a.txt", 10, 2).unwrap();
        let last = chunks.last().unwrap();
        assert!(last.text.len() < 10);
    }

    #[test]
    fn empty_document_is_an_error() {
        let err = split(&pages(&["", "   "]), "scan.pdf", 100, 10).unwrap_err();
        assert!(matches!(err, Error::EmptyDocument { .. }));
    }

    #[test]
    fn multibyte_text_never_splits_characters() {
        let text = "käse und müsli mit äöüß ".repeat(20);
        let chunks = split(&pages(&[&text]), "umlaut.txt", 40, 10).unwrap();
        // Every chunk is valid UTF-8 by construction; verify windows are
        // char-sized, not byte-sized.
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 40);
        }
        assert_eq!(
            chunks.len(),
            expected_count(text.chars().count(), 40, 10)
        );
    }

    #[test]
    fn chunks_carry_page_of_first_character() {
        let p1 = "a".repeat(30);
        let p2 = "b".repeat(30);
        let chunks = split(&pages(&[&p1, &p2]), "two-pages.pdf", 20, 5).unwrap();
        assert_eq!(chunks.first().unwrap().page, 1);
        assert_eq!(chunks.last().unwrap().page, 2);
    }

    #[test]
    fn fingerprint_ignores_whitespace_layout() {
        assert_eq!(
            fingerprint("thesis   registration\nform"),
            fingerprint("thesis registration form")
        );
        assert_ne!(fingerprint("thesis"), fingerprint("antithesis"));
    }

    #[test]
    fn normalize_collapses_runs() {
        assert_eq!(
            normalize_whitespace("a\n\nb   c\t d"),
            "a b c d"
        );
    }
}

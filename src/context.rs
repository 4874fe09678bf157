//! Context assembly.
//!
//! Turns ranked retrieval results into the single bounded context string
//! handed to the generation backend, with deterministic fallback text when
//! there is nothing useful to hand over. No length cap is enforced here;
//! truncation, if any, is the generation collaborator's problem.

use crate::chunk::normalize_whitespace;
use crate::models::{RetrievalResult, SourceContext};

/// Shown when the caller never selected a document: answering from
/// arbitrary context would be misleading, so the user is directed to pick
/// one instead.
pub const NO_SOURCE_SELECTED: &str = "No relevant information was found. Please select a PDF \
                                      document so it can be used to answer your question.";

/// Shown when a document was selected but nothing in it survived the
/// distance threshold.
pub const NO_RELEVANT_CONTENT: &str =
    "The selected document contains no relevant information for this question.";

/// Fallback texts used by [`assemble`] when there is no usable context.
#[derive(Debug, Clone)]
pub struct FallbackMessages<'a> {
    pub no_source_selected: &'a str,
    pub no_relevant_content: &'a str,
}

impl Default for FallbackMessages<'_> {
    fn default() -> Self {
        Self {
            no_source_selected: NO_SOURCE_SELECTED,
            no_relevant_content: NO_RELEVANT_CONTENT,
        }
    }
}

/// Join surviving chunk texts into one context string.
///
/// Chunks are joined with newlines, each chunk's internal newlines
/// normalized to single spaces. Without a source filter the fixed
/// "pick a document" message is returned instead of concatenating arbitrary
/// context; with a filter but no surviving results, the "no relevant
/// content" message.
pub fn assemble(
    results: &[RetrievalResult],
    source_filtered: bool,
    messages: &FallbackMessages,
) -> String {
    if !source_filtered {
        return messages.no_source_selected.to_string();
    }
    if results.is_empty() {
        return messages.no_relevant_content.to_string();
    }

    results
        .iter()
        .map(|r| normalize_whitespace(&r.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render per-source groups as clearly delimited document blocks for the
/// bulk-extraction prompt.
pub fn assemble_documents(groups: &[SourceContext]) -> String {
    groups
        .iter()
        .map(|group| {
            format!(
                "File: {}\nText: {}\n--- end of document ---\n",
                group.source, group.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(text: &str, source: &str) -> RetrievalResult {
        RetrievalResult {
            text: text.to_string(),
            source: source.to_string(),
            page: 1,
            hash: String::new(),
            distance: 0.5,
        }
    }

    #[test]
    fn unfiltered_query_gets_pick_a_document_message() {
        let results = vec![result("some text", "a.pdf")];
        let context = assemble(&results, false, &FallbackMessages::default());
        assert_eq!(context, NO_SOURCE_SELECTED);
    }

    #[test]
    fn filtered_but_empty_gets_no_relevant_content_message() {
        let context = assemble(&[], true, &FallbackMessages::default());
        assert_eq!(context, NO_RELEVANT_CONTENT);
    }

    #[test]
    fn chunks_join_with_newlines_and_inner_newlines_become_spaces() {
        let results = vec![
            result("first\nchunk", "a.pdf"),
            result("second  chunk", "a.pdf"),
        ];
        let context = assemble(&results, true, &FallbackMessages::default());
        assert_eq!(context, "first chunk\nsecond chunk");
    }

    #[test]
    fn document_blocks_are_labeled_and_delimited() {
        let groups = vec![
            SourceContext {
                source: "a.pdf".to_string(),
                text: "content of a".to_string(),
            },
            SourceContext {
                source: "b.pdf".to_string(),
                text: "content of b".to_string(),
            },
        ];

        let rendered = assemble_documents(&groups);
        assert!(rendered.contains("File: a.pdf\nText: content of a"));
        assert!(rendered.contains("File: b.pdf"));
        assert_eq!(rendered.matches("--- end of document ---").count(), 2);
    }
}

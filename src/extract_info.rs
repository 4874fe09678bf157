//! Bulk structured extraction across all stored documents.
//!
//! Retrieves the registration-form fields from every document at once: one
//! weighted subquery per field feeds the aggregate ranker, the survivors
//! are grouped per source document, and the generation backend turns the
//! labeled document blocks into JSON records. Fields the model cannot find
//! default to the literal `"Unknown"` sentinel; response time and source
//! count are stamped onto every record afterwards.
//!
//! The prepared context lives in an [`ExtractionSession`], so a timed-out
//! generation call can be retried without re-running retrieval.

use std::time::Duration;

use crate::config::Config;
use crate::context;
use crate::error::Result;
use crate::generate::GenerationClient;
use crate::models::ExtractedRecord;
use crate::retrieve::{self, Subquery};
use crate::store::EmbeddingStore;

/// Per-field subqueries. Weights favor the fields with distinctive
/// phrasing (identifiers, supervisor titles) over generic ones.
fn field_subqueries() -> Vec<Subquery> {
    [
        ("thesis topic title", 1.0),
        ("student name", 1.0),
        ("matriculation number", 1.5),
        ("email address", 1.0),
        ("university supervisor", 1.5),
        ("external supervisor company", 1.0),
    ]
    .into_iter()
    .map(|(text, weight)| Subquery {
        text: text.to_string(),
        weight,
    })
    .collect()
}

/// Retrieval results assembled into a reusable extraction context.
pub struct ExtractionSession {
    context: String,
    source_count: usize,
}

/// Run the retrieval half of an extraction: subqueries → aggregate ranking
/// → per-source grouping → labeled context.
///
/// Returns `None` when the store holds no documents at all; the caller
/// must answer "no documents uploaded" without invoking the generation
/// backend.
pub async fn prepare(store: &EmbeddingStore, config: &Config) -> Result<Option<ExtractionSession>> {
    let sources = store.list_sources().await?;
    if sources.is_empty() {
        return Ok(None);
    }

    let results = retrieve::aggregate_retrieve(
        store,
        &field_subqueries(),
        config.retrieval.k,
        config.retrieval.extract_threshold,
    )
    .await?;

    let groups = retrieve::group_by_source(&results);
    let context = context::assemble_documents(&groups);

    Ok(Some(ExtractionSession {
        context,
        source_count: sources.len(),
    }))
}

impl ExtractionSession {
    pub fn source_count(&self) -> usize {
        self.source_count
    }

    /// Hand the prepared context to the model and parse its records.
    ///
    /// A timeout propagates as a retryable error; calling `run` again
    /// reuses the already-computed context.
    pub async fn run(
        &self,
        client: &GenerationClient,
        model: &str,
        deadline: Duration,
    ) -> Result<Vec<ExtractedRecord>> {
        if self.context.trim().is_empty() {
            // Nothing survived the threshold; don't bother the model.
            return Ok(stamp(
                vec![ExtractedRecord::unknown()],
                "0s",
                self.source_count,
            ));
        }

        let prompt = build_extraction_prompt(&self.context, self.source_count);
        let outcome = client.chat(model, &prompt, deadline, |_| {}).await?;

        let elapsed = format!("{:.2}s", outcome.elapsed_secs);
        let records = parse_records(&outcome.response);

        Ok(stamp(records, &elapsed, self.source_count))
    }
}

fn stamp(
    mut records: Vec<ExtractedRecord>,
    response_time: &str,
    source_count: usize,
) -> Vec<ExtractedRecord> {
    for record in &mut records {
        record.response_time = response_time.to_string();
        record.sources_examined = source_count;
    }
    records
}

fn build_extraction_prompt(context: &str, source_count: usize) -> String {
    format!(
        "IMPORTANT: follow these instructions exactly.\n\n\
         You are given background information consisting of exactly {source_count} thesis \
         registration forms. Each form is clearly delimited in the text. Extract the \
         following information from every form:\n\n\
         - topic: the thesis topic\n\
         - student: the student's full name\n\
         - student_id: the student's matriculation number\n\
         - email: the student's email address\n\
         - supervisor: the university supervisor's name\n\
         - external_supervisor: the external supervisor's name\n\n\
         Response format (mandatory): return only valid JSON — no explanations, no \
         introductions, no tables, no comments. Return a JSON array with one object per \
         registration form, using exactly these keys and the string \"Unknown\" for any \
         value not present in the form:\n\n\
         [\n  {{\n    \"topic\": \"...\",\n    \"student\": \"...\",\n    \
         \"student_id\": \"...\",\n    \"email\": \"...\",\n    \"supervisor\": \"...\",\n    \
         \"external_supervisor\": \"...\"\n  }}\n]\n\n\
         Background information:\n{context}"
    )
}

/// Parse records out of a (possibly noisy) model response. Falls back to a
/// single all-Unknown record when no usable JSON can be found.
fn parse_records(text: &str) -> Vec<ExtractedRecord> {
    let Some(block) = extract_json_block(text) else {
        return vec![ExtractedRecord::unknown()];
    };

    if let Ok(records) = serde_json::from_str::<Vec<ExtractedRecord>>(&block) {
        return records;
    }
    if let Ok(record) = serde_json::from_str::<ExtractedRecord>(&block) {
        return vec![record];
    }

    vec![ExtractedRecord::unknown()]
}

/// Pull the JSON payload out of surrounding prose and code fences,
/// preferring an array over a single object.
fn extract_json_block(text: &str) -> Option<String> {
    let cleaned = text.replace("```json", "").replace("```", "");
    let cleaned = cleaned.trim();

    if let (Some(start), Some(end)) = (cleaned.find('['), cleaned.rfind(']')) {
        if start < end {
            return Some(cleaned[start..=end].to_string());
        }
    }
    if let (Some(start), Some(end)) = (cleaned.find('{'), cleaned.rfind('}')) {
        if start < end {
            return Some(cleaned[start..=end].to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_block_survives_code_fences_and_prose() {
        let text = "Here is the result:\n```json\n[{\"topic\": \"LLM evaluation\"}]\n```\nDone.";
        let block = extract_json_block(text).unwrap();
        assert!(block.starts_with('['));
        assert!(block.ends_with(']'));
    }

    #[test]
    fn array_of_records_parses_with_defaults() {
        let records =
            parse_records(r#"[{"topic": "RAG systems", "student": "Anna Meier"}, {"email": "x@y.z"}]"#);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].topic, "RAG systems");
        assert_eq!(records[0].student, "Anna Meier");
        assert_eq!(records[0].student_id, "Unknown");
        assert_eq!(records[1].email, "x@y.z");
        assert_eq!(records[1].supervisor, "Unknown");
    }

    #[test]
    fn single_object_is_wrapped_into_a_list() {
        let records = parse_records(r#"{"topic": "One form only"}"#);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].topic, "One form only");
    }

    #[test]
    fn garbage_response_yields_one_unknown_record() {
        let records = parse_records("The model refused to answer in JSON.");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].topic, "Unknown");
        assert_eq!(records[0].student, "Unknown");
    }

    #[test]
    fn metadata_is_stamped_onto_every_record() {
        let records = stamp(
            vec![ExtractedRecord::unknown(), ExtractedRecord::unknown()],
            "3.21s",
            2,
        );
        for record in &records {
            assert_eq!(record.response_time, "3.21s");
            assert_eq!(record.sources_examined, 2);
        }
    }

    #[test]
    fn extraction_prompt_names_the_form_count() {
        let prompt = build_extraction_prompt("File: a.pdf\nText: ...", 3);
        assert!(prompt.contains("exactly 3 thesis"));
        assert!(prompt.contains("File: a.pdf"));
    }

    #[test]
    fn field_subqueries_cover_every_output_field() {
        let subqueries = field_subqueries();
        assert!(subqueries.len() >= 5);
        assert!(subqueries.iter().all(|s| s.weight > 0.0));
    }
}

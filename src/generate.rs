//! Client for the external text-generation collaborator.
//!
//! Generation is an opaque remote service speaking the Ollama chat API:
//! `POST /api/chat` with `stream: true` returns one JSON object per line,
//! each carrying a content fragment. The client forwards fragments to a
//! token callback as they arrive and measures elapsed time from the first
//! token.
//!
//! The deadline covers connection and first response only; once the stream
//! is flowing it runs to completion. A missed deadline surfaces as
//! [`Error::GenerationTimeout`], a retryable condition — retrieval results
//! already computed are not discarded by callers.

use std::time::{Duration, Instant};

use crate::config::GenerationConfig;
use crate::error::{Error, Result};

/// Completed generation call: the full response text plus the time from
/// first streamed token to completion.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub response: String,
    pub elapsed_secs: f64,
}

pub struct GenerationClient {
    url: String,
}

impl GenerationClient {
    pub fn new(config: &GenerationConfig) -> Self {
        Self {
            url: config.url.clone(),
        }
    }

    /// Resolve a user-facing model selector through the configured table.
    pub fn resolve_model(
        config: &GenerationConfig,
        selector: Option<&str>,
    ) -> anyhow::Result<String> {
        let name = selector.unwrap_or(&config.default_model);
        config.models.get(name).cloned().ok_or_else(|| {
            anyhow::anyhow!(
                "Unknown model '{}'. Configured models: {}",
                name,
                config.models.keys().cloned().collect::<Vec<_>>().join(", ")
            )
        })
    }

    /// Send a chat request, invoking `on_token` for every streamed content
    /// fragment, and return the collected response.
    pub async fn chat(
        &self,
        model: &str,
        prompt: &str,
        deadline: Duration,
        mut on_token: impl FnMut(&str),
    ) -> Result<ChatOutcome> {
        let client = reqwest::Client::new();
        let body = serde_json::json!({
            "model": model,
            "messages": [{"role": "user", "content": prompt}],
            "stream": true,
        });

        let send = client
            .post(format!("{}/api/chat", self.url))
            .json(&body)
            .send();

        let mut response = match tokio::time::timeout(deadline, send).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                return Err(Error::Generation(format!(
                    "could not reach generation backend at {}: {}",
                    self.url, e
                )))
            }
            Err(_) => {
                return Err(Error::GenerationTimeout {
                    elapsed_secs: deadline.as_secs_f64(),
                })
            }
        };

        if !response.status().is_success() {
            return Err(Error::Generation(format!(
                "generation backend returned {}",
                response.status()
            )));
        }

        let mut buffer = String::new();
        let mut full = String::new();
        let mut first_token: Option<Instant> = None;

        loop {
            let chunk = match response.chunk().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(e) => return Err(Error::Generation(e.to_string())),
            };

            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(pos) = buffer.find('\n') {
                let line: String = buffer.drain(..=pos).collect();
                if let Some(token) = parse_stream_line(line.trim()) {
                    if first_token.is_none() {
                        first_token = Some(Instant::now());
                    }
                    on_token(&token);
                    full.push_str(&token);
                }
            }
        }

        // A final line may arrive without a trailing newline.
        if let Some(token) = parse_stream_line(buffer.trim()) {
            if first_token.is_none() {
                first_token = Some(Instant::now());
            }
            on_token(&token);
            full.push_str(&token);
        }

        let elapsed_secs = first_token.map(|t| t.elapsed().as_secs_f64()).unwrap_or(0.0);

        Ok(ChatOutcome {
            response: full,
            elapsed_secs,
        })
    }
}

/// Extract the content fragment from one streamed JSONL line, if any.
fn parse_stream_line(line: &str) -> Option<String> {
    if line.is_empty() {
        return None;
    }
    let json: serde_json::Value = serde_json::from_str(line).ok()?;
    json.get("message")?
        .get("content")?
        .as_str()
        .map(|s| s.to_string())
}

/// Prompt for the chat path: answer from the supplied context only, and
/// steer the user toward selecting a document when there is none.
pub fn build_chat_prompt(context: &str, question: &str) -> String {
    format!(
        "Please answer the following question precisely and in detail, based on the \
         information provided below. Work the information directly into your answer \
         without mentioning that it comes from an external source.\n\n\
         Information:\n{context}\n\n\
         Question: {question}\n\n\
         If no usable information is available, tell the user to select a PDF document \
         to get further assistance. Keep the answer clearly structured and directly \
         related to the question."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerationConfig;

    #[test]
    fn stream_line_yields_content_fragment() {
        let line = r#"{"message":{"role":"assistant","content":"Hello"},"done":false}"#;
        assert_eq!(parse_stream_line(line).as_deref(), Some("Hello"));
    }

    #[test]
    fn stream_line_without_content_is_skipped() {
        assert_eq!(parse_stream_line(r#"{"done":true}"#), None);
        assert_eq!(parse_stream_line("not json"), None);
        assert_eq!(parse_stream_line(""), None);
    }

    #[test]
    fn chat_prompt_embeds_context_and_question() {
        let prompt = build_chat_prompt("CONTEXT HERE", "What is the topic?");
        assert!(prompt.contains("CONTEXT HERE"));
        assert!(prompt.contains("What is the topic?"));
    }

    #[test]
    fn model_selector_resolves_through_config() {
        let config = GenerationConfig::default();
        let model = GenerationClient::resolve_model(&config, Some("llama")).unwrap();
        assert_eq!(model, "llama3.1:8b");

        // No selector falls back to the default model.
        let default = GenerationClient::resolve_model(&config, None).unwrap();
        assert_eq!(default, "llama3.1:8b");

        assert!(GenerationClient::resolve_model(&config, Some("gpt")).is_err());
    }
}

//! Idea structuring pipeline: completion call, JSON extraction, store write, user reply.
//!
//! Every failure inside the pipeline is caught at [`process_idea`]'s boundary and turned
//! into a single generic notification; a malformed completion reply is recovered with a
//! fallback record, so no idea is ever lost to a formatting failure.

use crate::llm::{CompletionError, OpenAiClient};
use crate::store::{AirtableClient, StoreError};
use crate::telegram::TelegramClient;
use serde::{Deserialize, Serialize};

/// System instruction sent with every completion request. Demands a bare JSON object so
/// the reply can be normalized into an [`IdeaRecord`].
const SYSTEM_PROMPT: &str = r#"You are an assistant that structures content ideas. Always reply with JSON in the format:
{
  "title": "",
  "summary": "",
  "tags": [],
  "raw_idea": ""
}"#;

const SOURCE: &str = "telegram";
const TITLE_FALLBACK_CHARS: usize = 50;

const FAILURE_REPLY: &str =
    "Something went wrong while processing your idea. Please try again later.";

/// One structured idea row. Serializes with the store's column names.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct IdeaRecord {
    pub title: String,
    pub summary: String,
    pub tags: String,
    pub raw_idea: String,
    pub source: String,
    pub user_id: String,
}

/// Errors crossing the pipeline boundary. The caller converts them into one generic
/// user notification; details stay in the operator log.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error(transparent)]
    Completion(#[from] CompletionError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Parsed shape of the model's JSON reply. Every key is optional; absent keys are
/// filled during normalization.
#[derive(Debug, Deserialize)]
struct ParsedIdea {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    tags: Option<serde_json::Value>,
    #[serde(default)]
    raw_idea: Option<String>,
}

/// Best-effort extraction of the JSON object from a completion reply: the slice between
/// the first `{` and the last `}` inclusive, tolerating preamble and trailing prose.
/// Returns the full text when no such pair exists.
fn extract_json_block(text: &str) -> &str {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start <= end => &text[start..=end],
        _ => text,
    }
}

/// Tags column value: arrays join with ", ", scalar strings and numbers pass through,
/// anything else is empty.
fn join_tags(tags: Option<serde_json::Value>) -> String {
    match tags {
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| v.to_string())
            })
            .collect::<Vec<_>>()
            .join(", "),
        Some(serde_json::Value::String(s)) => s,
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// First `max` characters of `text`.
fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Parse the candidate as a JSON object with the expected keys. Anything else (prose,
/// arrays, scalars, wrongly typed keys) is None.
fn parse_idea(candidate: &str) -> Option<ParsedIdea> {
    let value: serde_json::Value = serde_json::from_str(candidate).ok()?;
    if !value.is_object() {
        return None;
    }
    serde_json::from_value(value).ok()
}

/// Normalize a completion reply into an [`IdeaRecord`].
///
/// A reply that is not a parseable JSON object falls back to a record built from the
/// input itself (title = first 50 characters, summary and raw idea = full input), so
/// the pipeline makes progress even when the model ignores the requested format.
fn normalize_reply(reply: &str, input: &str, user_id: Option<i64>) -> IdeaRecord {
    let candidate = extract_json_block(reply);
    let parsed = parse_idea(candidate).unwrap_or_else(|| {
        log::debug!("completion reply was not a json object, using fallback record");
        ParsedIdea {
            title: Some(truncate_chars(input, TITLE_FALLBACK_CHARS)),
            summary: Some(input.to_string()),
            tags: None,
            raw_idea: Some(input.to_string()),
        }
    });
    IdeaRecord {
        title: parsed.title.unwrap_or_default(),
        summary: parsed.summary.unwrap_or_default(),
        tags: join_tags(parsed.tags),
        raw_idea: parsed.raw_idea.unwrap_or_else(|| input.to_string()),
        source: SOURCE.to_string(),
        user_id: user_id.map(|id| id.to_string()).unwrap_or_default(),
    }
}

/// Completion, normalization, and the store write. Errors short-circuit before any row
/// is created; the reply to the user happens after this returns.
async fn structure_and_store(
    llm: &OpenAiClient,
    store: &AirtableClient,
    text: &str,
    user_id: Option<i64>,
) -> Result<IdeaRecord, ProcessError> {
    let reply = llm.complete(SYSTEM_PROMPT, text).await?;
    let record = normalize_reply(&reply, text, user_id);
    store.create_record(&record).await?;
    Ok(record)
}

/// Run the full pipeline for one idea and reply to the user.
///
/// Any pipeline error is caught here, logged, and reported as one generic failure
/// message. Reply delivery is fire-and-forget: a failed sendMessage is logged at warn
/// and never retried.
pub async fn process_idea(
    llm: &OpenAiClient,
    store: &AirtableClient,
    telegram: &TelegramClient,
    text: &str,
    chat_id: i64,
    user_id: Option<i64>,
) {
    match structure_and_store(llm, store, text, user_id).await {
        Ok(record) => {
            let title = if record.title.is_empty() {
                "-"
            } else {
                record.title.as_str()
            };
            let reply = format!(
                "Thanks, your idea is saved.\n\nTitle: {}\n\n{}",
                title, record.summary
            );
            if let Err(e) = telegram.send_message(chat_id, &reply).await {
                log::warn!("confirmation send failed: {}", e);
            }
        }
        Err(e) => {
            log::error!("idea processing failed: {}", e);
            if let Err(e) = telegram.send_message(chat_id, FAILURE_REPLY).await {
                log::warn!("failure notification send failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_object_between_braces() {
        assert_eq!(extract_json_block(r#"{"a": 1}"#), r#"{"a": 1}"#);
        assert_eq!(
            extract_json_block(r#"Sure! Here you go: {"a": 1} Hope that helps."#),
            r#"{"a": 1}"#
        );
    }

    #[test]
    fn extraction_spans_nested_braces() {
        assert_eq!(
            extract_json_block(r#"note {"a": {"b": 2}} end"#),
            r#"{"a": {"b": 2}}"#
        );
    }

    #[test]
    fn extraction_without_braces_returns_full_text() {
        assert_eq!(extract_json_block("no json here"), "no json here");
    }

    #[test]
    fn extraction_with_reversed_braces_returns_full_text() {
        assert_eq!(extract_json_block("} backwards {"), "} backwards {");
    }

    #[test]
    fn tags_list_joins_with_comma_space() {
        let tags = serde_json::json!(["health", "app"]);
        assert_eq!(join_tags(Some(tags)), "health, app");
    }

    #[test]
    fn tags_scalar_passes_through_and_missing_is_empty() {
        assert_eq!(join_tags(Some(serde_json::json!("solo"))), "solo");
        assert_eq!(join_tags(Some(serde_json::json!(5))), "5");
        assert_eq!(join_tags(None), "");
        assert_eq!(join_tags(Some(serde_json::Value::Null)), "");
    }

    #[test]
    fn valid_reply_normalizes_to_parsed_values() {
        let input = "Build a tool that reminds me to drink water";
        let reply = r#"{"title":"Water reminder app","summary":"App that reminds users to hydrate","tags":["health","app"],"raw_idea":"Build a tool that reminds me to drink water"}"#;
        let record = normalize_reply(reply, input, Some(12345));
        assert_eq!(
            record,
            IdeaRecord {
                title: "Water reminder app".to_string(),
                summary: "App that reminds users to hydrate".to_string(),
                tags: "health, app".to_string(),
                raw_idea: "Build a tool that reminds me to drink water".to_string(),
                source: "telegram".to_string(),
                user_id: "12345".to_string(),
            }
        );
    }

    #[test]
    fn malformed_reply_falls_back_to_input_record() {
        let input = "a".repeat(80);
        let record = normalize_reply("not json at all", &input, None);
        assert_eq!(record.title, "a".repeat(50));
        assert_eq!(record.summary, input);
        assert_eq!(record.tags, "");
        assert_eq!(record.raw_idea, input);
        assert_eq!(record.user_id, "");
    }

    #[test]
    fn fallback_is_idempotent_for_identical_replies() {
        let input = "short idea";
        let first = normalize_reply("```oops```", input, Some(1));
        let second = normalize_reply("```oops```", input, Some(1));
        assert_eq!(first, second);
    }

    #[test]
    fn fallback_title_counts_characters_not_bytes() {
        let input = "ü".repeat(60);
        let record = normalize_reply("-", &input, None);
        assert_eq!(record.title.chars().count(), 50);
    }

    #[test]
    fn non_object_json_reply_uses_fallback() {
        let input = "idea";
        let record = normalize_reply("[1, 2, 3]", input, None);
        assert_eq!(record.summary, input);
        assert_eq!(record.raw_idea, input);
    }

    #[test]
    fn missing_keys_default_and_raw_idea_falls_back_to_input() {
        let record = normalize_reply(r#"{"title": "only a title"}"#, "the input", Some(2));
        assert_eq!(record.title, "only a title");
        assert_eq!(record.summary, "");
        assert_eq!(record.tags, "");
        assert_eq!(record.raw_idea, "the input");
    }

    #[test]
    fn record_serializes_with_store_column_names() {
        let record = normalize_reply("{}", "x", Some(3));
        let value = serde_json::to_value(&record).expect("serialize record");
        let obj = value.as_object().expect("object");
        let mut keys: Vec<_> = obj.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            ["RawIdea", "Source", "Summary", "Tags", "Title", "UserId"]
        );
        assert_eq!(value["Source"], "telegram");
        assert_eq!(value["UserId"], "3");
    }
}

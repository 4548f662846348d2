//! Response normalization.
//!
//! Providers hand back whatever the model produced: a tool input object, a
//! JSON string, a vendor envelope, or prose. [`normalize`] turns any of it
//! into a valid [`StructuredAnswer`]. Strategies are tried in order and the
//! first that yields answer text wins:
//!
//! 1. A vendor envelope is unwrapped to its `response_formatter` tool input.
//! 2. A string payload is decoded as JSON (up to [`MAX_DECODE_DEPTH`] times);
//!    undecodable strings fall through to a `"text": "..."` pattern match.
//! 3. An object with `answerText` or `answer.text` is accepted.
//! 4. An `answer` holding a JSON-encoded string is decoded, or wrapped as
//!    the text itself when it is not JSON.
//! 5. Anything else becomes the apologetic fallback answer.
//!
//! Normalization never fails. Follow-ups are always coerced to 1–3 entries.

use std::sync::LazyLock;

use coursemate_core::answer::StructuredAnswer;
use regex_lite::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::invoker::RESPONSE_TOOL_NAME;

/// How many layers of string-encoded JSON are unwrapped.
pub const MAX_DECODE_DEPTH: usize = 3;

const MAX_FOLLOW_UPS: usize = 3;

const FALLBACK_SUMMARY: &str = "Conversation about AI education topics.";

/// Follow-ups offered when the model gave none.
pub const GENERIC_FOLLOW_UPS: [&str; 3] = [
    "What are Large Language Models?",
    "How does AI help in education?",
    "What are the basics of machine learning?",
];

static TEXT_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#""text":\s*"([^"]*)""#).ok());

/// Which strategy produced the answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizationPath {
    /// Payload was already answer-shaped
    Direct,
    /// Unwrapped from a vendor `tool_use` envelope
    ToolPayload,
    /// Decoded from a JSON string
    StringEncoded,
    /// `answer` was a JSON-encoded string
    AnswerDecoded,
    /// `answer` was a plain string, taken as the text
    AnswerWrapped,
    /// Text pulled out of an unparseable string by pattern
    TextPattern,
    /// Nothing usable; the apologetic answer was substituted
    Fallback { reason: String },
}

impl NormalizationPath {
    pub fn is_fallback(&self) -> bool {
        matches!(self, NormalizationPath::Fallback { .. })
    }
}

/// A normalized answer and how it was obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub answer: StructuredAnswer,
    pub path: NormalizationPath,
}

/// The answer returned when the payload cannot be interpreted.
pub fn fallback_answer(reason: &str) -> StructuredAnswer {
    StructuredAnswer::new(
        format!("I'm sorry, I couldn't generate a proper response. {reason}. Please try again."),
        generic_follow_ups(),
    )
    .with_summary(FALLBACK_SUMMARY)
}

fn generic_follow_ups() -> Vec<String> {
    GENERIC_FOLLOW_UPS.iter().map(|q| q.to_string()).collect()
}

/// Normalize a raw completion payload.
pub fn normalize(payload: Value) -> Normalized {
    let normalized = run(payload);
    match &normalized.path {
        NormalizationPath::Fallback { reason } => {
            warn!(%reason, "Completion payload unusable, returning fallback answer")
        }
        path => debug!(?path, "Normalized completion payload"),
    }
    normalized
}

fn run(payload: Value) -> Normalized {
    let mut path = NormalizationPath::Direct;

    let value = match decode_strings(payload) {
        Decoded::Value(v, decoded) => {
            if decoded {
                path = NormalizationPath::StringEncoded;
            }
            v
        }
        Decoded::Opaque(raw) => return from_text_pattern(&raw),
    };

    let value = match unwrap_envelope(&value) {
        Some(input) => {
            path = NormalizationPath::ToolPayload;
            // Tool input can itself arrive string-encoded
            match decode_strings(input) {
                Decoded::Value(v, _) => v,
                Decoded::Opaque(raw) => return from_text_pattern(&raw),
            }
        }
        None => value,
    };

    let Value::Object(map) = value else {
        return fallback("Response format incorrect");
    };

    let (text, answer_path) = match answer_text(&map) {
        Some(found) => found,
        None => return fallback("Response format incorrect"),
    };
    if let Some(p) = answer_path {
        path = p;
    }

    let mut answer = StructuredAnswer::new(text, follow_ups(map.get("followUpQuestions")));
    if let Some(summary) = map
        .get("conversationSummary")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        answer = answer.with_summary(summary);
    }

    Normalized { answer, path }
}

enum Decoded {
    /// A JSON value, and whether any string decoding happened
    Value(Value, bool),
    /// A string that is not JSON
    Opaque(String),
}

fn decode_strings(mut value: Value) -> Decoded {
    let mut decoded = false;
    for _ in 0..MAX_DECODE_DEPTH {
        let Value::String(raw) = value else {
            return Decoded::Value(value, decoded);
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(inner) => {
                value = inner;
                decoded = true;
            }
            Err(_) => return Decoded::Opaque(raw),
        }
    }
    match value {
        Value::String(raw) => Decoded::Opaque(raw),
        other => Decoded::Value(other, decoded),
    }
}

/// `{content: [{type: "tool_use", name: "response_formatter", input}]}` → `input`
fn unwrap_envelope(value: &Value) -> Option<Value> {
    value
        .get("content")?
        .as_array()?
        .iter()
        .find(|block| {
            block.get("type").and_then(Value::as_str) == Some("tool_use")
                && block.get("name").and_then(Value::as_str) == Some(RESPONSE_TOOL_NAME)
        })
        .and_then(|block| block.get("input"))
        .cloned()
}

/// Non-blank answer text, plus the path when `answer` needed decoding.
fn answer_text(map: &Map<String, Value>) -> Option<(String, Option<NormalizationPath>)> {
    if let Some(text) = non_blank(map.get("answerText")) {
        return Some((text, None));
    }

    match map.get("answer") {
        Some(Value::Object(answer)) => {
            if let Some(text) = non_blank(answer.get("text")) {
                return Some((text, None));
            }
        }
        Some(Value::String(raw)) => {
            return match decode_strings(Value::String(raw.clone())) {
                Decoded::Value(Value::Object(inner), _) => non_blank(inner.get("text"))
                    .map(|text| (text, Some(NormalizationPath::AnswerDecoded))),
                Decoded::Value(_, _) => None,
                Decoded::Opaque(text) => Some(text)
                    .filter(|t| !t.trim().is_empty())
                    .map(|t| (t, Some(NormalizationPath::AnswerWrapped))),
            };
        }
        _ => {}
    }

    // Legacy `{reply}` shape
    non_blank(map.get("reply")).map(|text| (text, None))
}

fn non_blank(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

/// Keep non-blank strings, at most three; backfill when none survive.
fn follow_ups(value: Option<&Value>) -> Vec<String> {
    let questions: Vec<String> = value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|q| !q.is_empty())
                .take(MAX_FOLLOW_UPS)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    if questions.is_empty() {
        generic_follow_ups()
    } else {
        questions
    }
}

fn from_text_pattern(raw: &str) -> Normalized {
    let text = TEXT_PATTERN
        .as_ref()
        .and_then(|re| re.captures(raw))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|t| !t.trim().is_empty());

    match text {
        Some(text) => Normalized {
            answer: StructuredAnswer::new(text, generic_follow_ups()),
            path: NormalizationPath::TextPattern,
        },
        None => fallback("Response could not be parsed"),
    }
}

fn fallback(reason: &str) -> Normalized {
    Normalized {
        answer: fallback_answer(reason),
        path: NormalizationPath::Fallback {
            reason: reason.to_string(),
        },
    }
}

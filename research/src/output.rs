use regex::Regex;
use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;
use thiserror::Error;

static FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"```(?:json|JSON)?[ \t]*\n?([\s\S]*?)```").expect("fence pattern is valid")
});

/// The structured answer the model is instructed to produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResearchResult {
    /// The topic of the research
    pub topic: String,
    /// A summary answering the query
    pub summary: String,
    /// Sources consulted, most relevant first
    pub sources: Vec<String>,
    /// Names of the tools used while researching
    pub tools_used: Vec<String>,
}

/// Instructions appended to the system prompt so the answer comes back as a `ResearchResult`.
pub fn format_instructions() -> String {
    let schema = schema_for!(ResearchResult);
    let schema = serde_json::to_string(&schema.schema).unwrap_or_default();
    format!(
        "The output should be formatted as a JSON instance that conforms to the JSON schema below.\n\n\
         As an example, for the schema {{\"properties\": {{\"foo\": {{\"title\": \"Foo\", \"description\": \"a list of strings\", \
         \"type\": \"array\", \"items\": {{\"type\": \"string\"}}}}}}, \"required\": [\"foo\"]}}\n\
         the object {{\"foo\": [\"bar\", \"baz\"]}} is a well-formatted instance of the schema. \
         The object {{\"properties\": {{\"foo\": [\"bar\", \"baz\"]}}}} is not well-formatted.\n\n\
         Here is the output schema:\n```\n{}\n```",
        schema
    )
}

/// A block of provider content; only the text is read.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ContentBlock {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OutputBody {
    Blocks(Vec<ContentBlock>),
    Text(String),
}

#[derive(Deserialize)]
struct EnvelopeShape {
    output: OutputBody,
}

/// Whatever the provider handed back, before it is reduced to a single string.
#[derive(Debug, Clone, PartialEq)]
pub enum RawOutput {
    Text(String),
    /// `output` is the decoded body, `original` the whole value it came from.
    Envelope { output: OutputBody, original: Value },
    Other(Value),
}

impl RawOutput {
    pub fn text(text: impl Into<String>) -> Self {
        RawOutput::Text(text.into())
    }

    pub fn from_value(value: Value) -> Self {
        match value {
            Value::String(text) => RawOutput::Text(text),
            value => match EnvelopeShape::deserialize(&value) {
                Ok(shape) => RawOutput::Envelope {
                    output: shape.output,
                    original: value,
                },
                Err(_) => RawOutput::Other(value),
            },
        }
    }

    /// Reads a saved provider response: JSON envelopes are decoded, anything else is text.
    pub fn from_saved(content: &str) -> Self {
        match serde_json::from_str::<Value>(content) {
            Ok(value) => Self::from_value(value),
            Err(_) => RawOutput::Text(content.to_string()),
        }
    }

    pub fn normalize(&self) -> String {
        match self {
            RawOutput::Text(text) => text.clone(),
            RawOutput::Envelope {
                output: OutputBody::Blocks(blocks),
                ..
            } => blocks.iter().map(|b| b.text.as_str()).collect(),
            RawOutput::Envelope {
                output: OutputBody::Text(text),
                ..
            } => text.clone(),
            RawOutput::Other(value) => value.to_string(),
        }
    }
}

impl std::fmt::Display for RawOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RawOutput::Text(text) => write!(f, "{}", text),
            RawOutput::Envelope { original, .. } => write!(f, "{}", original),
            RawOutput::Other(value) => write!(f, "{}", value),
        }
    }
}

#[derive(Debug, Error)]
#[error("failed to parse research output: {message}")]
pub struct ParseError {
    pub message: String,
    /// The provider output as received. Envelopes are re-serialized whole, keys included.
    pub raw: String,
}

impl ParseError {
    fn new(message: impl Into<String>, raw: &RawOutput) -> Self {
        Self {
            message: message.into(),
            raw: raw.to_string(),
        }
    }
}

fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Places the JSON object may sit in a model answer: each markdown fence in order, then the
/// outermost brace-delimited span of the whole answer.
fn json_candidates(text: &str) -> Vec<&str> {
    FENCE
        .captures_iter(text)
        .filter_map(|cap| cap.get(1))
        .filter_map(|m| brace_span(m.as_str()))
        .chain(brace_span(text))
        .collect()
}

pub fn parse(raw: &RawOutput) -> Result<ResearchResult, ParseError> {
    let text = raw.normalize();
    let mut first_err = None;

    for candidate in json_candidates(&text) {
        match serde_json::from_str(candidate) {
            Ok(result) => return Ok(result),
            Err(e) => {
                first_err.get_or_insert(e);
            }
        }
    }

    Err(match first_err {
        Some(e) => ParseError::new(e.to_string(), raw),
        None => ParseError::new("no JSON object found", raw),
    })
}

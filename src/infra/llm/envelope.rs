use serde_json::Value;

use crate::domain::GenerationError;

/// One block of a multi-part model reply, classified for text selection.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentSegment {
    Text(String),
    Reasoning(String),
    Other(Value),
}

impl ContentSegment {
    /// `reasoningContent` wins over `text` so a reasoning block that happens to
    /// carry a text field is never picked as output.
    pub fn from_block(block: &Value) -> Self {
        match block {
            Value::String(text) => Self::Text(text.clone()),
            Value::Object(map) => {
                if let Some(reasoning) = map.get("reasoningContent") {
                    return Self::Reasoning(reasoning_text(reasoning));
                }
                match map.get("text") {
                    Some(Value::String(text)) => Self::Text(text.clone()),
                    _ => Self::Other(block.clone()),
                }
            }
            other => Self::Other(other.clone()),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Reasoning(_) | Self::Other(_) => None,
        }
    }

    pub fn is_reasoning(&self) -> bool {
        matches!(self, Self::Reasoning(_))
    }
}

fn reasoning_text(reasoning: &Value) -> String {
    reasoning
        .pointer("/reasoningText/text")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .unwrap_or_default()
}

/// First `Text` segment in order. Reasoning and unknown segments never match.
pub fn select_text_segment(segments: &[ContentSegment]) -> Option<&str> {
    segments.iter().find_map(ContentSegment::as_text)
}

/// Selects the output text from a Converse-style block list.
pub(crate) fn extract_envelope_text(blocks: &[Value]) -> Result<String, GenerationError> {
    if blocks.is_empty() {
        return Err(GenerationError::empty_response(
            "response contained no content blocks",
            None,
        ));
    }

    let segments = blocks
        .iter()
        .map(ContentSegment::from_block)
        .collect::<Vec<_>>();

    let Some(text) = select_text_segment(&segments) else {
        let rendered = serde_json::to_string_pretty(blocks)
            .unwrap_or_else(|_| Value::Array(blocks.to_vec()).to_string());
        let reasoning = segments.iter().filter(|s| s.is_reasoning()).count();
        tracing::warn!(
            block_count = blocks.len(),
            reasoning_blocks = reasoning,
            segments = %rendered,
            "no text block in response content"
        );
        return Err(GenerationError::Extraction {
            message: format!(
                "none of the {} content blocks is a text block",
                blocks.len()
            ),
            segments: rendered,
        });
    };

    if text.trim().is_empty() {
        return Err(GenerationError::empty_response(
            "selected text block is blank",
            Some(text.to_string()),
        ));
    }
    Ok(text.to_string())
}

use std::borrow::Cow;

use serde::{Deserialize, Deserializer};

const MAX_ERROR_MESSAGE_LEN: usize = 256;
const JSON_FENCE: &str = "```json";
const FENCE: &str = "```";

pub(crate) fn truncate_message(body: &str) -> String {
    let compact = body.trim().replace('\n', " ");
    compact.chars().take(MAX_ERROR_MESSAGE_LEN).collect()
}

/// Strips Markdown code fence markers from a model reply.
///
/// A fence is only recognised when it opens the (trimmed) text. Once one is
/// found every ```` ```json ```` and ```` ``` ```` marker is removed, so the
/// result never starts with a fence and a second pass returns it unchanged.
/// Text that does not open with a fence is returned trimmed and untouched.
pub fn strip_code_fence(text: &str) -> Cow<'_, str> {
    let trimmed = text.trim();
    if !trimmed.starts_with(FENCE) {
        return Cow::Borrowed(trimmed);
    }

    let stripped = trimmed.replace(JSON_FENCE, "").replace(FENCE, "");
    Cow::Owned(stripped.trim().to_string())
}

pub(crate) fn non_empty_owned(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Reads an explicit `null` the same way as a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

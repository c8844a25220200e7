//! Structured-output helpers shared by every backend.
//!
//! Models are asked for a JSON object and told the schema it must satisfy.
//! Their replies are not always clean JSON (markdown fences, a sentence of
//! preamble), so parsing here is tolerant about the wrapping and strict about
//! the payload.

use deepsift_core::{ProviderError, StructuredRequest};

/// Prompt text with the output contract appended.
pub fn render_prompt(request: &StructuredRequest) -> String {
    format!(
        "{}\n\n{}",
        request.prompt.trim_end(),
        schema_instruction(request)
    )
}

/// Instruction telling the model which JSON shape to produce.
pub fn schema_instruction(request: &StructuredRequest) -> String {
    let schema = serde_json::to_string_pretty(&request.schema).unwrap_or_default();
    format!(
        "Respond with a single JSON object named {} that conforms to this JSON Schema. \
         Do not include any text outside the JSON object.\n{}",
        request.schema_name, schema
    )
}

/// Extract the JSON object from a model reply.
pub fn parse_json_payload(text: &str) -> Result<serde_json::Value, ProviderError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ProviderError::MalformedOutput("empty response".into()));
    }

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        return object_or_malformed(value);
    }

    if let Some(fenced) = strip_fence(trimmed)
        && let Ok(value) = serde_json::from_str::<serde_json::Value>(fenced)
    {
        return object_or_malformed(value);
    }

    // Last resort: the outermost braces.
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && start < end
        && let Ok(value) = serde_json::from_str::<serde_json::Value>(&trimmed[start..=end])
    {
        return object_or_malformed(value);
    }

    Err(ProviderError::MalformedOutput(format!(
        "response is not JSON: {}",
        crate::http::truncate(trimmed, 200)
    )))
}

fn object_or_malformed(value: serde_json::Value) -> Result<serde_json::Value, ProviderError> {
    if value.is_object() {
        Ok(value)
    } else {
        Err(ProviderError::MalformedOutput(format!(
            "expected a JSON object, got {}",
            json_kind(&value)
        )))
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Body of a ```json ... ``` (or bare ```) block.
fn strip_fence(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after = &text[start + 3..];
    let body_start = after.find('\n')?;
    let body = &after[body_start + 1..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

//! JSON extraction from LLM responses.
//!
//! Model replies often wrap JSON in markdown fences or surround it with
//! prose. Extraction tries, in order:
//! 1. A fenced code block (```json or plain ```)
//! 2. The whole reply parsed directly
//! 3. The first balanced array or object found by bracket matching,
//!    whichever starts earlier
//!
//! # Example
//!
//! ```
//! use vyvchai::utils::json_extraction::extract_json_from_response;
//!
//! let response = "Ось тест:\n```json\n[{\"question\": \"2+2?\"}]\n```";
//! assert_eq!(extract_json_from_response(response), "[{\"question\": \"2+2?\"}]");
//! ```

use regex::Regex;
use serde_json::Value;
use thiserror::Error;

/// Error type for JSON extraction failures.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum JsonExtractionError {
    #[error("JSON appears truncated: {unclosed} unclosed delimiters. Partial: {partial_preview}...")]
    Truncated {
        partial_preview: String,
        unclosed: usize,
    },
    #[error("No JSON content found in response. Content starts with: '{content_preview}'")]
    NotFound { content_preview: String },
}

/// Result of a JSON extraction attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonExtractionResult {
    /// Valid JSON text.
    Success(String),
    /// JSON started but never closed (usually a token-limit cut).
    Truncated { partial_json: String, unclosed: usize },
    NotFound,
}

impl JsonExtractionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, JsonExtractionResult::Success(_))
    }

    pub fn is_truncated(&self) -> bool {
        matches!(self, JsonExtractionResult::Truncated { .. })
    }

    pub fn json(&self) -> Option<&str> {
        match self {
            JsonExtractionResult::Success(json) => Some(json),
            _ => None,
        }
    }

    /// Converts to a `Result`, previewing `content` on failure.
    pub fn into_result_with_context(self, content: &str) -> Result<String, JsonExtractionError> {
        match self {
            JsonExtractionResult::Success(json) => Ok(json),
            JsonExtractionResult::Truncated {
                partial_json,
                unclosed,
            } => Err(JsonExtractionError::Truncated {
                partial_preview: preview(&partial_json, 100),
                unclosed,
            }),
            JsonExtractionResult::NotFound => Err(JsonExtractionError::NotFound {
                content_preview: preview(content.trim(), 50),
            }),
        }
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn is_valid_json(candidate: &str) -> bool {
    serde_json::from_str::<Value>(candidate).is_ok()
}

fn code_blocks(content: &str) -> Vec<&str> {
    let Ok(re) = Regex::new(r"```(?:json|JSON)?[^\S\n]*\n?([\s\S]*?)\n?```") else {
        return Vec::new();
    };
    re.captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .collect()
}

/// Attempts to extract JSON with detailed result information.
pub fn try_extract_json_from_response(content: &str) -> JsonExtractionResult {
    let trimmed = content.trim();

    for block in code_blocks(trimmed) {
        if is_valid_json(block) {
            return JsonExtractionResult::Success(block.to_string());
        }
        if let Some(json) = first_balanced(block) {
            return JsonExtractionResult::Success(json);
        }
    }

    if (trimmed.starts_with('{') || trimmed.starts_with('[')) && is_valid_json(trimmed) {
        return JsonExtractionResult::Success(trimmed.to_string());
    }

    // An outermost delimiter that never closes means the reply was cut off.
    if let Some(start) = trimmed.find(|c| c == '{' || c == '[') {
        let rest = &trimmed[start..];
        let open = if rest.starts_with('{') { '{' } else { '[' };
        let close = if open == '{' { '}' } else { ']' };
        if find_matching_close(rest, open, close).is_none() {
            let unclosed = count_unclosed(rest);
            if unclosed > 0 {
                return JsonExtractionResult::Truncated {
                    partial_json: rest.to_string(),
                    unclosed,
                };
            }
        }
    }

    if let Some(json) = first_balanced(trimmed) {
        return JsonExtractionResult::Success(json);
    }

    JsonExtractionResult::NotFound
}

/// Extracts JSON text, falling back to the partial JSON or the trimmed input.
pub fn extract_json_from_response(content: &str) -> String {
    match try_extract_json_from_response(content) {
        JsonExtractionResult::Success(json) => json,
        JsonExtractionResult::Truncated { partial_json, .. } => partial_json,
        JsonExtractionResult::NotFound => content.trim().to_string(),
    }
}

/// Extracts and parses JSON from a response.
pub fn extract_json_value(content: &str) -> Result<Value, JsonExtractionError> {
    let json = try_extract_json_from_response(content).into_result_with_context(content)?;
    serde_json::from_str(&json).map_err(|_| JsonExtractionError::NotFound {
        content_preview: preview(content.trim(), 50),
    })
}

/// First valid balanced array or object, trying each opening delimiter in
/// order of appearance.
fn first_balanced(s: &str) -> Option<String> {
    for (start, c) in s.char_indices().filter(|(_, c)| *c == '{' || *c == '[') {
        let close = if c == '{' { '}' } else { ']' };
        if let Some(end) = find_matching_close(&s[start..], c, close) {
            let candidate = &s[start..=start + end];
            if is_valid_json(candidate) {
                return Some(candidate.to_string());
            }
        }
    }
    None
}

/// Index of the delimiter closing the `open` at the start of `s`.
///
/// String literals and escape sequences are skipped.
pub fn find_matching_close(s: &str, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            c if c == open && !in_string => depth += 1,
            c if c == close && !in_string => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }

    None
}

fn count_unclosed(s: &str) -> usize {
    let mut stack = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for c in s.chars() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' | '[' if !in_string => stack += 1,
            '}' | ']' if !in_string => stack = stack.saturating_sub(1),
            _ => {}
        }
    }

    stack + usize::from(in_string)
}

//! Locate the JSON object in model output
//!
//! Models wrap JSON in markdown fences or surround it with prose even when
//! told not to. Only objects are accepted; arrays and scalars are ignored.

use serde_json::{Map, Value};

/// Extract the first JSON object from model text
pub fn extract_json_object(text: &str) -> Option<Map<String, Value>> {
    let trimmed = text.trim();

    if let Some(object) = parse_object(trimmed) {
        return Some(object);
    }

    if let Some(object) = extract_from_code_block(trimmed) {
        return Some(object);
    }

    find_object_in_text(trimmed)
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str(text).ok()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Extract a JSON object from a fenced code block (```json or bare ```)
fn extract_from_code_block(text: &str) -> Option<Map<String, Value>> {
    let mut rest = text;

    while let Some(start) = rest.find("```") {
        let after_fence = &rest[start + 3..];
        // Skip an optional language tag on the opening fence line
        let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after_fence[body_start..];

        let Some(end) = body.find("```") else {
            break;
        };

        if let Some(object) = parse_object(body[..end].trim()) {
            return Some(object);
        }

        rest = &body[end + 3..];
    }

    None
}

/// Scan for a balanced `{...}` span that parses as an object
fn find_object_in_text(text: &str) -> Option<Map<String, Value>> {
    let mut search_from = 0;

    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        if let Some(end) = balanced_object_end(&text[start..]) {
            if let Some(object) = parse_object(&text[start..start + end]) {
                return Some(object);
            }
        }
        search_from = start + 1;
    }

    None
}

/// Byte length of the balanced object at the start of `text`
fn balanced_object_end(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in text.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        if c == '\\' && in_string {
            escape_next = true;
            continue;
        }

        if c == '"' {
            in_string = !in_string;
            continue;
        }

        if in_string {
            continue;
        }

        match c {
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }

    None
}

//! Recovery of structured values from free-text model responses.

use crate::prelude::ParseError;
use serde::de::DeserializeOwned;

const ANSWER_OPEN: &str = "<answer>";
const ANSWER_CLOSE: &str = "</answer>";
const ANSWER_PREFIX: &str = "ANSWER: ";

/// Extracts the class label from the first `<answer>...</answer>` span.
pub fn extract_answer(response: &str) -> Result<String, ParseError> {
    let start = response
        .find(ANSWER_OPEN)
        .ok_or(ParseError::MissingAnswerTag)?
        + ANSWER_OPEN.len();
    let length = response[start..]
        .find(ANSWER_CLOSE)
        .ok_or(ParseError::MissingAnswerTag)?;
    let answer = response[start..start + length].trim();
    Ok(answer
        .strip_prefix(ANSWER_PREFIX)
        .unwrap_or(answer)
        .to_string())
}

/// Returns the first balanced JSON value opening with `open` (`[` or `{`).
///
/// Brackets inside string literals are ignored. Text before and after the
/// value is discarded; an unterminated value is an error.
pub fn extract_json_value(text: &str, open: char) -> Result<&str, ParseError> {
    let close = match open {
        '[' => ']',
        '{' => '}',
        other => return Err(ParseError::NoJsonValue(other)),
    };
    let start = text.find(open).ok_or(ParseError::NoJsonValue(open))?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '[' | '{' => depth += 1,
            ']' | '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    if ch != close {
                        break;
                    }
                    return Ok(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    Err(ParseError::NoJsonValue(open))
}

/// Parses the first JSON array embedded in `text`.
pub fn parse_json_array<T: DeserializeOwned>(text: &str) -> Result<Vec<T>, ParseError> {
    Ok(serde_json::from_str(extract_json_value(text, '[')?)?)
}

/// Parses the first JSON object embedded in `text`.
pub fn parse_json_object<T: DeserializeOwned>(text: &str) -> Result<T, ParseError> {
    Ok(serde_json::from_str(extract_json_value(text, '{')?)?)
}

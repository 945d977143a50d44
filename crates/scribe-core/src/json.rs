//! Model output parsing
//!
//! Two explicit stages:
//! - **Strict**: the whole output is one JSON object that validates against
//!   the type's JSON Schema, then deserializes
//! - **Approximate**: the first JSON object is dug out of prose or a fenced
//!   block, common model slips are repaired, then it deserializes
//!
//! Callers decide what to do when both stages fail.

use crate::error::ParseError;
use jsonschema::JSONSchema;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Stage that produced a parsed value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStage {
    /// Schema-validated parse of the whole output
    Strict,
    /// Recovered by the approximate parser
    Approximate,
}

/// A parsed value and the stage that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed<T> {
    /// Parsed value
    pub value: T,
    /// Producing stage
    pub stage: ParseStage,
}

/// JSON Schema of `T`, as embedded in prompts
#[must_use]
pub fn schema_value<T: JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or(Value::Null)
}

/// Strict stage: `raw` must be exactly one schema-valid JSON object
///
/// # Errors
/// [`ParseError::Syntax`] for malformed JSON, [`ParseError::NoJson`] when the
/// value is not an object, [`ParseError::Schema`] for schema violations.
pub fn parse_strict<T: DeserializeOwned + JsonSchema>(raw: &str) -> Result<T, ParseError> {
    let value: Value =
        serde_json::from_str(raw.trim()).map_err(|e| ParseError::Syntax(e.to_string()))?;
    if !value.is_object() {
        return Err(ParseError::NoJson);
    }

    let schema = schema_value::<T>();
    let compiled =
        JSONSchema::compile(&schema).map_err(|e| ParseError::Schema(vec![e.to_string()]))?;
    if let Err(errors) = compiled.validate(&value) {
        let messages = errors
            .map(|e| {
                let path = e.instance_path.to_string();
                if path.is_empty() {
                    e.to_string()
                } else {
                    format!("{path}: {e}")
                }
            })
            .collect();
        return Err(ParseError::Schema(messages));
    }

    serde_json::from_value(value).map_err(|e| ParseError::Schema(vec![e.to_string()]))
}

/// Approximate stage: first JSON object found anywhere in `raw`, repaired
///
/// # Errors
/// [`ParseError::NoJson`] when no object is present, otherwise
/// [`ParseError::Syntax`] when the repaired text still does not deserialize.
pub fn parse_approximate<T: DeserializeOwned>(raw: &str) -> Result<T, ParseError> {
    let candidate = extract_object(strip_fence(raw)).ok_or(ParseError::NoJson)?;
    let repaired = repair(candidate);
    serde_json::from_str(&repaired).map_err(|e| ParseError::Syntax(e.to_string()))
}

/// Strict stage, then approximate stage
///
/// # Errors
/// The approximate stage's error when both stages fail.
pub fn parse_model_output<T: DeserializeOwned + JsonSchema>(
    raw: &str,
) -> Result<Parsed<T>, ParseError> {
    match parse_strict(raw) {
        Ok(value) => Ok(Parsed {
            value,
            stage: ParseStage::Strict,
        }),
        Err(strict) => {
            tracing::debug!(error = %strict, "strict parse failed, trying approximate parse");
            parse_approximate(raw).map(|value| Parsed {
                value,
                stage: ParseStage::Approximate,
            })
        }
    }
}

/// Content of the first fenced code block, or `raw` itself
#[must_use]
pub fn strip_fence(raw: &str) -> &str {
    let Some(open) = raw.find("```") else {
        return raw;
    };
    let after = &raw[open + 3..];
    let body_start = after.find('\n').map_or(0, |i| i + 1);
    let body = &after[body_start..];
    match body.find("```") {
        Some(close) => &body[..close],
        None => body,
    }
}

/// First balanced `{...}` in `text`, string-aware.
///
/// A truncated object falls back to the span between the first `{` and the
/// last `}`.
#[must_use]
pub fn extract_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }

    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Repair smart quotes and trailing commas
#[must_use]
pub fn repair(text: &str) -> String {
    let normalized: String = text
        .chars()
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' | '\u{201E}' => '"',
            '\u{2018}' | '\u{2019}' => '\'',
            other => other,
        })
        .collect();

    let chars: Vec<char> = normalized.chars().collect();
    let mut out = String::with_capacity(normalized.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        if c == '"' {
            in_string = true;
        } else if c == ',' {
            let next = chars[i + 1..].iter().find(|n| !n.is_whitespace());
            if matches!(next, Some('}' | ']')) {
                continue;
            }
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Deserialize, JsonSchema)]
    #[serde(rename_all = "snake_case")]
    enum Color {
        Red,
        Blue,
    }

    #[derive(Debug, PartialEq, Deserialize, JsonSchema)]
    struct Probe {
        name: String,
        count: u32,
        color: Color,
    }

    #[test]
    fn strict_accepts_clean_object() {
        let probe: Probe = parse_strict(r#" {"name":"a","count":2,"color":"red"} "#).unwrap();
        assert_eq!(
            probe,
            Probe {
                name: "a".into(),
                count: 2,
                color: Color::Red
            }
        );
    }

    #[test]
    fn strict_reports_schema_violations() {
        let err = parse_strict::<Probe>(r#"{"name":"a","color":"green"}"#).unwrap_err();
        let ParseError::Schema(messages) = err else {
            panic!("expected schema error, got {err:?}");
        };
        assert!(!messages.is_empty());
    }

    #[test]
    fn strict_rejects_prose_and_non_objects() {
        assert!(matches!(
            parse_strict::<Probe>("Sure! {\"name\":\"a\"}"),
            Err(ParseError::Syntax(_))
        ));
        assert_eq!(parse_strict::<Probe>("[1, 2]").unwrap_err(), ParseError::NoJson);
    }

    #[test]
    fn approximate_digs_object_out_of_fenced_prose() {
        let raw = "Here you go:\n```json\n{\"name\": \"a\", \"count\": 3, \"color\": \"blue\",}\n```\nThanks";
        let probe: Probe = parse_approximate(raw).unwrap();
        assert_eq!(probe.count, 3);
        assert_eq!(probe.color, Color::Blue);
    }

    #[test]
    fn approximate_repairs_smart_quotes() {
        let raw = "{\u{201C}name\u{201D}: \u{201C}x\u{201D}, \u{201C}count\u{201D}: 1, \u{201C}color\u{201D}: \u{201C}red\u{201D}}";
        let probe: Probe = parse_approximate(raw).unwrap();
        assert_eq!(probe.name, "x");
    }

    #[test]
    fn approximate_without_object_fails() {
        assert_eq!(
            parse_approximate::<Probe>("no json here").unwrap_err(),
            ParseError::NoJson
        );
    }

    #[test]
    fn stages_are_reported() {
        let strict = parse_model_output::<Probe>(r#"{"name":"a","count":1,"color":"red"}"#).unwrap();
        assert_eq!(strict.stage, ParseStage::Strict);

        let approx =
            parse_model_output::<Probe>("Result: {\"name\":\"a\",\"count\":1,\"color\":\"red\"}")
                .unwrap();
        assert_eq!(approx.stage, ParseStage::Approximate);
    }

    #[test]
    fn extraction_respects_braces_in_strings() {
        let text = r#"prefix {"a": "}{", "b": {"c": 1}} suffix }"#;
        assert_eq!(extract_object(text), Some(r#"{"a": "}{", "b": {"c": 1}}"#));
    }

    #[test]
    fn truncated_object_falls_back_to_last_brace() {
        assert_eq!(extract_object(r#"{"a": {"b": 1}"#), Some(r#"{"a": {"b": 1}"#));
        assert_eq!(extract_object("{ never closed"), None);
    }

    #[test]
    fn trailing_commas_inside_strings_survive() {
        assert_eq!(repair(r#"{"a": "x, }", "b": [1, 2,],}"#), r#"{"a": "x, }", "b": [1, 2]}"#);
    }
}

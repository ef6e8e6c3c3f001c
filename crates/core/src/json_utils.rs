//! Structured-output repair for model responses.
//!
//! Model output that should be a JSON record can arrive wrapped in markdown
//! fences, preceded by prose, cut off mid-record because the token budget ran
//! out, or wrapped in a one-element array. Everything here turns such text back
//! into a parseable value without trusting anything about its shape.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::CoreError;
use crate::text::truncate;

/// Strip markdown code block wrappers from JSON content.
///
/// Handles `` ```json ... ``` ``, `` ``` ... ``` ``, and fences whose closing
/// marker was lost to truncation.
#[must_use]
pub fn strip_markdown_json(content: &str) -> &str {
    let trimmed = content.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    let without_prefix = trimmed.strip_prefix("```").unwrap_or(trimmed);
    let without_suffix = without_prefix.strip_suffix("```").unwrap_or(without_prefix);
    without_suffix.split_once('\n').map_or_else(|| without_suffix.trim(), |(_, rest)| rest.trim())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Expect {
    Key,
    Colon,
    Value,
    CommaOrEnd,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Frame {
    Object(Expect),
    Array(Expect),
}

impl Frame {
    const fn closer(self) -> char {
        match self {
            Self::Object(_) => '}',
            Self::Array(_) => ']',
        }
    }
}

/// Output length and open containers right after the last complete value.
struct Checkpoint {
    len: usize,
    stack: Vec<Frame>,
}

fn set_expect(stack: &mut [Frame], next: Expect) {
    if let Some(Frame::Object(e) | Frame::Array(e)) = stack.last_mut() {
        *e = next;
    }
}

fn after_comma(stack: &mut [Frame]) {
    match stack.last_mut() {
        Some(Frame::Object(e)) => *e = Expect::Key,
        Some(Frame::Array(e)) => *e = Expect::Value,
        None => {},
    }
}

fn close_all(mut out: String, stack: &[Frame]) -> String {
    for frame in stack.iter().rev() {
        out.push(frame.closer());
    }
    out
}

fn is_primitive_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '-' | '+' | '.')
}

fn is_valid_primitive(token: &str) -> bool {
    serde_json::from_str::<Value>(token).is_ok_and(|v| !v.is_object() && !v.is_array())
}

/// Python-isms models sometimes emit in place of JSON literals.
fn normalize_literal(token: &str) -> Option<&'static str> {
    match token {
        "True" => Some("true"),
        "False" => Some("false"),
        "None" | "undefined" | "NaN" => Some("null"),
        _ => None,
    }
}

fn trim_dangling_comma(out: &mut String) {
    let trimmed_len = out.trim_end().len();
    if out.get(..trimmed_len).is_some_and(|s| s.ends_with(',')) {
        out.truncate(trimmed_len.saturating_sub(1));
    }
}

/// Drop an escape sequence that was cut off at the end of a string.
fn trim_partial_escape(out: &mut String) {
    let tail_start = out.len().saturating_sub(6);
    let Some(tail) = out.get(tail_start..) else {
        return;
    };
    if let Some(pos) = tail.rfind("\\u") {
        let hex_digits = tail.len() - pos - 2;
        if hex_digits < 4 {
            out.truncate(tail_start + pos);
        }
    }
}

/// Repair a JSON-like document starting at `body`'s first character.
fn repair_from(body: &str) -> Option<String> {
    let mut out = String::with_capacity(body.len() + 8);
    let mut stack: Vec<Frame> = Vec::new();
    let mut checkpoint: Option<Checkpoint> = None;
    let mut in_string = false;
    let mut string_is_key = false;
    let mut escaped = false;
    let mut primitive = String::new();

    for ch in body.chars() {
        if in_string {
            if escaped {
                out.push(ch);
                escaped = false;
                continue;
            }
            match ch {
                '\\' => {
                    out.push(ch);
                    escaped = true;
                },
                '"' => {
                    out.push(ch);
                    in_string = false;
                    if string_is_key {
                        set_expect(&mut stack, Expect::Colon);
                    } else {
                        set_expect(&mut stack, Expect::CommaOrEnd);
                        checkpoint = Some(Checkpoint { len: out.len(), stack: stack.clone() });
                    }
                },
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                c => out.push(c),
            }
            continue;
        }

        if is_primitive_char(ch) {
            primitive.push(ch);
            out.push(ch);
            continue;
        }

        if !primitive.is_empty() {
            if let Some(literal) = normalize_literal(&primitive) {
                out.truncate(out.len() - primitive.len());
                out.push_str(literal);
            }
            primitive.clear();
            set_expect(&mut stack, Expect::CommaOrEnd);
            checkpoint = Some(Checkpoint { len: out.len(), stack: stack.clone() });
        }

        match ch {
            '{' => {
                out.push(ch);
                stack.push(Frame::Object(Expect::Key));
                checkpoint = Some(Checkpoint { len: out.len(), stack: stack.clone() });
            },
            '[' => {
                out.push(ch);
                stack.push(Frame::Array(Expect::Value));
                checkpoint = Some(Checkpoint { len: out.len(), stack: stack.clone() });
            },
            '}' | ']' => {
                if matches!(
                    stack.last(),
                    Some(Frame::Object(Expect::Key) | Frame::Array(Expect::Value))
                ) {
                    trim_dangling_comma(&mut out);
                }
                let Some(frame) = stack.pop() else {
                    continue;
                };
                out.push(frame.closer());
                if stack.is_empty() {
                    return Some(out);
                }
                set_expect(&mut stack, Expect::CommaOrEnd);
                checkpoint = Some(Checkpoint { len: out.len(), stack: stack.clone() });
            },
            '"' => {
                out.push(ch);
                in_string = true;
                string_is_key = matches!(stack.last(), Some(Frame::Object(Expect::Key)));
            },
            ':' => {
                out.push(ch);
                set_expect(&mut stack, Expect::Value);
            },
            ',' => {
                out.push(ch);
                after_comma(&mut stack);
            },
            c if c.is_whitespace() => out.push(c),
            _ => {},
        }
    }

    if in_string && !string_is_key {
        if escaped {
            out.pop();
        }
        trim_partial_escape(&mut out);
        out.push('"');
        set_expect(&mut stack, Expect::CommaOrEnd);
        return Some(close_all(out, &stack));
    }

    if !in_string && !primitive.is_empty() {
        let literal = normalize_literal(&primitive).map(str::to_owned);
        if let Some(literal) = literal {
            out.truncate(out.len() - primitive.len());
            out.push_str(&literal);
            return Some(close_all(out, &stack));
        }
        if is_valid_primitive(&primitive) {
            return Some(close_all(out, &stack));
        }
    }

    checkpoint.map(|cp| {
        out.truncate(cp.len);
        close_all(out, &cp.stack)
    })
}

/// Repair a truncated or prose-wrapped JSON document.
///
/// Closes unbalanced strings and containers, strips dangling keys and trailing
/// commas, escapes raw control characters inside strings, and ignores any prose
/// before the first bracket or after the top-level value closes.
#[must_use]
pub fn repair_json(input: &str) -> Option<String> {
    let stripped = strip_markdown_json(input);
    let start = stripped.find(['{', '['])?;
    stripped.get(start..).and_then(repair_from)
}

/// Parse a model response into a JSON value, repairing it when needed.
///
/// # Errors
/// Returns `CoreError::Unparsable` when no bracketed structure can be recovered.
pub fn parse_json_value(raw: &str) -> Result<Value, CoreError> {
    let stripped = strip_markdown_json(raw);
    if let Ok(value) = serde_json::from_str::<Value>(stripped) {
        return Ok(value);
    }

    let mut starts: Vec<usize> =
        [stripped.find('{'), stripped.find('[')].into_iter().flatten().collect();
    starts.sort_unstable();
    for start in starts {
        let Some(repaired) = stripped.get(start..).and_then(repair_from) else {
            continue;
        };
        match serde_json::from_str::<Value>(&repaired) {
            Ok(value) => {
                tracing::debug!(
                    original_len = raw.len(),
                    repaired_len = repaired.len(),
                    "repaired structured model output"
                );
                return Ok(value);
            },
            Err(e) => tracing::debug!(error = %e, "repair candidate still unparsable"),
        }
    }

    Err(CoreError::Unparsable(truncate(raw, 200).to_owned()))
}

/// Deserialize `T` from a model response, unwrapping a single-element array when
/// a record was expected.
///
/// # Errors
/// Returns an error when the text cannot be repaired or does not fit `T`.
pub fn parse_structured<T: DeserializeOwned>(raw: &str) -> Result<T, CoreError> {
    let value = parse_json_value(raw)?;
    from_value_unwrapping(value)
}

/// Deserialize `T`, retrying with the sole element when `value` is a one-element array.
///
/// # Errors
/// Returns the original deserialization error when neither shape fits.
pub fn from_value_unwrapping<T: DeserializeOwned>(value: Value) -> Result<T, CoreError> {
    match serde_json::from_value::<T>(value.clone()) {
        Ok(parsed) => Ok(parsed),
        Err(e) => match value {
            Value::Array(mut items) if items.len() == 1 => {
                Ok(serde_json::from_value(items.remove(0))?)
            },
            _ => Err(e.into()),
        },
    }
}

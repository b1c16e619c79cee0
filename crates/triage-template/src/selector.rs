//! Evidence selectors over executed tool output.
//!
//! Paths are a restricted JSONPath: `{.a.b[*].c}` or `.a.b`. Index and
//! wildcard brackets are dropped, and a path segment applied to an array
//! is applied to each element instead.

use regex::RegexBuilder;
use serde_json::Value;
use tracing::debug;

use crate::types::{EvidenceSelector, SelectorType};

/// A tool result viewed both as JSON (when it parses) and as text.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResult {
    pub value: Option<Value>,
    pub text: String,
}

impl ParsedResult {
    /// Strings are parsed as JSON and kept as opaque text when they do not
    /// parse; any other value is used as-is and rendered compactly.
    pub fn from_result(result: &Value) -> Self {
        match result {
            Value::String(text) => Self {
                value: serde_json::from_str(text).ok(),
                text: text.clone(),
            },
            other => Self {
                value: Some(other.clone()),
                text: other.to_string(),
            },
        }
    }

    fn object(&self) -> Option<&Value> {
        self.value.as_ref().filter(|v| !v.is_null())
    }
}

/// Executed results prepared once per evaluation.
#[derive(Debug, Clone, Default)]
pub struct SelectorInput {
    results: Vec<ParsedResult>,
    text: String,
}

impl SelectorInput {
    pub fn new<'a>(results: impl IntoIterator<Item = &'a Value>) -> Self {
        let results: Vec<ParsedResult> = results.into_iter().map(ParsedResult::from_result).collect();
        let text = results
            .iter()
            .map(|r| r.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        Self { results, text }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn matches(&self, selector: &EvidenceSelector) -> bool {
        match selector.selector_type {
            SelectorType::EventsRegex => self.matches_regex(&selector.path),
            SelectorType::Jsonpath => self.matches_path(&selector.path),
            SelectorType::Yq => {
                let path = selector.path.strip_prefix('.').unwrap_or(&selector.path);
                self.matches_path(&format!("{{.{}}}", path))
            }
            SelectorType::Dsl => self.text.contains(selector.path.as_str()),
        }
    }

    fn matches_regex(&self, pattern: &str) -> bool {
        let (pattern, case_insensitive) = match pattern.get(..4) {
            Some(prefix) if prefix.eq_ignore_ascii_case("(?i)") => (&pattern[4..], true),
            _ => (pattern, false),
        };
        match RegexBuilder::new(pattern)
            .case_insensitive(case_insensitive)
            .build()
        {
            Ok(re) => re.is_match(&self.text),
            Err(err) => {
                debug!(pattern, error = %err, "Skipping invalid evidence regex");
                false
            }
        }
    }

    fn matches_path(&self, path: &str) -> bool {
        self.results
            .iter()
            .filter_map(ParsedResult::object)
            .any(|value| select_path(value, path).is_some())
    }
}

/// Resolve a restricted path against `value`. `None` means undefined.
pub fn select_path(value: &Value, path: &str) -> Option<Value> {
    let dotted = path
        .strip_prefix("{.")
        .and_then(|p| p.strip_suffix('}'))
        .unwrap_or_else(|| path.strip_prefix('.').unwrap_or(path));

    let segments: Vec<String> = dotted
        .split('.')
        .filter(|s| !s.is_empty())
        .map(strip_brackets)
        .collect();

    let mut current = value.clone();
    for segment in &segments {
        current = match current {
            Value::Null => return None,
            Value::Array(items) => {
                let mut picked: Vec<Value> = items
                    .iter()
                    .filter_map(|item| item.as_object().and_then(|o| o.get(segment)).cloned())
                    .collect();
                if picked.len() == 1 {
                    picked.remove(0)
                } else {
                    Value::Array(picked)
                }
            }
            Value::Object(map) => map.get(segment)?.clone(),
            _ => return None,
        };
    }
    Some(current)
}

/// Drop `[*]`, `[n]`, `[]` and `[]?` from a path segment.
fn strip_brackets(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut rest = segment;

    while let Some(open) = rest.find('[') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find(']') else {
            out.push_str(&rest[open..]);
            return out;
        };
        let inner = &after[..close];
        let droppable =
            inner.is_empty() || inner == "*" || inner.chars().all(|c| c.is_ascii_digit());
        if droppable {
            rest = &after[close + 1..];
            if inner.is_empty() {
                rest = rest.strip_prefix('?').unwrap_or(rest);
            }
        } else {
            out.push('[');
            rest = after;
        }
    }
    out.push_str(rest);
    out
}

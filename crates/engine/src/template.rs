//! `{{KEY}}` placeholder rendering for task instructions.
//!
//! Keys are matched against the upper-cased variable names. The text is
//! scanned once, left to right: substituted values are never re-scanned and
//! unknown placeholders are left as they are. Every `{{` opens a candidate,
//! so a stray `{{` earlier in the text does not hide a later placeholder.
//!
//! When two variable names upper-case to the same key, a name that is
//! already upper-case wins; otherwise the lexicographically smallest name.

use serde_json::Value;
use std::collections::HashMap;
use std::ops::Range;
use taskswarm_core::message::Variables;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// One `{{...}}` candidate in a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder<'a> {
    /// Byte range of the whole placeholder, braces included
    pub span: Range<usize>,
    /// Text between the braces
    pub key: &'a str,
}

impl Placeholder<'_> {
    /// A non-empty key free of braces and line breaks.
    pub fn is_well_formed(&self) -> bool {
        !self.key.is_empty() && !self.key.contains(['{', '}', '\n'])
    }
}

/// Iterator over placeholder candidates, one per `{{` occurrence.
///
/// Candidates may overlap: `{{{A}}}` yields `{A` at 0 and `A` at 1.
#[derive(Debug, Clone)]
pub struct Placeholders<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Iterator for Placeholders<'a> {
    type Item = Placeholder<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.pos + self.text.get(self.pos..)?.find(OPEN)?;
        let key_start = start + OPEN.len();
        // No later `{{` can close either once this one is unterminated
        let key_len = self.text[key_start..].find(CLOSE)?;
        let end = key_start + key_len + CLOSE.len();

        // `{` is one byte, so the next candidate may start right after it
        self.pos = start + 1;
        Some(Placeholder {
            span: start..end,
            key: &self.text[key_start..key_start + key_len],
        })
    }
}

/// All placeholder candidates in `text`, in order of their opening braces.
pub fn placeholders(text: &str) -> Placeholders<'_> {
    Placeholders { text, pos: 0 }
}

/// Variables indexed by their upper-cased name.
pub fn lookup_table(variables: &Variables) -> HashMap<String, &Value> {
    let mut table: HashMap<String, (&str, &Value)> = HashMap::with_capacity(variables.len());
    for (name, value) in variables {
        let key = name.to_uppercase();
        let replace = match table.get(&key) {
            None => true,
            Some((held, _)) => {
                let held_exact = *held == key;
                let new_exact = *name == key;
                new_exact || (!held_exact && name.as_str() < *held)
            }
        };
        if replace {
            table.insert(key, (name.as_str(), value));
        }
    }
    table
        .into_iter()
        .map(|(key, (_, value))| (key, value))
        .collect()
}

/// Render `template` against `variables`.
pub fn render(template: &str, variables: &Variables) -> String {
    if !template.contains(OPEN) {
        return template.to_string();
    }

    let lookup = lookup_table(variables);
    let mut out = String::with_capacity(template.len());
    let mut cursor = 0;

    for placeholder in placeholders(template) {
        // Inside a placeholder that was already substituted
        if placeholder.span.start < cursor {
            continue;
        }
        if let Some(value) = lookup.get(placeholder.key) {
            out.push_str(&template[cursor..placeholder.span.start]);
            out.push_str(&value_text(value));
            cursor = placeholder.span.end;
        }
    }

    out.push_str(&template[cursor..]);
    out
}

/// Strings render bare; everything else as JSON text.
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

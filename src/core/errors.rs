//! Per-field validation message accumulator

use indexmap::IndexMap;
use serde::Serialize;

/// Ordered mapping of field path to the messages recorded against it.
///
/// Insertion order is preserved across fields and within a field, so
/// `full_messages` always reads in the order the hooks and the schema check
/// reported problems.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Errors {
    data: IndexMap<String, Vec<String>>,
}

impl Errors {
    /// Create an empty error set
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `message` to the messages of `field`
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.data
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    /// True when no field has any message
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of fields carrying at least one message
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Messages recorded for a field, in insertion order
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.data.get(field).map(Vec::as_slice)
    }

    /// True if `field` has at least one message
    pub fn contains(&self, field: &str) -> bool {
        self.data.contains_key(field)
    }

    /// Remove every message of `field`, returning them
    pub fn remove(&mut self, field: &str) -> Option<Vec<String>> {
        self.data.shift_remove(field)
    }

    /// Offending field names, in insertion order
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    /// Flatten to `"<field> <message>"` strings
    pub fn full_messages(&self) -> Vec<String> {
        self.data
            .iter()
            .flat_map(|(field, messages)| {
                messages
                    .iter()
                    .map(move |message| format!("{field} {message}"))
            })
            .collect()
    }

    /// One-line summary such as `"email is not valid"` or
    /// `"name, email are not valid"`.
    pub fn short_message(&self) -> String {
        let fields: Vec<&str> = self.fields().collect();
        let verb = if fields.len() == 1 { "is" } else { "are" };
        format!("{} {verb} not valid", fields.join(", "))
    }

    /// Reset to empty
    pub fn clear(&mut self) {
        self.data.clear();
    }
}

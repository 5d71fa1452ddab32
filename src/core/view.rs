//! Render views: ordered projections of persisted attributes

use crate::core::attributes::Document;
use serde_json::{Map, Value};

/// One entry of a [`View`]
#[derive(Debug, Clone, PartialEq)]
pub enum ViewField {
    /// Copy the value of this key as-is
    Field(String),
    /// Project the object under this key through a sub-view
    Nested(String, View),
}

/// Ordered list of fields to expose when rendering a record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct View {
    fields: Vec<ViewField>,
}

impl View {
    /// Create an empty view
    pub fn new() -> Self {
        Self::default()
    }

    /// View over flat field names
    pub fn of(fields: &[&str]) -> Self {
        fields
            .iter()
            .fold(Self::new(), |view, name| view.field(*name))
    }

    /// Append a flat field
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.fields.push(ViewField::Field(name.into()));
        self
    }

    /// Append a nested projection
    pub fn nested(mut self, name: impl Into<String>, view: View) -> Self {
        self.fields.push(ViewField::Nested(name.into(), view));
        self
    }

    /// Entries of the view, in order
    pub fn fields(&self) -> &[ViewField] {
        &self.fields
    }

    /// Parse the JSON form `["_id", "name", {"options": ["hey", {"what": ["yes"]}]}]`
    pub fn from_json(fields: &Value) -> Option<Self> {
        let mut view = Self::new();
        for entry in fields.as_array()? {
            view = match entry {
                Value::String(name) => view.field(name.as_str()),
                Value::Object(nested) => nested.iter().try_fold(view, |view, (name, sub)| {
                    Some(view.nested(name.as_str(), View::from_json(sub)?))
                })?,
                _ => return None,
            };
        }
        Some(view)
    }

    /// Project `source` through the view. Missing keys render as null; a
    /// nested entry over a missing or non-object value renders as an object
    /// of nulls.
    pub fn project(&self, source: &Document) -> Document {
        let empty = Map::new();
        let mut out = Map::new();
        for entry in &self.fields {
            match entry {
                ViewField::Field(name) => {
                    let value = source.get(name).cloned().unwrap_or(Value::Null);
                    out.insert(name.clone(), value);
                }
                ViewField::Nested(name, view) => {
                    let inner = source
                        .get(name)
                        .and_then(Value::as_object)
                        .unwrap_or(&empty);
                    out.insert(name.clone(), Value::Object(view.project(inner)));
                }
            }
        }
        out
    }
}

//! Structural shape validation
//!
//! A [`Schema`] describes the *shape* of a document: which kinds live at which
//! keys and which keys are permitted at all. It never expresses business rules
//! (presence, length, formats); those are hooks registered per entity.

use crate::core::errors::Errors;
use indexmap::IndexMap;
use serde_json::Value;

/// Shape template for a document or one of its sub-values
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    String,
    Number,
    Boolean,
    /// RFC 3339 timestamp stored as a string
    Timestamp,
    /// Any list; elements are not inspected
    Array,
    /// Object with an enumerated set of permitted keys. An empty map is a
    /// wildcard accepting any nested shape.
    Object(IndexMap<String, Schema>),
}

/// Kind of a candidate value, as seen by the validator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

fn kind_of(value: &Value) -> Option<Kind> {
    match value {
        Value::Null => None,
        Value::Bool(_) => Some(Kind::Boolean),
        Value::Number(_) => Some(Kind::Number),
        Value::String(_) => Some(Kind::String),
        Value::Array(_) => Some(Kind::Array),
        Value::Object(_) => Some(Kind::Object),
    }
}

fn child_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

impl Schema {
    /// Object schema from `(key, schema)` pairs, in declaration order
    pub fn object<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Schema)>,
    {
        Schema::Object(fields.into_iter().map(|(k, s)| (k.into(), s)).collect())
    }

    /// Object schema accepting any nested shape
    pub fn wildcard() -> Self {
        Schema::Object(IndexMap::new())
    }

    /// Infer a schema from a sample document: `""` is a string, `0` a number,
    /// `true` a boolean, `[]` an array and `{...}` an object (recursively).
    pub fn from_template(template: &Value) -> Self {
        match template {
            Value::Bool(_) => Schema::Boolean,
            Value::Number(_) => Schema::Number,
            Value::Array(_) => Schema::Array,
            Value::Object(map) => Schema::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Schema::from_template(v)))
                    .collect(),
            ),
            Value::String(_) | Value::Null => Schema::String,
        }
    }

    /// Human name of the expected kind, article included
    pub fn expected(&self) -> &'static str {
        match self {
            Schema::String => "a string",
            Schema::Number => "a number",
            Schema::Boolean => "a boolean",
            Schema::Timestamp => "a timestamp",
            Schema::Array => "an array",
            Schema::Object(_) => "an object",
        }
    }

    /// True for an object schema that does not enumerate its keys
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Schema::Object(fields) if fields.is_empty())
    }

    /// Compare `value` against this schema, appending one message per
    /// mismatch under its dotted path. Null values are treated as absent.
    pub fn check(&self, path: &str, value: &Value, errors: &mut Errors) {
        let Some(kind) = kind_of(value) else {
            return;
        };

        let matches = match self {
            Schema::String => kind == Kind::String,
            Schema::Number => kind == Kind::Number,
            Schema::Boolean => kind == Kind::Boolean,
            Schema::Timestamp => value
                .as_str()
                .is_some_and(|s| chrono::DateTime::parse_from_rfc3339(s).is_ok()),
            Schema::Array => kind == Kind::Array,
            Schema::Object(_) => kind == Kind::Object,
        };

        if !matches {
            let field = if path.is_empty() { "record" } else { path };
            errors.add(field, format!("must be {}", self.expected()));
            return;
        }

        let (Schema::Object(fields), Value::Object(candidate)) = (self, value) else {
            return;
        };
        if fields.is_empty() {
            return;
        }

        for (key, nested) in candidate {
            let nested_path = child_path(path, key);
            match fields.get(key) {
                Some(schema) => schema.check(&nested_path, nested, errors),
                None => errors.add(nested_path, "is not a permitted key"),
            }
        }
    }

    /// Validate a whole document, returning the errors found
    pub fn validate(&self, document: &Value) -> Errors {
        let mut errors = Errors::new();
        self.check("", document, &mut errors);
        errors
    }
}

//! Per-entity configuration consumed by the record engine
//!
//! An entity is plain data: a collection name, a shape schema, eight ordered
//! hook lists, named render views, a read-only flag and its unique indexes.
//!
//! ```rust,ignore
//! let descriptor = EntityDescriptor::new("Comment", "comments")
//!     .with_schema(Schema::object([("text", Schema::String)]))
//!     .with_hook(Stage::AfterValidate, hook_fn("validate_text", validate_text))
//!     .with_view("default", View::of(&["_id", "text"]))
//!     .read_only();
//! ```

use crate::core::hooks::{Hook, Hooks, Stage};
use crate::core::schema::Schema;
use crate::core::view::View;
use indexmap::IndexMap;
use std::sync::Arc;

/// Name of the view used when `render` is called without one
pub const DEFAULT_VIEW: &str = "default";

const DEFAULT_UNIQUE_MESSAGE: &str = "must be unique";

/// Unique index declared by an entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueIndex {
    /// Index name as reported by the store on conflict
    pub name: String,
    /// Indexed keys, in order
    pub keys: Vec<String>,
    /// Field that receives the validation message on conflict
    pub field: String,
    pub message: String,
}

impl UniqueIndex {
    /// Single-field index named `<collection>.<field>`
    pub fn on(collection: &str, field: &str) -> Self {
        Self {
            name: format!("{collection}.{field}"),
            keys: vec![field.to_string()],
            field: field.to_string(),
            message: DEFAULT_UNIQUE_MESSAGE.to_string(),
        }
    }

    /// Compound index; conflicts are attributed to the last key
    pub fn compound(name: impl Into<String>, keys: &[&str]) -> Self {
        let keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        Self {
            name: name.into(),
            field: keys.last().cloned().unwrap_or_default(),
            keys,
            message: DEFAULT_UNIQUE_MESSAGE.to_string(),
        }
    }

    /// Attribute conflicts to `field` with a custom message
    pub fn reported_as(mut self, field: impl Into<String>, message: impl Into<String>) -> Self {
        self.field = field.into();
        self.message = message.into();
        self
    }
}

/// Static configuration of one persisted entity
#[derive(Debug, Clone)]
pub struct EntityDescriptor {
    /// Entity name used in errors and logs (`User`, `FriendRequest`, ...)
    pub name: String,
    /// Store namespace
    pub collection: String,
    pub schema: Schema,
    pub hooks: Hooks,
    pub views: IndexMap<String, View>,
    /// Forbids updates after creation unless protection is overridden
    pub read_only: bool,
    pub unique_indexes: Vec<UniqueIndex>,
}

impl EntityDescriptor {
    /// Descriptor with a wildcard schema, no hooks and no views
    pub fn new(name: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collection: collection.into(),
            schema: Schema::wildcard(),
            hooks: Hooks::new(),
            views: IndexMap::new(),
            read_only: false,
            unique_indexes: Vec::new(),
        }
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    /// Append a hook to a stage
    pub fn with_hook(mut self, stage: Stage, hook: Arc<dyn Hook>) -> Self {
        self.hooks.push(stage, hook);
        self
    }

    pub fn with_view(mut self, name: impl Into<String>, view: View) -> Self {
        self.views.insert(name.into(), view);
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn with_unique_index(mut self, index: UniqueIndex) -> Self {
        self.unique_indexes.push(index);
        self
    }

    /// Named view, or the default view when `name` is `None`
    pub fn view(&self, name: Option<&str>) -> Option<&View> {
        self.views.get(name.unwrap_or(DEFAULT_VIEW))
    }

    /// Field and message to report for a conflict on the index `index_name`
    ///
    /// Declared indexes answer directly. Otherwise the `<collection>.` prefix
    /// and any direction suffix (`_1`, `_-1`) are stripped from the name.
    pub fn unique_violation(&self, index_name: &str) -> (String, String) {
        if let Some(index) = self.unique_indexes.iter().find(|i| i.name == index_name) {
            return (index.field.clone(), index.message.clone());
        }

        let prefix = format!("{}.", self.collection);
        let name = index_name.strip_prefix(&prefix).unwrap_or(index_name);
        let name = name
            .strip_suffix("_-1")
            .or_else(|| name.strip_suffix("_1"))
            .unwrap_or(name);
        (name.to_string(), DEFAULT_UNIQUE_MESSAGE.to_string())
    }
}

//! The record lifecycle engine
//!
//! A [`Record`] is one instance of a persisted entity. It keeps the last
//! durable snapshot of its attributes (the baseline) apart from the writes
//! made since (the [`ChangeSet`] overlay), and moves between two states:
//!
//! ```text
//!              save()                 save() / update() / reload()
//! transient ───────────▶ persisted ◀──────────────────────────────┐
//!     ▲                      │  └──────────────────────────────────┘
//!     └──────── delete() ────┘
//! ```
//!
//! The baseline is only ever rewritten after a successful store round trip.
//! A record is persisted exactly when its baseline carries an `_id`.

use crate::core::attributes::{ChangeSet, Document, remove_path, segments};
use crate::core::descriptor::EntityDescriptor;
use crate::core::error::{RecordError, RecordResult};
use crate::core::errors::Errors;
use crate::core::hooks::Stage;
use crate::core::store::{Store, StoreError};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Key holding the store-assigned identity
pub const ID_KEY: &str = "_id";

/// One instance of a persisted entity
#[derive(Clone)]
pub struct Record {
    descriptor: Arc<EntityDescriptor>,
    store: Arc<dyn Store>,
    persisted: Document,
    changes: ChangeSet,
    errors: Errors,
}

impl Record {
    /// Build a transient record from raw attributes. Any `_id` is dropped.
    pub fn new(
        descriptor: Arc<EntityDescriptor>,
        store: Arc<dyn Store>,
        mut attributes: Document,
    ) -> Self {
        attributes.remove(ID_KEY);
        Self::hydrate(descriptor, store, attributes)
    }

    /// Wrap a document read back from the store
    pub(crate) fn hydrate(
        descriptor: Arc<EntityDescriptor>,
        store: Arc<dyn Store>,
        document: Document,
    ) -> Self {
        Self {
            descriptor,
            store,
            persisted: document,
            changes: ChangeSet::new(),
            errors: Errors::new(),
        }
    }

    pub fn descriptor(&self) -> &EntityDescriptor {
        &self.descriptor
    }

    /// Entity name used in errors and logs
    pub fn entity_name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn collection(&self) -> &str {
        &self.descriptor.collection
    }

    /// Store the record persists to
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Store-assigned identity, present iff the record is persisted
    pub fn id(&self) -> Option<&str> {
        self.persisted.get(ID_KEY).and_then(Value::as_str)
    }

    pub fn is_persisted(&self) -> bool {
        self.id().is_some()
    }

    pub fn is_new(&self) -> bool {
        !self.is_persisted()
    }

    /// True when writes are pending since construction or the last save
    pub fn is_changed(&self) -> bool {
        !self.changes.is_empty()
    }

    /// True when a write to `path` is pending
    pub fn is_changed_at(&self, path: &str) -> bool {
        self.changes.contains(path)
    }

    /// Current value at a dotted path, pending writes first
    pub fn get(&self, path: &str) -> Option<Value> {
        self.changes.resolve(&self.persisted, path)
    }

    /// Current string value at a dotted path
    pub fn get_str(&self, path: &str) -> Option<String> {
        match self.get(path)? {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// True when the value at `path` is neither missing, null nor an empty string
    pub fn present(&self, path: &str) -> bool {
        match self.get(path) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.is_empty(),
            Some(_) => true,
        }
    }

    /// Value at `path` as of the last store round trip
    pub fn persisted_value(&self, path: &str) -> Option<&Value> {
        crate::core::attributes::get_path(&self.persisted, path)
    }

    /// Record a write. Writes to `_id` are ignored.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) {
        if segments(path).first() == Some(&ID_KEY) {
            tracing::debug!(entity = self.entity_name(), "ignoring write to _id");
            return;
        }
        self.changes.set(path, value.into());
    }

    /// Remove `path` from both the pending writes and the baseline
    pub fn unset(&mut self, path: &str) {
        if segments(path).first() == Some(&ID_KEY) {
            return;
        }
        self.changes.unset(path);
        remove_path(&mut self.persisted, path);
    }

    /// Baseline merged with pending writes
    pub fn attributes(&self) -> Document {
        self.changes.merged(&self.persisted)
    }

    /// The last durable snapshot
    pub fn persisted_attributes(&self) -> &Document {
        &self.persisted
    }

    pub fn changes(&self) -> &ChangeSet {
        &self.changes
    }

    pub fn errors(&self) -> &Errors {
        &self.errors
    }

    pub fn errors_mut(&mut self) -> &mut Errors {
        &mut self.errors
    }

    /// Project the baseline through the named view, or the default view.
    /// An entity without such a view renders as an empty object.
    pub fn render(&self, view: Option<&str>) -> Document {
        self.descriptor
            .view(view)
            .map(|v| v.project(&self.persisted))
            .unwrap_or_default()
    }

    /// Run the validation stages and the schema check, returning the
    /// accumulated errors. Previous errors are discarded first.
    pub async fn validate(&mut self) -> RecordResult<&Errors> {
        self.errors.clear();
        self.run_hooks(Stage::BeforeValidate).await?;

        let candidate = if self.is_new() {
            self.changes.merged(&self.persisted)
        } else {
            self.changes.to_document()
        };
        let descriptor = Arc::clone(&self.descriptor);
        descriptor
            .schema
            .check("", &Value::Object(candidate), &mut self.errors);

        self.run_hooks(Stage::AfterValidate).await?;
        Ok(&self.errors)
    }

    /// Validate and persist the record
    pub async fn save(&mut self) -> RecordResult<()> {
        self.persist(false).await
    }

    /// Save even when the entity is read-only
    pub async fn save_overriding_protection(&mut self) -> RecordResult<()> {
        self.persist(true).await
    }

    /// Set every key of `partial`, then save
    pub async fn update(&mut self, partial: Document) -> RecordResult<()> {
        for (key, value) in partial {
            self.set(&key, value);
        }
        self.save().await
    }

    /// Replace the baseline with the stored row and drop pending writes.
    /// Does nothing for a transient record.
    pub async fn reload(&mut self) -> RecordResult<()> {
        let Some(id) = self.id().map(str::to_owned) else {
            return Ok(());
        };

        tracing::debug!(entity = self.entity_name(), id = %id, "reloading record");
        match self.store.find(self.collection(), &id).await? {
            Some(document) => {
                self.persisted = document;
                self.changes.clear();
                Ok(())
            }
            None => Err(RecordError::not_found_by_id(self.entity_name(), &id)),
        }
    }

    /// Remove the stored row. The record keeps its attributes but loses its
    /// identity.
    pub async fn delete(&mut self) -> RecordResult<()> {
        let Some(id) = self.id().map(str::to_owned) else {
            return Err(RecordError::NotFound {
                entity: self.entity_name().to_string(),
                query: serde_json::json!({ ID_KEY: null }),
            });
        };

        let deleted = self.store.delete(self.collection(), &id).await?;
        if deleted == 0 {
            return Err(RecordError::not_found_by_id(self.entity_name(), &id));
        }

        self.persisted.remove(ID_KEY);
        tracing::info!(entity = self.entity_name(), id = %id, "record deleted");
        Ok(())
    }

    async fn persist(&mut self, override_protection: bool) -> RecordResult<()> {
        if self.descriptor.read_only && self.is_persisted() && !override_protection {
            return Err(RecordError::ReadOnly {
                entity: self.entity_name().to_string(),
            });
        }

        self.validate().await?;
        self.ensure_valid()?;

        if self.is_new() {
            self.insert().await
        } else {
            self.write_changes().await
        }
    }

    async fn insert(&mut self) -> RecordResult<()> {
        self.run_stage(Stage::BeforeCreate).await?;
        self.run_stage(Stage::BeforeSave).await?;

        let document = self.changes.merged(&self.persisted);
        tracing::debug!(
            entity = self.entity_name(),
            collection = self.collection(),
            "saving new record"
        );
        let stored = match self.store.save(self.collection(), document).await {
            Ok(stored) => stored,
            Err(e) => return Err(self.store_failure(e)),
        };

        self.changes.apply_to(&mut self.persisted);
        self.persisted.extend(stored);
        self.changes.clear();
        tracing::info!(
            entity = self.entity_name(),
            id = self.id().unwrap_or_default(),
            "record created"
        );

        self.run_stage(Stage::AfterSave).await?;
        self.run_stage(Stage::AfterCreate).await
    }

    async fn write_changes(&mut self) -> RecordResult<()> {
        self.run_stage(Stage::BeforeUpdate).await?;
        self.run_stage(Stage::BeforeSave).await?;

        let Some(id) = self.id().map(str::to_owned) else {
            return Err(RecordError::not_found_by_id(self.entity_name(), ""));
        };
        let update = self.changes.to_update(&self.persisted);
        tracing::debug!(
            entity = self.entity_name(),
            id = %id,
            keys = update.len(),
            "updating record"
        );
        let matched = match self.store.update(self.collection(), &id, update).await {
            Ok(matched) => matched,
            Err(e) => return Err(self.store_failure(e)),
        };
        if matched == 0 {
            return Err(RecordError::not_found_by_id(self.entity_name(), &id));
        }

        self.changes.apply_to(&mut self.persisted);
        self.changes.clear();

        self.run_stage(Stage::AfterSave).await?;
        self.run_stage(Stage::AfterUpdate).await
    }

    async fn run_hooks(&mut self, stage: Stage) -> RecordResult<()> {
        let descriptor = Arc::clone(&self.descriptor);
        tracing::debug!(
            entity = self.entity_name(),
            stage = stage.name(),
            id = self.id().unwrap_or_default(),
            "running stage"
        );
        descriptor.hooks.run(stage, self).await
    }

    /// Run a post-validation stage; errors added by its hooks surface once
    /// the stage completes
    async fn run_stage(&mut self, stage: Stage) -> RecordResult<()> {
        self.run_hooks(stage).await?;
        self.ensure_valid()
    }

    fn ensure_valid(&self) -> RecordResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(RecordError::Invalid {
                entity: self.entity_name().to_string(),
                errors: self.errors.clone(),
            })
        }
    }

    fn store_failure(&mut self, error: StoreError) -> RecordError {
        match error {
            StoreError::DuplicateKey { index } => {
                let (field, message) = self.descriptor.unique_violation(&index);
                tracing::warn!(
                    entity = self.entity_name(),
                    index = %index,
                    field = %field,
                    "unique index conflict reported as validation error"
                );
                self.errors.add(field, message);
                RecordError::Invalid {
                    entity: self.entity_name().to_string(),
                    errors: self.errors.clone(),
                }
            }
            StoreError::Backend(e) => RecordError::Store(e),
        }
    }
}

impl From<StoreError> for RecordError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::DuplicateKey { index } => RecordError::DuplicateKey { index },
            StoreError::Backend(e) => RecordError::Store(e),
        }
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("entity", &self.descriptor.name)
            .field("persisted", &self.persisted)
            .field("changes", &self.changes)
            .field("errors", &self.errors)
            .finish()
    }
}

/// Serializes through the default view
impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.render(None).serialize(serializer)
    }
}

//! Lifecycle hook pipeline
//!
//! Each entity registers hooks at eight fixed stages. Firing order:
//!
//! ```text
//! create: before_validate → [schema] → after_validate → before_create → before_save
//!         → [store.save]   → after_save → after_create
//! update: before_validate → [schema] → after_validate → before_update → before_save
//!         → [store.update] → after_save → after_update
//! ```
//!
//! Hooks of one stage run strictly one after another, in declaration order,
//! each awaited before the next starts. The first hook returning an error
//! aborts the pipeline and the error reaches the caller of `save`/`validate`.

use crate::core::error::RecordResult;
use crate::core::record::Record;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// The eight pipeline stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    BeforeValidate,
    AfterValidate,
    BeforeSave,
    AfterSave,
    BeforeCreate,
    AfterCreate,
    BeforeUpdate,
    AfterUpdate,
}

impl Stage {
    /// Every stage, in declaration order
    pub const ALL: [Stage; 8] = [
        Stage::BeforeValidate,
        Stage::AfterValidate,
        Stage::BeforeSave,
        Stage::AfterSave,
        Stage::BeforeCreate,
        Stage::AfterCreate,
        Stage::BeforeUpdate,
        Stage::AfterUpdate,
    ];

    /// snake_case name of the stage
    pub fn name(&self) -> &'static str {
        match self {
            Stage::BeforeValidate => "before_validate",
            Stage::AfterValidate => "after_validate",
            Stage::BeforeSave => "before_save",
            Stage::AfterSave => "after_save",
            Stage::BeforeCreate => "before_create",
            Stage::AfterCreate => "after_create",
            Stage::BeforeUpdate => "before_update",
            Stage::AfterUpdate => "after_update",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A named lifecycle callback
///
/// Hooks mutate the record through `set`/`unset`, report problems through
/// `record.errors_mut().add(..)`, or abort the pipeline by returning an error.
#[async_trait]
pub trait Hook: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Run the hook against the record
    async fn call(&self, record: &mut Record) -> RecordResult<()>;
}

/// Adapter turning a synchronous function into a [`Hook`]
pub struct FnHook<F> {
    name: &'static str,
    f: F,
}

#[async_trait]
impl<F> Hook for FnHook<F>
where
    F: Fn(&mut Record) -> RecordResult<()> + Send + Sync,
{
    fn name(&self) -> &str {
        self.name
    }

    async fn call(&self, record: &mut Record) -> RecordResult<()> {
        (self.f)(record)
    }
}

/// Wrap a synchronous function as a shareable hook
pub fn hook_fn<F>(name: &'static str, f: F) -> Arc<dyn Hook>
where
    F: Fn(&mut Record) -> RecordResult<()> + Send + Sync + 'static,
{
    Arc::new(FnHook { name, f })
}

/// Ordered hook lists for the eight stages
#[derive(Clone, Default)]
pub struct Hooks {
    stages: [Vec<Arc<dyn Hook>>; 8],
}

impl Hooks {
    /// Create an empty pipeline
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a hook to the end of a stage
    pub fn push(&mut self, stage: Stage, hook: Arc<dyn Hook>) {
        self.stages[stage.index()].push(hook);
    }

    /// Builder form of [`Hooks::push`]
    pub fn with(mut self, stage: Stage, hook: Arc<dyn Hook>) -> Self {
        self.push(stage, hook);
        self
    }

    /// Hooks registered for a stage, in firing order
    pub fn stage(&self, stage: Stage) -> &[Arc<dyn Hook>] {
        &self.stages[stage.index()]
    }

    /// Names of the hooks registered for a stage, in firing order
    pub fn names(&self, stage: Stage) -> Vec<&str> {
        self.stage(stage).iter().map(|hook| hook.name()).collect()
    }

    /// Run every hook of `stage` in order, stopping at the first error
    pub async fn run(&self, stage: Stage, record: &mut Record) -> RecordResult<()> {
        for hook in self.stage(stage) {
            tracing::debug!(
                entity = record.entity_name(),
                stage = stage.name(),
                hook = hook.name(),
                "running hook"
            );
            hook.call(record).await?;
        }
        Ok(())
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for stage in Stage::ALL {
            let names = self.names(stage);
            if !names.is_empty() {
                map.entry(&stage.name(), &names);
            }
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::descriptor::EntityDescriptor;
    use crate::core::error::RecordError;
    use crate::storage::InMemoryStore;
    use serde_json::json;

    fn push_marker(marker: &'static str) -> Arc<dyn Hook> {
        hook_fn(marker, move |record: &mut Record| {
            let mut trail = record
                .get("trail")
                .and_then(|v| v.as_array().cloned())
                .unwrap_or_default();
            trail.push(json!(marker));
            record.set("trail", json!(trail));
            Ok(())
        })
    }

    fn record() -> Record {
        let descriptor = EntityDescriptor::new("FakeModel", "fake_models");
        Record::new(
            Arc::new(descriptor),
            Arc::new(InMemoryStore::new()),
            serde_json::Map::new(),
        )
    }

    #[test]
    fn test_stage_order_and_names() {
        let names: Vec<&str> = Stage::ALL.iter().map(Stage::name).collect();
        assert_eq!(
            names,
            vec![
                "before_validate",
                "after_validate",
                "before_save",
                "after_save",
                "before_create",
                "after_create",
                "before_update",
                "after_update",
            ]
        );
    }

    #[tokio::test]
    async fn test_hooks_run_in_declaration_order() {
        let hooks = Hooks::new()
            .with(Stage::BeforeValidate, push_marker("first"))
            .with(Stage::BeforeValidate, push_marker("second"))
            .with(Stage::AfterValidate, push_marker("other stage"));

        let mut record = record();
        hooks.run(Stage::BeforeValidate, &mut record).await.unwrap();

        assert_eq!(record.get("trail"), Some(json!(["first", "second"])));
        assert_eq!(hooks.names(Stage::BeforeValidate), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_error_aborts_remaining_hooks() {
        let hooks = Hooks::new()
            .with(Stage::BeforeSave, push_marker("runs"))
            .with(
                Stage::BeforeSave,
                hook_fn("fails", |_record: &mut Record| {
                    Err(RecordError::ReadOnly {
                        entity: "FakeModel".to_string(),
                    })
                }),
            )
            .with(Stage::BeforeSave, push_marker("never"));

        let mut record = record();
        let err = hooks.run(Stage::BeforeSave, &mut record).await.unwrap_err();

        assert!(matches!(err, RecordError::ReadOnly { .. }));
        assert_eq!(record.get("trail"), Some(json!(["runs"])));
    }

    #[test]
    fn test_debug_lists_registered_stages_only() {
        let hooks = Hooks::new().with(Stage::AfterCreate, push_marker("ac"));
        assert_eq!(format!("{hooks:?}"), r#"{"after_create": ["ac"]}"#);
    }
}

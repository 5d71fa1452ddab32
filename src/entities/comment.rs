//! Comments on posts

use crate::core::{
    EntityDescriptor, Model, Record, RecordResult, Schema, Stage, Store, View, hook_fn,
};
use std::sync::Arc;

pub const ENTITY: &str = "Comment";
pub const COLLECTION: &str = "comments";

fn stamp_new(comment: &mut Record) -> RecordResult<()> {
    if comment.is_new() {
        super::set_created_at(comment)?;
    }
    Ok(())
}

fn validate_presence(comment: &mut Record) -> RecordResult<()> {
    for field in ["user_id", "text", "post_id"] {
        if !comment.present(field) {
            comment.errors_mut().add(field, "must be present");
        }
    }
    Ok(())
}

pub fn descriptor() -> EntityDescriptor {
    EntityDescriptor::new(ENTITY, COLLECTION)
        .with_schema(Schema::object([
            ("user_id", Schema::String),
            ("text", Schema::String),
            ("post_id", Schema::String),
            ("created_at", Schema::Timestamp),
        ]))
        .with_hook(Stage::BeforeValidate, hook_fn("set_created_at", stamp_new))
        .with_hook(Stage::AfterValidate, hook_fn("validate_presence", validate_presence))
        .with_view(
            "default",
            View::of(&["_id", "user_id", "text", "post_id", "created_at"]),
        )
        .read_only()
}

pub fn model(store: Arc<dyn Store>) -> Model {
    Model::new(descriptor(), store)
}

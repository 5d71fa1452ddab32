//! Friend requests, the edges of the friend graph

use crate::core::{
    EntityDescriptor, Model, Record, RecordResult, Schema, Stage, Store, UniqueIndex, View,
    hook_fn,
};
use crate::links::friends::{ACCEPTED, REQUESTED, REQUESTING};
use serde_json::Value;
use std::sync::Arc;

pub const ENTITY: &str = "FriendRequest";
pub const COLLECTION: &str = "friend_requests";

fn validate_user_ids(request: &mut Record) -> RecordResult<()> {
    for field in [REQUESTING, REQUESTED] {
        if !request.present(field) {
            request.errors_mut().add(field, "must be present");
        }
    }
    Ok(())
}

/// `accepted` is either true or null and cannot change once stored
fn validate_accepted(request: &mut Record) -> RecordResult<()> {
    let changed = request.is_changed_at(ACCEPTED);
    let stored = request
        .persisted_value(ACCEPTED)
        .is_some_and(|v| !v.is_null());
    if !stored && !changed {
        return Ok(());
    }
    if !request.is_new() && stored && changed {
        request
            .errors_mut()
            .add(ACCEPTED, "cannot be changed once set");
        return Ok(());
    }
    match request.get(ACCEPTED) {
        None | Some(Value::Null) | Some(Value::Bool(true)) => {}
        Some(_) => request.errors_mut().add(ACCEPTED, "must be true or null"),
    }
    Ok(())
}

fn reject_self_request(request: &mut Record) -> RecordResult<()> {
    let requesting = request.get_str(REQUESTING);
    if requesting.is_some() && requesting == request.get_str(REQUESTED) {
        request
            .errors_mut()
            .add(REQUESTED, "cannot be the requesting user");
    }
    Ok(())
}

/// Descriptor of the `friend_requests` collection
pub fn descriptor() -> EntityDescriptor {
    EntityDescriptor::new(ENTITY, COLLECTION)
        .with_schema(Schema::object([
            (REQUESTING, Schema::String),
            (REQUESTED, Schema::String),
            (ACCEPTED, Schema::Boolean),
        ]))
        .with_hook(
            Stage::BeforeValidate,
            hook_fn("validate_user_ids", validate_user_ids),
        )
        .with_hook(
            Stage::BeforeValidate,
            hook_fn("validate_accepted", validate_accepted),
        )
        .with_hook(
            Stage::BeforeValidate,
            hook_fn("reject_self_request", reject_self_request),
        )
        .with_view("default", View::of(&["_id", REQUESTING, REQUESTED, ACCEPTED]))
        .with_unique_index(
            UniqueIndex::compound(
                format!("{COLLECTION}.{REQUESTED}"),
                &[REQUESTING, REQUESTED],
            )
            .reported_as(
                REQUESTED,
                "must be unique within the scope of requesting_user_id",
            ),
        )
}

pub fn model(store: Arc<dyn Store>) -> Model {
    Model::new(descriptor(), store)
}

/// Mark a request as accepted and save it
pub async fn accept(request: &mut Record) -> RecordResult<()> {
    request.set(ACCEPTED, true);
    request.save().await
}

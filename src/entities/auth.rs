//! Bearer tokens issued against user credentials

use super::user::{self, PasswordHasher};
use crate::core::{
    EntityDescriptor, Filter, Hook, Model, Record, RecordError, RecordResult, Schema, Stage,
    Store, View, document, hook_fn,
};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

pub const ENTITY: &str = "Auth";
pub const COLLECTION: &str = "auths";

/// Source of candidate bearer tokens
pub trait TokenGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// 64 hex characters drawn from two random v4 UUIDs
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidTokens;

impl TokenGenerator for UuidTokens {
    fn generate(&self) -> String {
        format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
    }
}

fn validate_user_id(auth: &mut Record) -> RecordResult<()> {
    if !auth.present("user_id") {
        auth.errors_mut().add("user_id", "must be present");
    }
    Ok(())
}

/// Draws candidates until one is not stored yet
struct IssueToken {
    tokens: Arc<dyn TokenGenerator>,
}

#[async_trait]
impl Hook for IssueToken {
    fn name(&self) -> &str {
        "issue_token"
    }

    async fn call(&self, auth: &mut Record) -> RecordResult<()> {
        let store = Arc::clone(auth.store());
        let collection = auth.collection().to_string();
        loop {
            let candidate = self.tokens.generate();
            let taken = store
                .exists(&collection, &Filter::eq("token", candidate.as_str()))
                .await?;
            if !taken {
                auth.set("token", candidate);
                return Ok(());
            }
            tracing::debug!(entity = ENTITY, "token already issued, drawing another");
        }
    }
}

/// Descriptor of the read-only `auths` collection
pub fn descriptor(tokens: Arc<dyn TokenGenerator>) -> EntityDescriptor {
    EntityDescriptor::new(ENTITY, COLLECTION)
        .with_schema(Schema::object([
            ("token", Schema::String),
            ("user_id", Schema::String),
            ("created_at", Schema::Timestamp),
        ]))
        .with_hook(Stage::BeforeValidate, hook_fn("validate_user_id", validate_user_id))
        .with_hook(
            Stage::BeforeCreate,
            hook_fn("set_created_at", super::set_created_at),
        )
        .with_hook(Stage::BeforeCreate, Arc::new(IssueToken { tokens }))
        .with_view("default", View::of(&["token"]))
        .read_only()
}

pub fn model(store: Arc<dyn Store>, tokens: Arc<dyn TokenGenerator>) -> Model {
    Model::new(descriptor(tokens), store)
}

/// Issue a token for the user with `email` if `password` matches
pub async fn create_by_credentials(
    auths: &Model,
    users: &Model,
    hasher: &dyn PasswordHasher,
    email: &str,
    password: &str,
) -> RecordResult<Record> {
    let found = users.first_where(&Filter::eq("email", email)).await?;
    let authenticated = match &found {
        Some(candidate) => user::authenticate(candidate, hasher, password).await?,
        None => false,
    };

    let Some(user_id) = found
        .filter(|_| authenticated)
        .and_then(|u| u.id().map(str::to_owned))
    else {
        tracing::debug!(entity = ENTITY, "rejected credentials");
        return Err(RecordError::invalid(ENTITY, "credentials", "are not valid"));
    };

    auths.create(document(json!({ "user_id": user_id }))).await
}

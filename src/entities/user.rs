//! Users: credentials, profile and post visibility

use crate::core::{
    EntityDescriptor, Hook, Model, Record, RecordError, RecordResult, Schema, Stage, Store,
    UniqueIndex, View, hook_fn,
};
use crate::links::FriendGraph;
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::sync::{Arc, OnceLock};
use validator::ValidateEmail;

pub const ENTITY: &str = "User";
pub const COLLECTION: &str = "users";

const NAME_MAX: usize = 22;
const TEXT_MAX: usize = 200;
const PASSWORD_MIN: usize = 6;

/// External password hashing collaborator
#[async_trait]
pub trait PasswordHasher: Send + Sync {
    async fn hash(&self, password: &str) -> anyhow::Result<String>;
    async fn verify(&self, password: &str, hash: &str) -> anyhow::Result<bool>;
}

fn validate_email(user: &mut Record) -> RecordResult<()> {
    if !user.is_new() && !user.is_changed_at("email") {
        return Ok(());
    }
    let email = user.get_str("email").unwrap_or_default();
    if !email.validate_email() {
        user.errors_mut().add("email", "must be a valid email address");
    }
    Ok(())
}

fn disallowed_name_chars() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new("[^0-9A-Za-z_]").ok())
        .as_ref()
}

fn validate_name(user: &mut Record) -> RecordResult<()> {
    let Some(name) = user.get_str("name").filter(|n| !n.is_empty()) else {
        user.errors_mut().add("name", "must be present");
        return Ok(());
    };
    if name.chars().count() > NAME_MAX {
        user.errors_mut()
            .add("name", format!("must be {NAME_MAX} characters or fewer"));
    }
    if disallowed_name_chars().is_some_and(|re| re.is_match(&name)) {
        user.errors_mut()
            .add("name", "may contain only alphanumeric characters and _");
    }
    Ok(())
}

/// Replaces a plaintext `password` with its `password_hash`
///
/// A password that is too short stays in place so that validating again
/// reports the same error.
struct TransformPassword {
    hasher: Arc<dyn PasswordHasher>,
}

#[async_trait]
impl Hook for TransformPassword {
    fn name(&self) -> &str {
        "transform_password"
    }

    async fn call(&self, user: &mut Record) -> RecordResult<()> {
        match user.get("password") {
            Some(Value::String(password)) if !password.is_empty() => {
                if password.chars().count() < PASSWORD_MIN {
                    user.errors_mut().add(
                        "password",
                        format!("must be at least {PASSWORD_MIN} characters"),
                    );
                    return Ok(());
                }
                let hash = self
                    .hasher
                    .hash(&password)
                    .await
                    .map_err(RecordError::Hook)?;
                user.unset("password");
                user.set("password_hash", hash);
            }
            None | Some(Value::Null) | Some(Value::String(_)) => {
                user.unset("password");
                if user.is_new() && !user.present("password_hash") {
                    user.errors_mut()
                        .add("password", "must be present for new users");
                }
            }
            // left for the schema check to report
            Some(_) => {}
        }
        Ok(())
    }
}

fn validate_password_hash(user: &mut Record) -> RecordResult<()> {
    if !user.present("password_hash") {
        user.errors_mut().add("password_hash", "must be present");
    }
    Ok(())
}

fn validate_bio(user: &mut Record) -> RecordResult<()> {
    if user
        .get_str("bio")
        .is_some_and(|bio| bio.chars().count() > TEXT_MAX)
    {
        user.errors_mut()
            .add("bio", format!("must be {TEXT_MAX} characters or fewer"));
    }
    Ok(())
}

fn validate_display_name(user: &mut Record) -> RecordResult<()> {
    if !user.present("display_name")
        && let Some(name) = user.get("name")
    {
        user.set("display_name", name);
    }
    match user.get_str("display_name") {
        Some(display_name) if !display_name.is_empty() => {
            if display_name.chars().count() > TEXT_MAX {
                user.errors_mut().add(
                    "display_name",
                    format!("must be {TEXT_MAX} characters or fewer"),
                );
            }
        }
        _ => user
            .errors_mut()
            .add("display_name", "must be at least 1 character"),
    }
    Ok(())
}

fn validate_visibility(user: &mut Record, field: &str, default: i64) {
    let value = user.get(field);
    if user.is_new() && value.as_ref().is_none_or(Value::is_null) {
        user.set(field, default);
        return;
    }
    if !matches!(value.as_ref().and_then(Value::as_i64), Some(0 | 1)) {
        user.errors_mut().add(field, "must be 1 or 0");
    }
}

fn validate_posts_viewable_by(user: &mut Record) -> RecordResult<()> {
    validate_visibility(user, "posts_viewable_by", 1);
    Ok(())
}

fn validate_old_posts_viewable_by(user: &mut Record) -> RecordResult<()> {
    validate_visibility(user, "old_posts_viewable_by", 0);
    Ok(())
}

/// Descriptor of the `users` collection
pub fn descriptor(hasher: Arc<dyn PasswordHasher>) -> EntityDescriptor {
    EntityDescriptor::new(ENTITY, COLLECTION)
        .with_schema(Schema::object([
            ("name", Schema::String),
            ("email", Schema::String),
            ("password", Schema::String),
            ("password_hash", Schema::String),
            ("avatar_url", Schema::String),
            ("bio", Schema::String),
            ("display_name", Schema::String),
            ("posts_viewable_by", Schema::Number),
            ("old_posts_viewable_by", Schema::Number),
        ]))
        .with_hook(Stage::BeforeValidate, hook_fn("validate_email", validate_email))
        .with_hook(Stage::BeforeValidate, hook_fn("validate_name", validate_name))
        .with_hook(Stage::BeforeValidate, Arc::new(TransformPassword { hasher }))
        .with_hook(
            Stage::BeforeValidate,
            hook_fn("validate_password_hash", validate_password_hash),
        )
        .with_hook(Stage::BeforeValidate, hook_fn("validate_bio", validate_bio))
        .with_hook(
            Stage::BeforeValidate,
            hook_fn("validate_display_name", validate_display_name),
        )
        .with_hook(
            Stage::BeforeValidate,
            hook_fn("validate_posts_viewable_by", validate_posts_viewable_by),
        )
        .with_hook(
            Stage::BeforeValidate,
            hook_fn("validate_old_posts_viewable_by", validate_old_posts_viewable_by),
        )
        .with_view(
            "default",
            View::of(&["_id", "name", "email", "avatar_url", "bio", "display_name"]),
        )
        .with_view(
            "public",
            View::of(&["_id", "name", "display_name", "avatar_url"]),
        )
        .with_unique_index(UniqueIndex::on(COLLECTION, "name"))
        .with_unique_index(UniqueIndex::on(COLLECTION, "email"))
}

/// Model over the `users` collection
pub fn model(store: Arc<dyn Store>, hasher: Arc<dyn PasswordHasher>) -> Model {
    Model::new(descriptor(hasher), store)
}

/// Check a plaintext password against the stored hash. Transient users
/// never authenticate.
pub async fn authenticate(
    user: &Record,
    hasher: &dyn PasswordHasher,
    password: &str,
) -> RecordResult<bool> {
    if !user.is_persisted() {
        return Ok(false);
    }
    let Some(hash) = user.get_str("password_hash") else {
        return Ok(false);
    };
    hasher
        .verify(password, &hash)
        .await
        .map_err(RecordError::Hook)
}

/// Whether `viewer_id` may see the posts of `user`: friends only when
/// `posts_viewable_by` is 0, friends of friends otherwise
pub async fn visible_to(user: &Record, graph: &FriendGraph, viewer_id: &str) -> RecordResult<bool> {
    let Some(id) = user.id() else {
        return Ok(false);
    };
    if user.get("posts_viewable_by").and_then(|v| v.as_i64()) == Some(0) {
        graph.are_friends(id, viewer_id).await
    } else {
        graph.friends_of_friends(id, viewer_id).await
    }
}

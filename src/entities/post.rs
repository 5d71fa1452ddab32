//! Posts: create-only bodies with appendable comments and likes

use crate::core::{
    EntityDescriptor, Filter, FindOptions, Model, Record, RecordError, RecordResult, Schema,
    Sort, Stage, Store, View, hook_fn,
};
use serde_json::{Value, json};
use std::sync::Arc;

pub const ENTITY: &str = "Post";
pub const COLLECTION: &str = "posts";

/// Posts per feed page
pub const FEED_PAGE_SIZE: usize = 5;

fn validate_user_id(post: &mut Record) -> RecordResult<()> {
    if !post.present("user_id") {
        post.errors_mut().add("user_id", "must be present");
    }
    Ok(())
}

fn non_empty_str(comment: &Value, key: &str) -> bool {
    comment
        .get(key)
        .and_then(Value::as_str)
        .is_some_and(|s| !s.is_empty())
}

/// Comments written since the last save carry a string `user_id`, a string
/// `text` and nothing else
fn validate_comments(post: &mut Record) -> RecordResult<()> {
    let Some(Value::Array(comments)) = post.changes().get("comments") else {
        return Ok(());
    };
    for comment in &comments {
        if !non_empty_str(comment, "user_id") {
            post.errors_mut().add("comments", "must have a user_id");
        }
        if !non_empty_str(comment, "text") {
            post.errors_mut().add("comments", "must have a valid text field");
        }
        if comment.as_object().is_some_and(|c| c.len() > 2) {
            post.errors_mut()
                .add("comments", "must contain only user_id and text attributes");
        }
    }
    Ok(())
}

fn validate_body(post: &mut Record) -> RecordResult<()> {
    if post.errors().contains("body") {
        return Ok(());
    }
    match post.get("body") {
        None | Some(Value::Null) if post.is_new() => {
            post.errors_mut().add("body", "must be present");
        }
        Some(Value::Array(modules)) => {
            let malformed = modules.iter().any(|module| !non_empty_str(module, "type"));
            if malformed {
                post.errors_mut()
                    .add("body", "modules must all be objects containing a type member");
            }
        }
        _ => {}
    }
    Ok(())
}

/// Descriptor of the read-only `posts` collection
pub fn descriptor() -> EntityDescriptor {
    EntityDescriptor::new(ENTITY, COLLECTION)
        .with_schema(Schema::object([
            ("user_id", Schema::String),
            ("body", Schema::Array),
            ("created_at", Schema::Timestamp),
            ("like_count", Schema::Number),
            ("comments", Schema::Array),
        ]))
        .with_hook(Stage::BeforeValidate, hook_fn("validate_user_id", validate_user_id))
        .with_hook(Stage::BeforeValidate, hook_fn("validate_comments", validate_comments))
        .with_hook(Stage::AfterValidate, hook_fn("validate_body", validate_body))
        .with_hook(Stage::BeforeCreate, hook_fn("set_created_at", super::set_created_at))
        .with_view(
            "default",
            View::of(&["body", "created_at", "user_id", "_id", "comments", "like_count"]),
        )
        .read_only()
}

pub fn model(store: Arc<dyn Store>) -> Model {
    Model::new(descriptor(), store)
}

/// Append a comment and save, bypassing read-only protection
pub async fn add_comment(post: &mut Record, user_id: &str, text: &str) -> RecordResult<()> {
    let mut comments = match post.get("comments") {
        Some(Value::Array(comments)) => comments,
        _ => Vec::new(),
    };
    comments.push(json!({ "user_id": user_id, "text": text }));
    post.set("comments", comments);
    post.save_overriding_protection().await
}

/// Increment `like_count`, saving persisted posts, and return the new count
pub async fn increment_like_count(post: &mut Record) -> RecordResult<i64> {
    let count = post
        .get("like_count")
        .and_then(|v| v.as_i64())
        .unwrap_or(0)
        + 1;
    post.set("like_count", count);
    if post.is_persisted() {
        post.save_overriding_protection().await?;
    }
    Ok(count)
}

/// One page of a user's posts, newest first
#[derive(Debug, Clone)]
pub struct Feed {
    pub posts: Vec<Record>,
    pub page: usize,
    pub next_page: Option<usize>,
    pub prev_page: Option<usize>,
    /// Normalized lower bound on `created_at`, when one was given
    pub after: Option<String>,
}

fn normalize_timestamp(after: &str) -> RecordResult<String> {
    chrono::DateTime::parse_from_rfc3339(after)
        .map(|at| super::format_timestamp(at.with_timezone(&chrono::Utc)))
        .map_err(|_| RecordError::invalid(ENTITY, "after", "must be a timestamp"))
}

/// Load page `page` (1-based) of the posts by `user_id`, newest first,
/// optionally restricted to posts created at or after `after`.
///
/// A page past the end fails with `NotFound` unless it is the first page.
pub async fn feed(
    posts: &Model,
    user_id: &str,
    after: Option<&str>,
    page: usize,
) -> RecordResult<Feed> {
    let page = page.max(1);
    let after = after.map(normalize_timestamp).transpose()?;

    let mut filter = Filter::eq("user_id", user_id);
    if let Some(after) = &after {
        filter = Filter::and([filter, Filter::gte("created_at", after.as_str())]);
    }
    let options = FindOptions::new()
        .limit(FEED_PAGE_SIZE)
        .page(page)
        .sort(Sort::desc("created_at"));

    let found = posts.find_where(&filter, &options).await?;
    if found.records.is_empty() && page != 1 {
        return Err(RecordError::NotFound {
            entity: ENTITY.to_string(),
            query: json!({ "user_id": user_id, "page": page }),
        });
    }
    tracing::debug!(user_id, page, count = found.records.len(), "loaded feed");

    Ok(Feed {
        posts: found.records,
        page,
        next_page: found.has_next_page.then(|| page + 1),
        prev_page: (page > 1).then(|| page - 1),
        after,
    })
}

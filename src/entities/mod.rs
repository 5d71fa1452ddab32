//! Domain entities of the social network
//!
//! Each entity module exposes its `descriptor`, a `model` constructor bound
//! to a store, and the domain helpers that operate on its records.

pub mod auth;
pub mod comment;
pub mod friend_request;
pub mod post;
pub mod user;

pub use auth::{TokenGenerator, UuidTokens};
pub use user::PasswordHasher;

use crate::core::{Model, Record, RecordResult, Store};
use crate::links::FriendGraph;
use std::sync::Arc;

/// Fixed-width UTC RFC 3339, so timestamps sort lexically in time order
pub(crate) fn format_timestamp(at: chrono::DateTime<chrono::Utc>) -> String {
    at.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// Stamp `created_at` with the current time
pub(crate) fn set_created_at(record: &mut Record) -> RecordResult<()> {
    record.set("created_at", format_timestamp(chrono::Utc::now()));
    Ok(())
}

/// Every entity model sharing one store, plus the friend graph
#[derive(Clone)]
pub struct Entities {
    pub users: Model,
    pub friend_requests: Model,
    pub posts: Model,
    pub comments: Model,
    pub auths: Model,
    pub friends: FriendGraph,
    hasher: Arc<dyn PasswordHasher>,
}

impl Entities {
    pub fn new(
        store: Arc<dyn Store>,
        hasher: Arc<dyn PasswordHasher>,
        tokens: Arc<dyn TokenGenerator>,
    ) -> Self {
        let friend_requests = friend_request::model(Arc::clone(&store));
        Self {
            users: user::model(Arc::clone(&store), Arc::clone(&hasher)),
            friends: FriendGraph::new(friend_requests.clone()),
            friend_requests,
            posts: post::model(Arc::clone(&store)),
            comments: comment::model(Arc::clone(&store)),
            auths: auth::model(store, tokens),
            hasher,
        }
    }

    /// Install the unique indexes of every entity
    pub async fn ensure_indexes(&self) -> RecordResult<()> {
        for model in [
            &self.users,
            &self.friend_requests,
            &self.posts,
            &self.comments,
            &self.auths,
        ] {
            model.ensure_indexes().await?;
        }
        Ok(())
    }

    /// Issue a bearer token for valid credentials
    pub async fn sign_in(&self, email: &str, password: &str) -> RecordResult<Record> {
        auth::create_by_credentials(
            &self.auths,
            &self.users,
            self.hasher.as_ref(),
            email,
            password,
        )
        .await
    }

    /// Whether `viewer_id` may see the posts of `user`
    pub async fn posts_visible_to(&self, user: &Record, viewer_id: &str) -> RecordResult<bool> {
        user::visible_to(user, &self.friends, viewer_id).await
    }
}

impl std::fmt::Debug for Entities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entities")
            .field("users", &self.users)
            .field("friend_requests", &self.friend_requests)
            .field("posts", &self.posts)
            .field("comments", &self.comments)
            .field("auths", &self.auths)
            .finish_non_exhaustive()
    }
}

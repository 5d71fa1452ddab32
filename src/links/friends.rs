//! Friend-graph queries over accepted friend requests
//!
//! Every accepted `FriendRequest` is an undirected edge between its
//! `requesting_user_id` and `requested_user_id`.

use crate::core::error::RecordResult;
use crate::core::model::Model;
use crate::core::query::{Filter, FindOptions};
use crate::core::record::Record;
use indexmap::IndexSet;
use serde_json::Value;

pub const REQUESTING: &str = "requesting_user_id";
pub const REQUESTED: &str = "requested_user_id";
pub const ACCEPTED: &str = "accepted";

/// Read-only traversal of the accepted-edge collection
#[derive(Debug, Clone)]
pub struct FriendGraph {
    requests: Model,
}

impl FriendGraph {
    /// Query the friend requests managed by `requests`
    pub fn new(requests: Model) -> Self {
        Self { requests }
    }

    /// Accepted edge between exactly `a` and `b`, in either direction
    fn edge(a: &str, b: &str) -> Filter {
        Filter::and([
            Filter::or([
                Filter::and([Filter::eq(REQUESTING, a), Filter::eq(REQUESTED, b)]),
                Filter::and([Filter::eq(REQUESTING, b), Filter::eq(REQUESTED, a)]),
            ]),
            Filter::eq(ACCEPTED, true),
        ])
    }

    /// True iff an accepted request exists between `a` and `b`
    pub async fn are_friends(&self, a: &str, b: &str) -> RecordResult<bool> {
        let friends = self.requests.exists(&Self::edge(a, b)).await?;
        tracing::debug!(a = %a, b = %b, friends, "checked friendship");
        Ok(friends)
    }

    /// Counterparts of every accepted edge touching `user_id`, without
    /// duplicates and without `user_id` itself, in discovery order
    pub async fn friend_ids(&self, user_id: &str) -> RecordResult<IndexSet<String>> {
        let filter = Filter::and([
            Filter::or([Filter::eq(REQUESTING, user_id), Filter::eq(REQUESTED, user_id)]),
            Filter::eq(ACCEPTED, true),
        ]);
        let page = self.requests.find_where(&filter, &FindOptions::new()).await?;

        let mut ids = IndexSet::new();
        for edge in &page.records {
            for key in [REQUESTING, REQUESTED] {
                if let Some(Value::String(id)) = edge.get(key)
                    && id != user_id
                {
                    ids.insert(id);
                }
            }
        }
        Ok(ids)
    }

    /// True if `a` and `b` are friends or share at least one friend
    pub async fn friends_of_friends(&self, a: &str, b: &str) -> RecordResult<bool> {
        if self.are_friends(a, b).await? {
            return Ok(true);
        }

        let friends_of_a = self.friend_ids(a).await?;
        if friends_of_a.is_empty() {
            return Ok(false);
        }
        let friends_of_b = self.friend_ids(b).await?;

        let (smaller, larger) = if friends_of_a.len() <= friends_of_b.len() {
            (&friends_of_a, &friends_of_b)
        } else {
            (&friends_of_b, &friends_of_a)
        };
        Ok(smaller.iter().any(|id| larger.contains(id)))
    }

    /// Requests addressed to `user_id` that have not been accepted yet
    pub async fn pending_requests(&self, user_id: &str) -> RecordResult<Vec<Record>> {
        let filter = Filter::and([
            Filter::eq(REQUESTED, user_id),
            Filter::Eq(ACCEPTED.to_string(), Value::Null),
        ]);
        let page = self.requests.find_where(&filter, &FindOptions::new()).await?;
        Ok(page.records)
    }
}

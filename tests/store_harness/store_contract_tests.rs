//! Macro-generated test suite for `Store` contract validation.
//!
//! # Generated Tests
//!
//! ## Documents
//! - `test_save_assigns_identity`: save returns the document with a string `_id`
//! - `test_find_by_identity` / `test_find_unknown_identity`
//! - `test_update_sets_dotted_paths`: `$set` semantics keep siblings
//! - `test_update_unknown_identity`: zero matched
//! - `test_empty_update_reports_match`: a no-op update of an existing row matches it
//! - `test_delete_reports_count`
//!
//! ## Queries
//! - `test_find_where_combinators`: Eq / In / And / Or
//! - `test_null_matches_missing_field`
//! - `test_pagination_and_sort`
//! - `test_zero_limit_returns_everything`
//! - `test_range_filters`
//! - `test_exists`
//!
//! ## Unique indexes
//! - `test_unique_index_on_save` / `test_unique_index_on_update`
//! - `test_compound_unique_index`
//!
//! ## Concurrency
//! - `test_concurrent_saves`: parallel saves from spawned tasks

/// Generate a full `Store` conformance test suite.
///
/// `$factory` must evaluate to a fresh, empty store implementing
/// `Store + Clone + 'static`. It is re-evaluated for each test.
#[macro_export]
macro_rules! store_contract_tests {
    ($factory:expr) => {
        mod store_contract {
            use super::*;
            use kinship::core::{Filter, FindOptions, Sort, Store, StoreError, UniqueIndex};
            use serde_json::json;

            // ==================================================================
            // Documents
            // ==================================================================

            #[tokio::test]
            async fn test_save_assigns_identity() {
                let store = $factory;
                let stored = store
                    .save(COLLECTION, doc(json!({"name": "wow", "options": {"hey": "now"}})))
                    .await
                    .unwrap();

                assert!(!id_of(&stored).is_empty());
                assert_eq!(stored["name"], json!("wow"));
                assert_eq!(stored["options"], json!({"hey": "now"}));
            }

            #[tokio::test]
            async fn test_find_by_identity() {
                let store = $factory;
                let id = insert(&store, COLLECTION, json!({"name": "wow", "n": 3})).await;

                let found = store.find(COLLECTION, &id).await.unwrap().unwrap();
                assert_eq!(id_of(&found), id);
                assert_eq!(found["name"], json!("wow"));
                assert_eq!(found["n"], json!(3));
            }

            #[tokio::test]
            async fn test_find_unknown_identity() {
                let store = $factory;
                assert!(store.find(COLLECTION, UNKNOWN_ID).await.unwrap().is_none());
                assert!(store.find(COLLECTION, "not-an-id").await.unwrap().is_none());
            }

            #[tokio::test]
            async fn test_update_sets_dotted_paths() {
                let store = $factory;
                let id = insert(
                    &store,
                    COLLECTION,
                    json!({"name": "wow", "options": {"hey": "a", "now": "b"}}),
                )
                .await;

                let matched = store
                    .update(COLLECTION, &id, doc(json!({"options.hey": "z", "name": "then"})))
                    .await
                    .unwrap();
                assert_eq!(matched, 1);

                let found = store.find(COLLECTION, &id).await.unwrap().unwrap();
                assert_eq!(found["name"], json!("then"));
                assert_eq!(found["options"], json!({"hey": "z", "now": "b"}));
            }

            #[tokio::test]
            async fn test_update_unknown_identity() {
                let store = $factory;
                let matched = store
                    .update(COLLECTION, UNKNOWN_ID, doc(json!({"name": "x"})))
                    .await
                    .unwrap();
                assert_eq!(matched, 0);
            }

            #[tokio::test]
            async fn test_empty_update_reports_match() {
                let store = $factory;
                let id = insert(&store, COLLECTION, json!({"name": "wow"})).await;
                let matched = store.update(COLLECTION, &id, doc(json!({}))).await.unwrap();
                assert_eq!(matched, 1);
            }

            #[tokio::test]
            async fn test_delete_reports_count() {
                let store = $factory;
                let id = insert(&store, COLLECTION, json!({"name": "wow"})).await;

                assert_eq!(store.delete(COLLECTION, &id).await.unwrap(), 1);
                assert_eq!(store.delete(COLLECTION, &id).await.unwrap(), 0);
                assert!(store.find(COLLECTION, &id).await.unwrap().is_none());
            }

            // ==================================================================
            // Queries
            // ==================================================================

            #[tokio::test]
            async fn test_find_where_combinators() {
                let store = $factory;
                for (a, b) in [("1", "2"), ("2", "3"), ("3", "1"), ("4", "5")] {
                    insert(&store, COLLECTION, json!({"from": a, "to": b})).await;
                }
                let all = FindOptions::new();

                let page = store
                    .find_where(COLLECTION, &Filter::eq("from", "1"), &all)
                    .await
                    .unwrap();
                assert_eq!(sorted_values(&page.records, "to"), vec!["2"]);

                let page = store
                    .find_where(COLLECTION, &Filter::any_of("from", ["1", "4"]), &all)
                    .await
                    .unwrap();
                assert_eq!(sorted_values(&page.records, "to"), vec!["2", "5"]);

                let touching_one = Filter::or([Filter::eq("from", "1"), Filter::eq("to", "1")]);
                let page = store
                    .find_where(COLLECTION, &touching_one, &all)
                    .await
                    .unwrap();
                assert_eq!(sorted_values(&page.records, "from"), vec!["1", "3"]);

                let exact = Filter::and([Filter::eq("from", "2"), Filter::eq("to", "3")]);
                let page = store.find_where(COLLECTION, &exact, &all).await.unwrap();
                assert_eq!(page.records.len(), 1);
                assert!(!page.has_next_page);
            }

            #[tokio::test]
            async fn test_null_matches_missing_field() {
                let store = $factory;
                insert(&store, COLLECTION, json!({"name": "pending"})).await;
                insert(&store, COLLECTION, json!({"name": "accepted", "accepted": true})).await;

                let filter = Filter::Eq("accepted".to_string(), serde_json::Value::Null);
                let page = store
                    .find_where(COLLECTION, &filter, &FindOptions::new())
                    .await
                    .unwrap();
                assert_eq!(sorted_values(&page.records, "name"), vec!["pending"]);
            }

            #[tokio::test]
            async fn test_pagination_and_sort() {
                let store = $factory;
                for n in [4, 1, 5, 2, 3] {
                    insert(&store, COLLECTION, json!({"n": n})).await;
                }

                let options = FindOptions::new().limit(2).sort(Sort::asc("n"));
                let first = store
                    .find_where(COLLECTION, &Filter::All, &options)
                    .await
                    .unwrap();
                let values: Vec<_> = first.records.iter().map(|d| d["n"].clone()).collect();
                assert_eq!(values, vec![json!(1), json!(2)]);
                assert!(first.has_next_page);

                let last = store
                    .find_where(COLLECTION, &Filter::All, &options.clone().page(3))
                    .await
                    .unwrap();
                let values: Vec<_> = last.records.iter().map(|d| d["n"].clone()).collect();
                assert_eq!(values, vec![json!(5)]);
                assert!(!last.has_next_page);

                let descending = FindOptions::new().limit(1).sort(Sort::desc("n"));
                let top = store
                    .find_where(COLLECTION, &Filter::All, &descending)
                    .await
                    .unwrap();
                assert_eq!(top.records[0]["n"], json!(5));
            }

            #[tokio::test]
            async fn test_zero_limit_returns_everything() {
                let store = $factory;
                for n in [1, 2, 3] {
                    insert(&store, COLLECTION, json!({"n": n})).await;
                }

                let page = store
                    .find_where(COLLECTION, &Filter::All, &FindOptions::new().limit(0).page(2))
                    .await
                    .unwrap();
                assert_eq!(page.records.len(), 3);
                assert!(!page.has_next_page);
            }

            #[tokio::test]
            async fn test_range_filters() {
                let store = $factory;
                for (name, at) in [("a", "2024-03-01"), ("b", "2024-03-05"), ("c", "2024-03-09")] {
                    insert(&store, COLLECTION, json!({"name": name, "at": at})).await;
                }
                insert(&store, COLLECTION, json!({"name": "n", "at": 7})).await;
                let all = FindOptions::new();

                let page = store
                    .find_where(COLLECTION, &Filter::gte("at", "2024-03-05"), &all)
                    .await
                    .unwrap();
                assert_eq!(sorted_values(&page.records, "name"), vec!["b", "c"]);

                let window = Filter::and([
                    Filter::gte("at", "2024-03-02"),
                    Filter::lte("at", "2024-03-05"),
                ]);
                let page = store.find_where(COLLECTION, &window, &all).await.unwrap();
                assert_eq!(sorted_values(&page.records, "name"), vec!["b"]);
            }

            #[tokio::test]
            async fn test_exists() {
                let store = $factory;
                assert!(!store.exists(COLLECTION, &Filter::All).await.unwrap());

                insert(&store, COLLECTION, json!({"token": "abc"})).await;
                assert!(store.exists(COLLECTION, &Filter::eq("token", "abc")).await.unwrap());
                assert!(!store.exists(COLLECTION, &Filter::eq("token", "xyz")).await.unwrap());
            }

            // ==================================================================
            // Unique indexes
            // ==================================================================

            #[tokio::test]
            async fn test_unique_index_on_save() {
                let store = $factory;
                let index = UniqueIndex::on(COLLECTION, "email");
                store.ensure_unique_index(COLLECTION, &index).await.unwrap();
                store.ensure_unique_index(COLLECTION, &index).await.unwrap();

                insert(&store, COLLECTION, json!({"email": "a@b.co"})).await;
                let err = store
                    .save(COLLECTION, doc(json!({"email": "a@b.co"})))
                    .await
                    .unwrap_err();
                match err {
                    StoreError::DuplicateKey { index } => {
                        assert_eq!(index, format!("{COLLECTION}.email"))
                    }
                    other => panic!("expected DuplicateKey, got {other:?}"),
                }

                insert(&store, COLLECTION, json!({"email": "c@d.co"})).await;
            }

            #[tokio::test]
            async fn test_unique_index_on_update() {
                let store = $factory;
                let index = UniqueIndex::on(COLLECTION, "name");
                store.ensure_unique_index(COLLECTION, &index).await.unwrap();

                insert(&store, COLLECTION, json!({"name": "taken"})).await;
                let id = insert(&store, COLLECTION, json!({"name": "free"})).await;

                let err = store
                    .update(COLLECTION, &id, doc(json!({"name": "taken"})))
                    .await
                    .unwrap_err();
                assert!(matches!(err, StoreError::DuplicateKey { .. }));

                let found = store.find(COLLECTION, &id).await.unwrap().unwrap();
                assert_eq!(found["name"], json!("free"));
            }

            #[tokio::test]
            async fn test_compound_unique_index() {
                let store = $factory;
                let index = UniqueIndex::compound("pair", &["from", "to"]);
                store.ensure_unique_index(COLLECTION, &index).await.unwrap();

                insert(&store, COLLECTION, json!({"from": "1", "to": "2"})).await;
                insert(&store, COLLECTION, json!({"from": "2", "to": "1"})).await;
                let err = store
                    .save(COLLECTION, doc(json!({"from": "1", "to": "2"})))
                    .await
                    .unwrap_err();
                assert!(matches!(err, StoreError::DuplicateKey { index } if index == "pair"));
            }

            // ==================================================================
            // Concurrency
            // ==================================================================

            #[tokio::test]
            async fn test_concurrent_saves() {
                let store = $factory;
                let mut handles = Vec::new();
                for i in 0..10 {
                    let store = store.clone();
                    handles.push(tokio::spawn(async move {
                        insert(&store, COLLECTION, json!({"i": i})).await
                    }));
                }

                let mut ids = Vec::new();
                for handle in handles {
                    ids.push(handle.await.unwrap());
                }
                ids.sort();
                ids.dedup();
                assert_eq!(ids.len(), 10);

                let page = store
                    .find_where(COLLECTION, &Filter::All, &FindOptions::new())
                    .await
                    .unwrap();
                assert_eq!(page.records.len(), 10);
            }
        }
    };
}

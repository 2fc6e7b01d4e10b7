//! Runs against a live MongoDB when `MONGODB_TEST_URI` is set, e.g.
//! `MONGODB_TEST_URI=mongodb://localhost:27017 cargo test --test repository_integration_tests`.
//! Without it every test returns early.

use member_service::{
    MemberRepository, MongoGateway, MongoMemberRepository, MongoSettings,
    models::{MemberPayload, UpsertOutcome},
    repository::replacement_fields,
};
use mongodb::bson::{Bson, doc};
use serde_json::json;
use std::{sync::Arc, time::Duration};

struct TestStore {
    gateway: Arc<MongoGateway>,
    repo: Arc<MongoMemberRepository>,
}

async fn test_store(collection: &str) -> Option<TestStore> {
    let uri = std::env::var("MONGODB_TEST_URI").ok()?;
    let gateway = Arc::new(MongoGateway::new(MongoSettings {
        uri,
        database: "member_service_tests".to_string(),
        collection: collection.to_string(),
        server_selection_timeout: Duration::from_secs(5),
        connect_timeout: Duration::from_secs(5),
        max_pool_size: 10,
    }));
    let repo = Arc::new(MongoMemberRepository::new(gateway.clone()));
    repo.delete_all_members()
        .await
        .expect("Failed to reset the test collection");
    Some(TestStore { gateway, repo })
}

fn payload(user_id: &str, roles: Option<Vec<&str>>, nickname: Option<&str>) -> MemberPayload {
    MemberPayload {
        user_id: user_id.to_string(),
        roles: roles.map(|roles| roles.into_iter().map(String::from).collect()),
        nickname: nickname.map(|n| json!(n)),
    }
}

// --- Document Mapping (no server needed) ---

#[test]
fn test_replacement_fields_write_null_for_unsubmitted_fields() {
    let fields = replacement_fields(&payload("5", None, None));

    assert_eq!(fields, doc! { "roles": Bson::Null, "nickname": Bson::Null });
}

#[test]
fn test_replacement_fields_keep_roles_and_string_nickname() {
    let fields = replacement_fields(&payload("5", Some(vec!["10", "20"]), Some("ada")));

    assert_eq!(fields, doc! { "roles": ["10", "20"], "nickname": "ada" });
}

#[test]
fn test_nickname_beyond_i64_is_stored_as_double() {
    let member = MemberPayload {
        user_id: "5".to_string(),
        roles: None,
        nickname: Some(json!(u64::MAX)),
    };

    let fields = replacement_fields(&member);

    assert_eq!(fields.get("nickname"), Some(&Bson::Double(u64::MAX as f64)));
}

#[test]
fn test_nested_nickname_is_converted_recursively() {
    let member = MemberPayload {
        user_id: "5".to_string(),
        roles: None,
        nickname: Some(json!({
            "display": "ada",
            "scores": [1, 4_000_000_000_i64, u64::MAX, 1.5],
            "flags": { "verified": true, "note": null }
        })),
    };

    let fields = replacement_fields(&member);

    let expected = doc! {
        "display": "ada",
        "scores": [
            Bson::Int32(1),
            Bson::Int64(4_000_000_000),
            Bson::Double(u64::MAX as f64),
            Bson::Double(1.5)
        ],
        "flags": { "verified": true, "note": Bson::Null }
    };
    assert_eq!(fields.get("nickname"), Some(&Bson::Document(expected)));
}

// --- Live Store ---

#[tokio::test]
async fn test_upsert_find_and_replace() {
    let Some(store) = test_store("members_upsert").await else {
        return;
    };

    let outcome = store
        .repo
        .upsert_member(&payload("100", Some(vec!["1", "2"]), Some("ada")))
        .await
        .unwrap();
    assert_eq!(outcome, UpsertOutcome::Created);

    let found = store.repo.find_member("100").await.unwrap().unwrap();
    assert_eq!(found.roles, Some(vec!["1".to_string(), "2".to_string()]));
    assert_eq!(found.nickname, Some(json!("ada")));

    let outcome = store
        .repo
        .upsert_member(&payload("100", None, Some("grace")))
        .await
        .unwrap();
    assert_eq!(outcome, UpsertOutcome::Updated);

    let found = store.repo.find_member("100").await.unwrap().unwrap();
    assert_eq!(found.roles, None);
    assert_eq!(found.nickname, Some(json!("grace")));

    store.gateway.release().await;
}

#[tokio::test]
async fn test_unique_index_exists_after_connect() {
    let Some(store) = test_store("members_index").await else {
        return;
    };

    let members = store.gateway.collection().await.unwrap();
    let names = members.list_index_names().await.unwrap();
    assert!(names.iter().any(|name| name == "user_id_1"));

    // Reconnecting finds the existing index and leaves it alone.
    store.gateway.release().await;
    assert!(!store.gateway.is_connected());
    store.gateway.collection().await.unwrap();
    assert!(store.gateway.is_connected());

    store.gateway.release().await;
}

#[tokio::test]
async fn test_concurrent_upserts_keep_one_document() {
    let Some(store) = test_store("members_race").await else {
        return;
    };

    let writers: Vec<_> = (0..12)
        .map(|n| {
            let repo = store.repo.clone();
            tokio::spawn(async move {
                let nickname = format!("writer-{n}");
                repo.upsert_member(&payload("777", None, Some(nickname.as_str())))
                    .await
            })
        })
        .collect();

    for writer in writers {
        // A lost race may surface as a duplicate-key error; never as two documents.
        if let Err(e) = writer.await.unwrap() {
            assert!(e.is_duplicate_key(), "unexpected error: {e}");
        }
    }

    let all = store.repo.list_members().await.unwrap();
    assert_eq!(all.iter().filter(|m| m.user_id == "777").count(), 1);

    store.gateway.release().await;
}

#[tokio::test]
async fn test_delete_one_and_all() {
    let Some(store) = test_store("members_delete").await else {
        return;
    };

    for id in ["1", "2", "3"] {
        store.repo.upsert_member(&payload(id, None, None)).await.unwrap();
    }

    assert!(store.repo.delete_member("2").await.unwrap());
    assert!(!store.repo.delete_member("2").await.unwrap());
    assert_eq!(store.repo.delete_all_members().await.unwrap(), 2);
    assert!(store.repo.list_members().await.unwrap().is_empty());

    store.gateway.release().await;
}

#[tokio::test]
async fn test_oversized_numeric_nickname_is_stored() {
    let Some(store) = test_store("members_numeric_nickname").await else {
        return;
    };

    let member = MemberPayload {
        user_id: "42".to_string(),
        roles: None,
        nickname: Some(json!(u64::MAX)),
    };
    let outcome = store.repo.upsert_member(&member).await.unwrap();
    assert_eq!(outcome, UpsertOutcome::Created);

    let found = store.repo.find_member("42").await.unwrap().unwrap();
    assert_eq!(found.nickname, Some(json!(u64::MAX as f64)));

    store.gateway.release().await;
}

#[tokio::test]
async fn test_release_during_connect_closes_the_attempt() {
    let Some(store) = test_store("members_release").await else {
        return;
    };
    store.gateway.release().await;
    assert!(!store.gateway.is_connected());

    let gateway = store.gateway.clone();
    let waiter = tokio::spawn(async move { gateway.collection().await.map(|_| ()) });
    while store.gateway.connection_attempts() < 2 {
        tokio::task::yield_now().await;
    }
    store.gateway.release().await;

    // Whichever side won, nothing stays cached once release() has returned.
    let _ = waiter.await.unwrap();
    assert!(!store.gateway.is_connected());

    store.gateway.collection().await.unwrap();
    assert!(store.gateway.is_connected());
    assert_eq!(store.gateway.connection_attempts(), 3);

    store.gateway.release().await;
}

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{Bson, Document, doc},
    error::{Error as MongoError, ErrorKind, WriteFailure},
};
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;

use crate::{
    database::MongoGateway,
    error::RepositoryError,
    models::{Member, MemberPayload, UpsertOutcome},
};

// MongoDB's E11000 duplicate key error.
const DUPLICATE_KEY: i32 = 11000;

/// MemberRepository
///
/// The persistence contract the handlers work against. Every method makes a
/// single attempt and reports storage failures as they happened.
#[async_trait]
pub trait MemberRepository: Send + Sync {
    /// Every stored member.
    async fn list_members(&self) -> Result<Vec<Member>, RepositoryError>;

    /// The member with exactly this `user_id`, if any.
    async fn find_member(&self, user_id: &str) -> Result<Option<Member>, RepositoryError>;

    /// Inserts the member or replaces its `roles` and `nickname`.
    async fn upsert_member(&self, payload: &MemberPayload)
    -> Result<UpsertOutcome, RepositoryError>;

    /// Removes one member. `false` when nothing matched.
    async fn delete_member(&self, user_id: &str) -> Result<bool, RepositoryError>;

    /// Removes every member and returns how many were removed.
    async fn delete_all_members(&self) -> Result<u64, RepositoryError>;
}

/// RepositoryState
///
/// The shared handle to the persistence layer stored in the application state.
pub type RepositoryState = Arc<dyn MemberRepository>;

/// MongoMemberRepository
///
/// `MemberRepository` backed by the collection the gateway hands out.
pub struct MongoMemberRepository {
    gateway: Arc<MongoGateway>,
}

impl MongoMemberRepository {
    pub fn new(gateway: Arc<MongoGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl MemberRepository for MongoMemberRepository {
    async fn list_members(&self) -> Result<Vec<Member>, RepositoryError> {
        let members = self.gateway.collection().await?;
        let cursor = members.find(doc! {}).await.map_err(classify)?;
        cursor.try_collect().await.map_err(classify)
    }

    async fn find_member(&self, user_id: &str) -> Result<Option<Member>, RepositoryError> {
        let members = self.gateway.collection().await?;
        members
            .find_one(doc! { "user_id": user_id })
            .await
            .map_err(classify)
    }

    /// Uses `$set` with `upsert: true`, so the unique index is what keeps two
    /// concurrent first writes from creating two documents.
    async fn upsert_member(
        &self,
        payload: &MemberPayload,
    ) -> Result<UpsertOutcome, RepositoryError> {
        let update = doc! { "$set": replacement_fields(payload) };
        let members = self.gateway.collection().await?;
        let result = members
            .update_one(doc! { "user_id": payload.user_id.as_str() }, update)
            .upsert(true)
            .await
            .map_err(classify)?;

        Ok(match result.upserted_id {
            Some(_) => UpsertOutcome::Created,
            None => UpsertOutcome::Updated,
        })
    }

    async fn delete_member(&self, user_id: &str) -> Result<bool, RepositoryError> {
        let members = self.gateway.collection().await?;
        let result = members
            .delete_one(doc! { "user_id": user_id })
            .await
            .map_err(classify)?;
        Ok(result.deleted_count > 0)
    }

    async fn delete_all_members(&self) -> Result<u64, RepositoryError> {
        let members = self.gateway.collection().await?;
        let result = members.delete_many(doc! {}).await.map_err(classify)?;
        Ok(result.deleted_count)
    }
}

/// replacement_fields
///
/// The `$set` document an upsert writes. Unsubmitted fields are written as
/// null: an upsert replaces, it never merges.
pub fn replacement_fields(payload: &MemberPayload) -> Document {
    let roles = payload
        .roles
        .as_ref()
        .map_or(Bson::Null, |roles| Bson::from(roles.clone()));
    let nickname = payload.nickname.as_ref().map_or(Bson::Null, json_to_bson);
    doc! { "roles": roles, "nickname": nickname }
}

/// Converts any JSON value to BSON. Integers outside the `i64` range have no
/// BSON integer type and are stored as doubles.
pub fn json_to_bson(value: &Value) -> Bson {
    match value {
        Value::Null => Bson::Null,
        Value::Bool(flag) => Bson::Boolean(*flag),
        Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                i32::try_from(int).map_or(Bson::Int64(int), Bson::Int32)
            } else {
                number.as_f64().map_or(Bson::Null, Bson::Double)
            }
        }
        Value::String(text) => Bson::String(text.clone()),
        Value::Array(items) => Bson::Array(items.iter().map(json_to_bson).collect()),
        Value::Object(fields) => Bson::Document(
            fields
                .iter()
                .map(|(key, field)| (key.clone(), json_to_bson(field)))
                .collect(),
        ),
    }
}

fn classify(err: MongoError) -> RepositoryError {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY => {
            RepositoryError::DuplicateKey(write.message.clone())
        }
        ErrorKind::Command(command) if command.code == DUPLICATE_KEY => {
            RepositoryError::DuplicateKey(command.message.clone())
        }
        ErrorKind::ServerSelection { .. }
        | ErrorKind::Io(_)
        | ErrorKind::ConnectionPoolCleared { .. } => RepositoryError::Unavailable(err.to_string()),
        _ => RepositoryError::Backend(err.to_string()),
    }
}

/// InMemoryMemberRepository
///
/// A `MemberRepository` kept in process memory, used by the test-suite to
/// exercise the router without a MongoDB server. Documents keep insertion
/// order, like a collection scan would.
#[derive(Default)]
pub struct InMemoryMemberRepository {
    members: RwLock<Vec<Member>>,
    /// When set, every operation fails with this error.
    pub failure: Option<RepositoryError>,
}

impl InMemoryMemberRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(error: RepositoryError) -> Self {
        Self {
            members: RwLock::default(),
            failure: Some(error),
        }
    }

    pub fn with_members(members: Vec<Member>) -> Self {
        Self {
            members: RwLock::new(members),
            failure: None,
        }
    }

    pub fn len(&self) -> usize {
        self.members.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.read().is_empty()
    }

    fn check(&self) -> Result<(), RepositoryError> {
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MemberRepository for InMemoryMemberRepository {
    async fn list_members(&self) -> Result<Vec<Member>, RepositoryError> {
        self.check()?;
        Ok(self.members.read().clone())
    }

    async fn find_member(&self, user_id: &str) -> Result<Option<Member>, RepositoryError> {
        self.check()?;
        Ok(self
            .members
            .read()
            .iter()
            .find(|member| member.user_id == user_id)
            .cloned())
    }

    async fn upsert_member(
        &self,
        payload: &MemberPayload,
    ) -> Result<UpsertOutcome, RepositoryError> {
        self.check()?;
        let replacement = payload.clone().into_member();
        let mut members = self.members.write();
        match members
            .iter()
            .position(|member| member.user_id == payload.user_id)
        {
            Some(index) => {
                members[index] = replacement;
                Ok(UpsertOutcome::Updated)
            }
            None => {
                members.push(replacement);
                Ok(UpsertOutcome::Created)
            }
        }
    }

    async fn delete_member(&self, user_id: &str) -> Result<bool, RepositoryError> {
        self.check()?;
        let mut members = self.members.write();
        let before = members.len();
        members.retain(|member| member.user_id != user_id);
        Ok(members.len() < before)
    }

    async fn delete_all_members(&self) -> Result<u64, RepositoryError> {
        self.check()?;
        let mut members = self.members.write();
        let removed = members.len() as u64;
        members.clear();
        Ok(removed)
    }
}

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

// --- Persisted Schema ---

/// Member
///
/// A member record as stored in the members collection. `user_id` is the
/// natural key and is backed by a unique index. Storage metadata such as `_id`
/// is not part of this shape and is dropped when documents are read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Member {
    #[schema(example = "123456789012345678")]
    pub user_id: String,
    // Absent roles are stored as null.
    #[serde(default)]
    pub roles: Option<Vec<String>>,
    /// Free-form; any JSON value a client submitted is kept as-is.
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub nickname: Option<Value>,
}

// --- Request Payloads ---

/// MemberPayload
///
/// The validated body of POST /api/users. Produced by the request validator,
/// never deserialized straight from the wire, so `None` always means "the
/// field was not submitted".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MemberPayload {
    #[schema(example = "123456789012345678")]
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub nickname: Option<Value>,
}

impl MemberPayload {
    /// The record an upsert of this payload leaves behind. Roles and nickname
    /// are replaced wholesale, so unsubmitted fields end up absent.
    pub fn into_member(self) -> Member {
        Member {
            user_id: self.user_id,
            roles: self.roles,
            nickname: self.nickname,
        }
    }
}

/// UpsertOutcome
///
/// Whether an upsert inserted a new document or replaced an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

// --- Response Envelope ---

/// ApiResponse
///
/// The uniform envelope every endpoint answers with:
/// `{success, message?, data?, count?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            count: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }
}

impl ApiResponse<()> {
    /// A successful envelope with no payload.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
            count: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: None,
            count: None,
        }
    }
}

use serde_json::Value;

use crate::{error::ApiError, models::MemberPayload};

/// validate_member_payload
///
/// Checks a raw create/update body and turns it into a `MemberPayload`.
/// Stops at the first broken rule; nothing reaches storage until every rule
/// has passed.
///
/// - `user_id` must be present and consist only of ASCII digits.
/// - `roles`, when present, must be an array of digit strings. Absent is fine,
///   `null` is not.
/// - `nickname` is taken as-is.
pub fn validate_member_payload(body: &Value) -> Result<MemberPayload, ApiError> {
    let fields = body.as_object();
    let field = |name: &str| fields.and_then(|map| map.get(name));

    let user_id = match field("user_id") {
        None => return Err(invalid("user_id is required")),
        Some(value) if is_blank(value) => return Err(invalid("user_id is required")),
        Some(Value::String(id)) if is_numeric_id(id) => id.clone(),
        Some(_) => {
            return Err(invalid(
                "user_id must be a valid Discord user ID (string of numbers)",
            ));
        }
    };

    let roles = match field("roles") {
        None => None,
        Some(Value::Array(items)) => Some(
            items
                .iter()
                .map(|item| match item {
                    Value::String(role) if is_numeric_id(role) => Ok(role.clone()),
                    _ => Err(invalid(
                        "Each role ID must be a valid Discord role ID (string of numbers)",
                    )),
                })
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Some(_) => return Err(invalid("roles must be an array")),
    };

    Ok(MemberPayload {
        user_id,
        roles,
        nickname: field("nickname").cloned(),
    })
}

/// True for a non-empty string made only of `0-9`.
pub fn is_numeric_id(candidate: &str) -> bool {
    !candidate.is_empty() && candidate.bytes().all(|b| b.is_ascii_digit())
}

// Values that count as "not provided" for a required field.
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => true,
        Value::String(s) => s.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        _ => false,
    }
}

fn invalid(message: &str) -> ApiError {
    ApiError::InvalidInput(message.to_string())
}

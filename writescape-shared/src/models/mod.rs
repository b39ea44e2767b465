//! Payloads exchanged with the Writescape backend and its realtime channel.

pub mod chat;
pub mod post;
pub mod profile;
pub mod user;

pub use chat::{ChatDeliver, ChatMessage, ChatSend};
pub use post::{Author, CreatePostRequest, EditPostRequest, Post, SearchRequest};
pub use profile::{FollowEntry, ProfileCounts, ProfileSnapshot};
pub use user::{
    EmailExistsRequest, LoginRequest, RegisterRequest, SessionUser, TokenRequest,
    UsernameExistsRequest,
};

use serde_json::Value;

/// Returns `true` when the backend answered with a value it uses to mean "nothing here".
///
/// The backend never relies on a not-found status code; it answers `false`, `null`,
/// an empty string or `0` instead.
#[must_use]
pub fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::String(text) => text.is_empty(),
        Value::Number(number) => number.as_f64().is_some_and(|n| n == 0.0),
        Value::Array(_) | Value::Object(_) => false,
    }
}

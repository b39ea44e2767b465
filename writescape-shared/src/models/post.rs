//! Posts, their authors and the post request bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Author block embedded in every post.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Author {
    /// Author username.
    pub username: String,
    /// Author avatar URL.
    pub avatar: String,
}

/// A blog post as returned by the post, feed, profile-posts and search endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    /// Backend document id.
    #[serde(rename = "_id")]
    pub id: String,
    /// Post title.
    pub title: String,
    /// Markdown body; listing endpoints may omit it.
    #[serde(default)]
    pub body: String,
    /// Creation time.
    pub created_date: DateTime<Utc>,
    /// Post author.
    pub author: Author,
    /// Whether the requesting visitor owns the post, when the backend reports it.
    #[serde(default)]
    pub is_visitor_owner: bool,
}

impl Post {
    /// Formats the creation date the way post listings show it (`M/D/YYYY`).
    #[must_use]
    pub fn display_date(&self) -> String {
        self.created_date.format("%-m/%-d/%Y").to_string()
    }
}

/// Body for `/create-post`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreatePostRequest {
    /// Title text.
    pub title: String,
    /// Body text.
    pub body: String,
    /// Author token.
    pub token: String,
}

/// Body for `/post/:id/edit`.
pub type EditPostRequest = CreatePostRequest;

/// Body for `/search`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    /// Free-text term.
    pub search_term: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_uses_backend_field_names() {
        let raw = r#"{
            "_id": "5f1",
            "title": "Hello",
            "body": "World",
            "createdDate": "2021-03-04T10:00:00.000Z",
            "author": {"username": "alice", "avatar": "a.png"},
            "isVisitorOwner": true
        }"#;
        let post: Post = serde_json::from_str(raw).unwrap();
        assert_eq!(post.id, "5f1");
        assert!(post.is_visitor_owner);
        assert_eq!(post.display_date(), "3/4/2021");
    }

    #[test]
    fn listing_entries_may_omit_body_and_ownership() {
        let raw = r#"{
            "_id": "5f2",
            "title": "Listed",
            "createdDate": "2021-12-25T00:00:00Z",
            "author": {"username": "bob", "avatar": "b.png"}
        }"#;
        let post: Post = serde_json::from_str(raw).unwrap();
        assert!(post.body.is_empty());
        assert!(!post.is_visitor_owner);
    }

    #[test]
    fn search_request_is_camel_case() {
        let json = serde_json::to_string(&SearchRequest {
            search_term: "rust".into(),
        })
        .unwrap();
        assert_eq!(json, r#"{"searchTerm":"rust"}"#);
    }
}

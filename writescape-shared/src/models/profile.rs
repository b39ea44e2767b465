//! Profile headers and follower/following entries.

use serde::{Deserialize, Serialize};

/// Post and follow counters shown on a profile header.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileCounts {
    /// Number of posts authored.
    pub post_count: u64,
    /// Number of followers.
    pub follower_count: u64,
    /// Number of accounts followed.
    pub following_count: u64,
}

/// A profile as returned by `POST /profile/:username`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSnapshot {
    /// Profile owner.
    pub profile_username: String,
    /// Profile avatar URL.
    pub profile_avatar: String,
    /// Whether the requesting visitor follows this profile.
    pub is_following: bool,
    /// Header counters.
    pub counts: ProfileCounts,
}

/// One row of a followers/following list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FollowEntry {
    /// Username of the listed account.
    pub username: String,
    /// Avatar URL of the listed account.
    pub avatar: String,
}

//! Terminal rendering shared by the commands.

use client::{SessionStore, lifecycle::DraftField};
use shared::models::{FollowEntry, Post, ProfileSnapshot};

/// Prints and drains queued notifications.
pub fn print_flash_messages(session: &SessionStore) {
    for message in session.take_flash_messages() {
        println!("» {message}");
    }
}

/// Prints the error of `field`, if any, prefixed with its label.
pub fn print_field_error(label: &str, field: &DraftField) {
    if field.has_errors {
        eprintln!("{label}: {}", field.message);
    }
}

/// One line per post.
pub fn print_post_list(posts: &[Post]) {
    for post in posts {
        println!(
            "{id}  {title}  by {author} on {date}",
            id = post.id,
            title = post.title,
            author = post.author.username,
            date = post.display_date()
        );
    }
}

/// A full post.
pub fn print_post(post: &Post) {
    println!("{}", post.title);
    println!(
        "Posted by {} on {}",
        post.author.username,
        post.display_date()
    );
    println!();
    println!("{}", post.body);
}

/// Profile header with counters.
pub fn print_profile(profile: &ProfileSnapshot) {
    println!("{}", profile.profile_username);
    println!(
        "Posts: {}  Followers: {}  Following: {}",
        profile.counts.post_count, profile.counts.follower_count, profile.counts.following_count
    );
    if profile.is_following {
        println!("You follow this user.");
    }
}

/// One username per line.
pub fn print_follow_list(entries: &[FollowEntry]) {
    for entry in entries {
        println!("{}", entry.username);
    }
}

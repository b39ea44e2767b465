use anyhow::{Result, bail};
use client::Writescape;

use super::require_session;
use crate::output::print_post_list;

/// Prints the home feed of the logged-in user.
pub async fn feed(app: &Writescape) -> Result<()> {
    require_session(app).await?;
    let feed = app.home_feed();
    feed.load().await?;

    let state = feed.state();
    if state.is_loading {
        bail!("could not load the feed");
    }
    if state.posts.is_empty() {
        println!("Your feed is empty. Follow some users to see their posts here.");
    }
    print_post_list(&state.posts);
    Ok(())
}

/// Prints posts matching `term`.
pub async fn search(app: &Writescape, term: &str) -> Result<()> {
    let overlay = app.search_overlay();
    overlay.open();
    let results = overlay.search_now(term).await;
    overlay.close();

    if results.is_empty() {
        println!("No results for \"{term}\".");
    } else {
        println!(
            "{} {} found",
            results.len(),
            if results.len() == 1 { "item" } else { "items" }
        );
        print_post_list(&results);
    }
    Ok(())
}

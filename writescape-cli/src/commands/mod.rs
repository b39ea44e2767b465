//! Subcommand implementations.

pub mod browse;
pub mod chat;
pub mod completion;
pub mod config;
pub mod post;
pub mod profile;
pub mod session;

use anyhow::{Result, bail};
use client::Writescape;
use tracing::debug;

/// Confirms the stored session is still accepted by the backend.
pub async fn require_session(app: &Writescape) -> Result<()> {
    if !app.session().is_logged_in() {
        bail!("not logged in; run `writescape session login` first");
    }
    if !app.verify_session().await {
        debug!("stored session was rejected by the backend");
        bail!("not logged in; run `writescape session login` first");
    }
    Ok(())
}

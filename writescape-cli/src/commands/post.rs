use anyhow::{Context, Result, bail};
use clap::Subcommand;
use client::{Route, Writescape, lifecycle::SubmissionPhase};

use super::require_session;
use crate::output::{print_field_error, print_post};

#[derive(Subcommand, Debug)]
pub enum PostCommand {
    /// Publish a new post
    Create {
        /// Post title
        #[arg(long, short)]
        title: String,
        /// Post body
        #[arg(long, short)]
        body: String,
    },
    /// Show a post
    Show {
        /// Post id
        id: String,
    },
    /// Edit one of your posts
    Edit {
        /// Post id
        id: String,
        /// New title; unchanged when omitted
        #[arg(long, short)]
        title: Option<String>,
        /// New body; unchanged when omitted
        #[arg(long, short)]
        body: Option<String>,
    },
    /// Delete one of your posts
    Delete {
        /// Post id
        id: String,
    },
}

pub async fn run(app: &Writescape, command: PostCommand) -> Result<()> {
    match command {
        PostCommand::Create { title, body } => create(app, title, body).await,
        PostCommand::Show { id } => show(app, &id).await,
        PostCommand::Edit { id, title, body } => edit(app, &id, title, body).await,
        PostCommand::Delete { id } => delete(app, &id).await,
    }
}

async fn create(app: &Writescape, title: String, body: String) -> Result<()> {
    require_session(app).await?;
    let form = app.create_post_form();
    form.set_title(title);
    form.set_body(body);

    let phase = form.submit().await.context("could not create post")?;
    let state = form.state();
    match phase {
        SubmissionPhase::Settled => {
            if let Some(Route::Post(id)) = state.redirect {
                println!("{id}");
            }
            Ok(())
        }
        SubmissionPhase::Invalid => {
            print_field_error("title", &state.title);
            print_field_error("body", &state.body);
            bail!("post has invalid fields");
        }
        _ => {
            for reason in state.rejections {
                eprintln!("{reason}");
            }
            bail!("could not create post");
        }
    }
}

async fn show(app: &Writescape, id: &str) -> Result<()> {
    let view = app.post_view(id);
    view.load().await;
    let state = view.state();
    match state.post {
        Some(post) => {
            print_post(&post);
            Ok(())
        }
        None if state.not_found => bail!("post {id} not found"),
        None => bail!("could not load post {id}"),
    }
}

async fn edit(app: &Writescape, id: &str, title: Option<String>, body: Option<String>) -> Result<()> {
    require_session(app).await?;
    let form = app.edit_post_form(id);
    form.load().await;
    let state = form.state();
    if state.not_found {
        bail!("post {id} not found");
    }
    if state.is_fetching {
        bail!("could not load post {id}");
    }
    if state.redirect.is_some() {
        bail!("cannot edit post {id}");
    }

    if let Some(title) = title {
        form.set_title(title);
    }
    if let Some(body) = body {
        form.set_body(body);
    }

    let phase = form.submit().await.context("could not edit post")?;
    let state = form.state();
    match phase {
        SubmissionPhase::Settled => Ok(()),
        SubmissionPhase::Invalid => {
            print_field_error("title", &state.title);
            print_field_error("body", &state.body);
            bail!("post has invalid fields");
        }
        _ => bail!("could not save post {id}"),
    }
}

async fn delete(app: &Writescape, id: &str) -> Result<()> {
    require_session(app).await?;
    let view = app.post_view(id);
    view.load().await;
    if view.state().not_found {
        bail!("post {id} not found");
    }
    if !view.delete().await.context("could not delete post")? {
        bail!("could not delete post {id}");
    }
    Ok(())
}

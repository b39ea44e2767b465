use anyhow::{Context, Result, bail};
use clap::Subcommand;
use client::{
    Writescape,
    features::{ProfileTab, ProfileView, TabContent},
};

use super::require_session;
use crate::output::{print_follow_list, print_post_list, print_profile};

#[derive(Subcommand, Debug)]
pub enum ProfileCommand {
    /// Show a profile header and its posts
    Show {
        /// Username
        username: String,
    },
    /// Follow a user
    Follow {
        /// Username
        username: String,
    },
    /// Stop following a user
    Unfollow {
        /// Username
        username: String,
    },
    /// List a user's posts
    Posts {
        /// Username
        username: String,
    },
    /// List a user's followers
    Followers {
        /// Username
        username: String,
    },
    /// List the users someone follows
    Following {
        /// Username
        username: String,
    },
}

pub async fn run(app: &Writescape, command: ProfileCommand) -> Result<()> {
    match command {
        ProfileCommand::Show { username } => {
            let view = loaded(app, &username).await?;
            print_profile(&view.state().profile);
            println!();
            print_tab(&view, ProfileTab::Posts).await
        }
        ProfileCommand::Follow { username } => change_follow(app, &username, true).await,
        ProfileCommand::Unfollow { username } => change_follow(app, &username, false).await,
        ProfileCommand::Posts { username } => {
            print_tab(&app.profile_view(username), ProfileTab::Posts).await
        }
        ProfileCommand::Followers { username } => {
            print_tab(&app.profile_view(username), ProfileTab::Followers).await
        }
        ProfileCommand::Following { username } => {
            print_tab(&app.profile_view(username), ProfileTab::Following).await
        }
    }
}

async fn loaded(app: &Writescape, username: &str) -> Result<ProfileView> {
    let view = app.profile_view(username);
    view.load().await;
    if view.state().not_found {
        bail!("user {username} not found");
    }
    Ok(view)
}

async fn print_tab(view: &ProfileView, tab: ProfileTab) -> Result<()> {
    view.load_tab(tab).await;
    match view.state().tab_content {
        TabContent::Posts(posts) => print_post_list(&posts),
        TabContent::Follows(entries) => print_follow_list(&entries),
        TabContent::Loading => bail!("could not load {tab:?}"),
    }
    Ok(())
}

async fn change_follow(app: &Writescape, username: &str, follow: bool) -> Result<()> {
    require_session(app).await?;
    let view = loaded(app, username).await?;
    if follow {
        view.follow().await.context("could not follow")?;
    } else {
        view.unfollow().await.context("could not unfollow")?;
    }

    let profile = view.state().profile;
    if profile.is_following != follow {
        bail!("the backend did not accept the change");
    }
    if follow {
        println!("Following {username} ({} followers).", profile.counts.follower_count);
    } else {
        println!("No longer following {username}.");
    }
    Ok(())
}

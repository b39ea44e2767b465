use std::io::{self, Write};

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use client::{Writescape, lifecycle::SubmissionPhase};
use rpassword::prompt_password;

use crate::output::print_field_error;

#[derive(Subcommand, Debug)]
pub enum SessionCommand {
    /// Log in and remember the session
    Login(LoginArgs),
    /// Forget the stored session
    Logout,
    /// Create an account and log in
    Register(RegisterArgs),
    /// Show the logged-in user
    Whoami,
}

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Account username; prompted when omitted
    #[arg(long, short)]
    pub username: Option<String>,
    /// Account password; prompted without echo when omitted
    #[arg(long)]
    pub password: Option<String>,
}

#[derive(Args, Debug)]
pub struct RegisterArgs {
    /// Username (letters and numbers, 3 to 30 characters)
    #[arg(long, short)]
    pub username: String,
    /// Email address
    #[arg(long, short)]
    pub email: String,
    /// Password (12 to 50 characters); prompted without echo when omitted
    #[arg(long)]
    pub password: Option<String>,
}

pub async fn run(app: &Writescape, command: SessionCommand) -> Result<()> {
    match command {
        SessionCommand::Login(args) => login(app, args).await,
        SessionCommand::Logout => {
            logout(app);
            Ok(())
        }
        SessionCommand::Register(args) => register(app, args).await,
        SessionCommand::Whoami => whoami(app).await,
    }
}

async fn login(app: &Writescape, args: LoginArgs) -> Result<()> {
    let username = match args.username {
        Some(username) => username,
        None => prompt("Username: ")?,
    };
    let password = match args.password {
        Some(password) => password,
        None => prompt_password("Password: ")?,
    };

    let form = app.login_form();
    form.set_username(username);
    form.set_password(password);
    if form.submit().await != SubmissionPhase::Settled {
        bail!("login failed");
    }
    Ok(())
}

fn logout(app: &Writescape) {
    match app.session().snapshot().username() {
        Some(username) => {
            app.logout();
            println!("Logged out {username}.");
        }
        None => println!("Not logged in."),
    }
}

async fn register(app: &Writescape, args: RegisterArgs) -> Result<()> {
    let password = match args.password {
        Some(password) => password,
        None => prompt_password("Password: ")?,
    };

    let form = app.register_form();
    form.set_username(args.username);
    form.set_email(args.email);
    form.set_password(password);
    form.validate_now().await;

    match form.submit().await {
        SubmissionPhase::Settled => Ok(()),
        SubmissionPhase::Invalid => {
            let state = form.state();
            print_field_error("username", &state.username.field);
            print_field_error("email", &state.email.field);
            print_field_error("password", &state.password);
            for (label, unique) in [("username", &state.username), ("email", &state.email)] {
                if !unique.is_unique && !unique.field.has_errors {
                    eprintln!("{label}: availability could not be confirmed");
                }
            }
            bail!("registration has invalid fields");
        }
        _ => {
            for reason in form.state().rejections {
                eprintln!("{reason}");
            }
            bail!("registration failed");
        }
    }
}

async fn whoami(app: &Writescape) -> Result<()> {
    if app.session().is_logged_in() {
        app.verify_session().await;
    }
    match app.session().user() {
        Some(user) => println!("{} ({})", user.username, user.avatar),
        None => println!("Not logged in."),
    }
    Ok(())
}

fn prompt(message: &str) -> Result<String> {
    print!("{message}");
    io::stdout().flush().ok();
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let trimmed = input.trim().to_string();
    if trimmed.is_empty() {
        bail!("input must not be empty");
    }
    Ok(trimmed)
}

use std::time::Duration;

use anyhow::{Context, Result, bail};
use client::{Writescape, realtime::ChannelStatus};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
    time::timeout,
};
use tracing::{info, warn};

use super::require_session;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Interactive chat: stdin lines are sent, messages from others are printed.
pub async fn run(app: &Writescape) -> Result<()> {
    require_session(app).await?;
    let chat = app.chat();
    let mut incoming = chat.subscribe_messages();
    let mut status = chat.subscribe_status();

    timeout(CONNECT_TIMEOUT, chat.open())
        .await
        .context("timed out connecting to chat")?
        .context("could not connect to chat")?;
    app.start();
    chat.toggle_panel();
    println!("Connected to chat. Type a message and press enter; /quit leaves.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) if line.trim() == "/quit" => break,
                Some(line) => {
                    if let Err(err) = chat.send(&line) {
                        warn!(error = %err, "chat message not sent");
                    }
                }
                None => break,
            },
            message = incoming.recv() => match message {
                Ok(message) => println!("{}: {}", message.username, message.message),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "chat output fell behind"),
                Err(RecvError::Closed) => break,
            },
            changed = status.changed() => {
                if changed.is_err() || *status.borrow_and_update() == ChannelStatus::Closed {
                    warn!("chat connection closed by the server");
                    bail!("chat connection closed");
                }
            }
        }
    }

    chat.close_panel();
    info!("left chat");
    Ok(())
}

use anyhow::{Context, Result};
use chat_sync::types::display_time;
use chat_sync::{
    ChatMessage, ChatService, SenderType, SessionSnapshot, SessionStatus, SyncClient,
    UserIdentity, WidgetIntent,
};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::{FileConfig, ServiceConfig};
use crate::http::HttpChatService;
use crate::terminal::{HELP, InputReader, TerminalSurface};

fn connect(fc: &FileConfig) -> Result<(HttpChatService, UserIdentity)> {
    let user = fc.user.identity()?;
    let service = HttpChatService::new(&ServiceConfig::from_file(fc))
        .context("Failed to build HTTP client")?;
    Ok((service, user))
}

/// Interactive chat: resume or lazily start a session, then follow it.
pub async fn chat_command(fc: &FileConfig) -> Result<()> {
    let (service, user) = connect(fc)?;
    info!(base_url = %service.base_url(), user_id = %user.user_id, "starting support chat");

    println!("Support chat for {} at {}", user.user_name, service.base_url());
    println!("{HELP}\n");

    let surface = TerminalSurface::new(std::io::stdout());
    let mut client = SyncClient::new(service, surface, user);
    client.initialize().await;
    client.open();

    let (tx, rx) = mpsc::channel(32);
    let reader = InputReader::stdin(tx.clone());
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = tx.send(WidgetIntent::Quit).await;
        }
    });

    client.run(rx).await;

    reader.stop();
    interrupt.abort();
    println!("Goodbye.");
    Ok(())
}

pub async fn status_command(fc: &FileConfig, json: bool) -> Result<()> {
    let (service, user) = connect(fc)?;
    let snapshot = fetch_snapshot(&service, &user).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }
    println!("{}", describe(&snapshot));
    Ok(())
}

pub async fn history_command(fc: &FileConfig, json: bool) -> Result<()> {
    let (service, user) = connect(fc)?;
    let snapshot = fetch_snapshot(&service, &user).await?;

    let Some(session_id) = snapshot.session_id.as_ref().filter(|_| snapshot.has_session) else {
        if json {
            println!("[]");
        } else {
            println!("No chat session.");
        }
        return Ok(());
    };

    let messages = service
        .messages(session_id)
        .await
        .with_context(|| format!("Failed to load messages for session {session_id}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&messages)?);
    } else if messages.is_empty() {
        println!("No messages in session {session_id}.");
    } else {
        for msg in &messages {
            println!("{}", history_line(msg));
        }
        println!("\n{} message(s)", messages.len());
    }
    Ok(())
}

pub async fn end_command(fc: &FileConfig) -> Result<()> {
    let (service, user) = connect(fc)?;
    let snapshot = fetch_snapshot(&service, &user).await?;

    let Some(session_id) = snapshot.live_session_id() else {
        println!("No active chat session.");
        return Ok(());
    };

    match service.close_session(session_id).await {
        Ok(()) => {
            println!("Ended chat session {session_id}.");
            Ok(())
        }
        Err(e) if e.is_session_gone() => {
            warn!(%session_id, "session vanished before it could be closed");
            println!("Chat session {session_id} no longer exists.");
            Ok(())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to end chat session {session_id}")),
    }
}

async fn fetch_snapshot<S: ChatService>(service: &S, user: &UserIdentity) -> Result<SessionSnapshot> {
    service
        .current_session(user)
        .await
        .context("Failed to reach the chat service")
}

fn describe(snapshot: &SessionSnapshot) -> String {
    let Some(session_id) = snapshot.session_id.as_ref().filter(|_| snapshot.has_session) else {
        return "No active chat session.".to_string();
    };
    match (snapshot.status(), &snapshot.staff_name) {
        (SessionStatus::Active, Some(staff)) => {
            format!("Session {session_id}: ACTIVE ({staff} is helping you)")
        }
        (status, _) => format!("Session {session_id}: {status}"),
    }
}

fn history_line(msg: &ChatMessage) -> String {
    let who = match msg.sender_type {
        SenderType::Customer => "You",
        SenderType::Staff => msg.sender_name.as_str(),
    };
    format!("[{}] {:<16} {}", display_time(&msg.timestamp), who, msg.content)
}

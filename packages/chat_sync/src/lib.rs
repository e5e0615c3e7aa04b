//! Chat Sync - session synchronization core for the support chat client
//!
//! This crate owns the client side of a customer/agent chat: which session is
//! live, which messages have already been processed, and when to poll. It has
//! no HTTP dependencies and no rendering logic; both are collaborators behind
//! the [`ChatService`] and [`UiSurface`] traits.
//!
//! # Example
//!
//! ```no_run
//! use chat_sync::{ChatService, SyncClient, UiSurface, UserIdentity, WidgetIntent};
//!
//! async fn run_widget<S: ChatService, U: UiSurface>(service: S, surface: U) {
//!     let user = UserIdentity::new("42", "Ada Lovelace");
//!     let mut client = SyncClient::new(service, surface, user);
//!     client.initialize().await;
//!
//!     let (tx, rx) = tokio::sync::mpsc::channel(16);
//!     tx.send(WidgetIntent::Open).await.unwrap();
//!     tx.send(WidgetIntent::Send("hi".into())).await.unwrap();
//!     drop(tx);
//!
//!     client.run(rx).await;
//! }
//! ```

mod client;
mod error;
mod service;
mod surface;
#[cfg(test)]
mod test_helpers;
mod timer;
pub mod types;

pub use client::{SessionPhase, SyncClient, status_text};
pub use error::ServiceError;
pub use service::{ChatService, OutgoingMessage};
pub use surface::{RenderedMessage, UiSurface, WidgetIntent};
pub use timer::{POLL_INTERVAL, PollTimer};
pub use types::{
    ChatMessage, CreatedSession, MAX_MESSAGE_CHARS, SendReceipt, SenderType, SessionId,
    SessionSnapshot, SessionStatus, UserIdentity,
};

//! Support Chat - terminal client for live customer support sessions
//!
//! Wires the [`chat_sync`] session core to a reqwest-backed chat service
//! ([`http::HttpChatService`]) and a line-oriented terminal surface
//! ([`terminal::TerminalSurface`]).

pub mod cli;
pub mod config;
pub mod http;
pub mod terminal;

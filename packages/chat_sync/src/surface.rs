use crate::types::{ChatMessage, SenderType};

/// A message bubble handed to the surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderedMessage<'a> {
    pub content: &'a str,
    pub sender: SenderType,
    pub sender_name: &'a str,
    pub timestamp: &'a str,
}

impl<'a> From<&'a ChatMessage> for RenderedMessage<'a> {
    fn from(msg: &'a ChatMessage) -> Self {
        Self {
            content: &msg.content,
            sender: msg.sender_type,
            sender_name: &msg.sender_name,
            timestamp: &msg.timestamp,
        }
    }
}

/// Where the chat is displayed. Calls are fire-and-forget notifications.
pub trait UiSurface {
    /// Append a message bubble, optionally scrolling to it.
    fn render_message(&mut self, message: &RenderedMessage<'_>, scroll: bool);

    /// Remove every rendered message and banner.
    fn clear_messages(&mut self);

    fn set_status_text(&mut self, text: &str);

    /// Show the "waiting for an agent" banner. Showing it twice is a no-op.
    fn show_waiting_banner(&mut self);

    fn clear_waiting_banner(&mut self);

    fn show_closed_banner(&mut self);

    fn scroll_to_latest(&mut self);
}

/// User intents delivered by the surface to the client's event loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WidgetIntent {
    Send(String),
    Toggle,
    Open,
    Close,
    /// Customer asked to end the conversation.
    EndChat,
    Quit,
}

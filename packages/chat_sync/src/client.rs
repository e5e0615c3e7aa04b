use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::ServiceError;
use crate::service::{ChatService, OutgoingMessage};
use crate::surface::{RenderedMessage, UiSurface, WidgetIntent};
use crate::timer::PollTimer;
use crate::types::{
    ChatMessage, MAX_MESSAGE_CHARS, SendReceipt, SenderType, SessionId, SessionSnapshot,
    SessionStatus, UserIdentity, now_timestamp,
};

/// Status line texts shown by the client.
pub mod status_text {
    pub const WAITING: &str = "Waiting for agent...";
    pub const ENDED: &str = "Chat ended";
    pub const CONNECTION_PROBLEM: &str = "Connection problem, please try again";

    pub fn helping(staff_name: &str) -> String {
        format!("{staff_name} is helping you")
    }
}

/// Where the client is in the session lifecycle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SessionPhase {
    #[default]
    NoSession,
    Waiting,
    Active {
        staff_name: Option<String>,
    },
    /// The last session was closed; the next send starts a new one.
    Closed,
}

/// Keeps the local chat view in step with the session the service holds.
///
/// All state lives here and every operation runs to completion before the
/// next one starts, so service responses are always applied against the
/// session they were requested for.
pub struct SyncClient<S, U> {
    service: S,
    surface: U,
    user: UserIdentity,
    session_id: Option<SessionId>,
    /// Highest message id already processed. Never decreases while a session is live.
    last_seen_message_id: u64,
    is_open: bool,
    phase: SessionPhase,
    timer: PollTimer,
}

impl<S: ChatService, U: UiSurface> SyncClient<S, U> {
    pub fn new(service: S, surface: U, user: UserIdentity) -> Self {
        Self {
            service,
            surface,
            user,
            session_id: None,
            last_seen_message_id: 0,
            is_open: false,
            phase: SessionPhase::NoSession,
            timer: PollTimer::default(),
        }
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    pub fn last_seen_message_id(&self) -> u64 {
        self.last_seen_message_id
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn is_polling(&self) -> bool {
        self.timer.is_running()
    }

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    pub fn user(&self) -> &UserIdentity {
        &self.user
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn surface(&self) -> &U {
        &self.surface
    }

    /// Resume the session the service holds for the user, unless it is closed.
    pub async fn initialize(&mut self) {
        let snapshot = match self.service.current_session(&self.user).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "failed to check for an existing chat session");
                return;
            }
        };

        if snapshot.status() == SessionStatus::Closed {
            info!(session_id = ?snapshot.session_id, "existing chat session is closed, not resuming");
            return;
        }
        let Some(session_id) = snapshot.live_session_id().cloned() else {
            debug!("no existing chat session");
            return;
        };

        info!(%session_id, status = %snapshot.status(), "resuming chat session");
        self.session_id = Some(session_id);
        self.last_seen_message_id = 0;
        self.load_history().await;

        if snapshot.status() == SessionStatus::Waiting {
            self.enter_waiting();
        } else {
            self.phase = SessionPhase::Active {
                staff_name: snapshot.staff_name.clone(),
            };
            if let Some(name) = &snapshot.staff_name {
                self.surface.set_status_text(&status_text::helping(name));
            }
        }
    }

    pub fn open(&mut self) {
        if self.is_open {
            return;
        }
        self.is_open = true;
        debug!("chat opened");
        self.ensure_polling();
    }

    pub fn close(&mut self) {
        if !self.is_open {
            return;
        }
        self.is_open = false;
        debug!("chat closed");
        if self.timer.stop() {
            debug!("poll timer stopped");
        }
    }

    pub fn toggle(&mut self) {
        if self.is_open {
            self.close();
        } else {
            self.open();
        }
    }

    /// Ask the service for a fresh session and reset the local view around it.
    pub async fn start_session(&mut self) -> Result<SessionId, ServiceError> {
        let created = self.service.create_session(&self.user).await?;
        info!(session_id = %created.session_id, "started chat session");

        self.session_id = Some(created.session_id.clone());
        self.last_seen_message_id = 0;
        self.surface.clear_messages();
        self.enter_waiting();
        self.ensure_polling();
        Ok(created.session_id)
    }

    /// Send a customer message, starting or replacing the session as needed.
    pub async fn send(&mut self, text: &str) {
        let content = text.trim();
        if content.is_empty() {
            return;
        }
        let chars = content.chars().count();
        if chars > MAX_MESSAGE_CHARS {
            debug!(chars, limit = MAX_MESSAGE_CHARS, "message too long, ignoring");
            return;
        }

        let session_id = match self.session_id.clone() {
            Some(id) => id,
            None => match self.start_session().await {
                Ok(id) => id,
                Err(e) => {
                    warn!(error = %e, "failed to start chat session");
                    self.surface
                        .set_status_text(status_text::CONNECTION_PROBLEM);
                    return;
                }
            },
        };

        self.render_outgoing(content);

        match self.submit(&session_id, content).await {
            Ok(receipt) => {
                debug!(%session_id, message_id = ?receipt.message_id, "message delivered");
            }
            Err(e) if e.is_session_gone() => {
                info!(%session_id, "chat session no longer exists, starting a new one");
                self.reset_session();
                self.resend_in_new_session(content).await;
            }
            Err(e) => {
                warn!(%session_id, error = %e, "failed to send chat message");
            }
        }

        self.ensure_polling();
    }

    /// One recovery attempt: new session, one resend, no further retries.
    async fn resend_in_new_session(&mut self, content: &str) {
        let session_id = match self.start_session().await {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "failed to start replacement chat session");
                self.surface
                    .set_status_text(status_text::CONNECTION_PROBLEM);
                return;
            }
        };
        // Starting the session cleared the view, including the optimistic bubble.
        self.render_outgoing(content);
        match self.submit(&session_id, content).await {
            Ok(_) => debug!(%session_id, "message resent in replacement session"),
            Err(e) => warn!(%session_id, error = %e, "failed to resend chat message"),
        }
    }

    /// Reconcile with the service: session status first, then new messages.
    pub async fn poll(&mut self) {
        if !self.is_open {
            return;
        }
        let Some(session_id) = self.session_id.clone() else {
            return;
        };

        let snapshot = match self.service.current_session(&self.user).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(%session_id, error = %e, "poll: failed to refresh session status");
                return;
            }
        };

        if !snapshot.has_session || snapshot.status() == SessionStatus::Closed {
            info!(%session_id, "chat session was closed");
            self.close_session_locally();
            return;
        }
        if let Some(reported) = snapshot.session_id.as_ref().filter(|id| **id != session_id) {
            debug!(%session_id, %reported, "service reports a different session");
        }
        self.observe_assignment(&snapshot);

        let messages = match self.service.messages(&session_id).await {
            Ok(messages) => messages,
            Err(e) => {
                warn!(%session_id, error = %e, "poll: failed to fetch messages");
                return;
            }
        };

        let new_count = self.apply_new_messages(&messages);
        if new_count == 0 {
            return;
        }
        debug!(%session_id, new_count, last_seen = self.last_seen_message_id, "received messages");

        if let Err(e) = self
            .service
            .mark_read(&session_id, SenderType::Customer)
            .await
        {
            warn!(%session_id, error = %e, "failed to mark messages read");
        }
    }

    /// Customer-initiated close of the live session.
    pub async fn end_chat(&mut self) {
        let Some(session_id) = self.session_id.clone() else {
            debug!("no chat session to end");
            return;
        };
        match self.service.close_session(&session_id).await {
            Ok(()) => {
                info!(%session_id, "chat session ended by customer");
                self.close_session_locally();
            }
            Err(e) if e.is_session_gone() => {
                debug!(%session_id, "chat session already gone");
                self.close_session_locally();
            }
            Err(e) => warn!(%session_id, error = %e, "failed to end chat session"),
        }
    }

    /// Handle intents and poll ticks one at a time until `Quit` or the
    /// intent stream ends.
    pub async fn run(&mut self, mut intents: mpsc::Receiver<WidgetIntent>) {
        loop {
            tokio::select! {
                intent = intents.recv() => match intent {
                    Some(WidgetIntent::Send(text)) => self.send(&text).await,
                    Some(WidgetIntent::Toggle) => self.toggle(),
                    Some(WidgetIntent::Open) => self.open(),
                    Some(WidgetIntent::Close) => self.close(),
                    Some(WidgetIntent::EndChat) => self.end_chat().await,
                    Some(WidgetIntent::Quit) | None => break,
                },
                () = self.timer.tick() => self.poll().await,
            }
        }
        self.timer.stop();
        debug!("chat client stopped");
    }

    async fn submit(
        &self,
        session_id: &SessionId,
        content: &str,
    ) -> Result<SendReceipt, ServiceError> {
        let message = OutgoingMessage {
            session_id,
            content,
            sender_type: SenderType::Customer,
            sender_id: &self.user.user_id,
            sender_name: &self.user.user_name,
        };
        self.service.send_message(&message).await
    }

    async fn load_history(&mut self) {
        let Some(session_id) = self.session_id.clone() else {
            return;
        };
        match self.service.messages(&session_id).await {
            Ok(messages) => {
                self.surface.clear_messages();
                for msg in &messages {
                    self.surface.render_message(&RenderedMessage::from(msg), false);
                    self.advance_last_seen(msg.id);
                }
                self.surface.scroll_to_latest();
                debug!(%session_id, count = messages.len(), "loaded chat history");
            }
            Err(e) => warn!(%session_id, error = %e, "failed to load chat history"),
        }
    }

    /// Render staff messages newer than the high-water mark and advance it.
    /// Customer messages were already shown when they were sent.
    fn apply_new_messages(&mut self, messages: &[ChatMessage]) -> usize {
        let mark = self.last_seen_message_id;
        let mut new_count = 0;
        for msg in messages.iter().filter(|m| m.id > mark) {
            new_count += 1;
            if msg.sender_type == SenderType::Staff {
                self.surface.render_message(&RenderedMessage::from(msg), true);
                self.surface.clear_waiting_banner();
                self.surface
                    .set_status_text(&status_text::helping(&msg.sender_name));
                self.phase = SessionPhase::Active {
                    staff_name: Some(msg.sender_name.clone()),
                };
            }
        }
        if let Some(max) = messages.iter().map(|m| m.id).max() {
            self.advance_last_seen(max);
        }
        new_count
    }

    /// A staff member joined before saying anything.
    fn observe_assignment(&mut self, snapshot: &SessionSnapshot) {
        if snapshot.status() != SessionStatus::Active || self.phase != SessionPhase::Waiting {
            return;
        }
        let Some(name) = snapshot.staff_name.as_deref() else {
            return;
        };
        self.surface.clear_waiting_banner();
        self.surface.set_status_text(&status_text::helping(name));
        self.phase = SessionPhase::Active {
            staff_name: Some(name.to_string()),
        };
    }

    fn render_outgoing(&mut self, content: &str) {
        let timestamp = now_timestamp();
        let message = RenderedMessage {
            content,
            sender: SenderType::Customer,
            sender_name: &self.user.user_name,
            timestamp: &timestamp,
        };
        self.surface.render_message(&message, true);
    }

    fn enter_waiting(&mut self) {
        self.phase = SessionPhase::Waiting;
        self.surface.show_waiting_banner();
        self.surface.set_status_text(status_text::WAITING);
    }

    fn close_session_locally(&mut self) {
        self.surface.clear_waiting_banner();
        self.surface.show_closed_banner();
        self.surface.set_status_text(status_text::ENDED);
        self.surface.scroll_to_latest();
        if self.timer.stop() {
            debug!("poll timer stopped");
        }
        self.reset_session();
        self.phase = SessionPhase::Closed;
    }

    fn ensure_polling(&mut self) {
        if self.is_open && self.session_id.is_some() && self.timer.start() {
            debug!("poll timer started");
        }
    }

    fn advance_last_seen(&mut self, id: u64) {
        self.last_seen_message_id = self.last_seen_message_id.max(id);
    }

    fn reset_session(&mut self) {
        self.session_id = None;
        self.last_seen_message_id = 0;
    }
}

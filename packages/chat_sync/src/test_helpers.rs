//! In-memory collaborators for exercising the sync client.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::ServiceError;
use crate::service::{ChatService, OutgoingMessage};
use crate::surface::{RenderedMessage, UiSurface};
use crate::types::{
    ChatMessage, CreatedSession, SendReceipt, SenderType, SessionId, SessionSnapshot,
    SessionStatus, UserIdentity,
};

/// A service call, as observed by [`FakeChatService`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    CurrentSession,
    CreateSession,
    Messages(SessionId),
    Send { session_id: SessionId, content: String },
    MarkRead(SessionId, SenderType),
    Close(SessionId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    CurrentSession,
    CreateSession,
    Messages,
    Send,
    MarkRead,
    Close,
}

struct FakeSession {
    status: SessionStatus,
    staff_name: Option<String>,
    messages: Vec<ChatMessage>,
}

#[derive(Default)]
struct Inner {
    sessions: BTreeMap<u64, FakeSession>,
    current: Option<u64>,
    next_session_id: u64,
    next_message_id: u64,
    calls: Vec<Call>,
    report_closed: bool,
    failures: VecDeque<(Op, ServiceError)>,
}

impl Inner {
    fn take_failure(&mut self, op: Op) -> Result<(), ServiceError> {
        match self.failures.iter().position(|(o, _)| *o == op) {
            Some(idx) => Err(self.failures.remove(idx).expect("index in range").1),
            None => Ok(()),
        }
    }

    fn lookup(&mut self, session_id: &SessionId) -> Option<&mut FakeSession> {
        let key: u64 = session_id.as_str().parse().ok()?;
        self.sessions.get_mut(&key)
    }

    fn push_message(&mut self, key: u64, sender_type: SenderType, name: &str, content: &str) -> u64 {
        self.next_message_id += 1;
        let id = self.next_message_id;
        if let Some(session) = self.sessions.get_mut(&key) {
            session.messages.push(ChatMessage {
                id,
                sender_type,
                sender_name: name.to_string(),
                content: content.to_string(),
                timestamp: "2025-03-01T10:15:30.000".to_string(),
            });
        }
        id
    }
}

/// Behaves like the real chat service for a single customer.
#[derive(Default)]
pub struct FakeChatService {
    inner: Mutex<Inner>,
}

impl FakeChatService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a session the service already holds for the customer.
    pub fn with_session(status: SessionStatus, staff_name: Option<&str>) -> (Self, SessionId) {
        let fake = Self::new();
        let id = fake.insert_session(status, staff_name);
        (fake, id)
    }

    pub fn insert_session(&self, status: SessionStatus, staff_name: Option<&str>) -> SessionId {
        let mut inner = self.inner.lock().unwrap();
        inner.next_session_id += 1;
        let key = inner.next_session_id;
        inner.sessions.insert(
            key,
            FakeSession {
                status,
                staff_name: staff_name.map(str::to_string),
                messages: Vec::new(),
            },
        );
        inner.current = Some(key);
        SessionId::new(key.to_string())
    }

    pub fn staff_join(&self, session_id: &SessionId, name: &str) {
        let mut inner = self.inner.lock().unwrap();
        let session = inner.lookup(session_id).expect("unknown session");
        session.status = SessionStatus::Active;
        session.staff_name = Some(name.to_string());
    }

    pub fn post(&self, session_id: &SessionId, sender: SenderType, name: &str, content: &str) -> u64 {
        let mut inner = self.inner.lock().unwrap();
        let key: u64 = session_id.as_str().parse().expect("numeric session id");
        inner.push_message(key, sender, name, content)
    }

    /// Close the session the way staff would.
    pub fn close(&self, session_id: &SessionId) {
        let mut inner = self.inner.lock().unwrap();
        inner.lookup(session_id).expect("unknown session").status = SessionStatus::Closed;
    }

    /// Forget the session entirely, so sends fail with "not found".
    pub fn purge(&self, session_id: &SessionId) {
        let mut inner = self.inner.lock().unwrap();
        let key: u64 = session_id.as_str().parse().expect("numeric session id");
        inner.sessions.remove(&key);
        if inner.current == Some(key) {
            inner.current = None;
        }
    }

    /// Report closed sessions from current-session instead of hiding them.
    pub fn report_closed_sessions(&self) {
        self.inner.lock().unwrap().report_closed = true;
    }

    /// Make the next call of `op` fail with `err`.
    pub fn fail_next(&self, op: Op, err: ServiceError) {
        self.inner.lock().unwrap().failures.push_back((op, err));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().unwrap().calls.clear();
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    pub fn messages_of(&self, session_id: &SessionId) -> Vec<ChatMessage> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .lookup(session_id)
            .map(|s| s.messages.clone())
            .unwrap_or_default()
    }

    pub fn status_of(&self, session_id: &SessionId) -> Option<SessionStatus> {
        let mut inner = self.inner.lock().unwrap();
        inner.lookup(session_id).map(|s| s.status)
    }
}

#[async_trait]
impl ChatService for FakeChatService {
    async fn current_session(&self, _user: &UserIdentity) -> Result<SessionSnapshot, ServiceError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(Call::CurrentSession);
        inner.take_failure(Op::CurrentSession)?;
        let live = inner.current.and_then(|key| {
            let s = inner.sessions.get(&key)?;
            (inner.report_closed || s.status != SessionStatus::Closed)
                .then(|| (key, s.status, s.staff_name.clone()))
        });
        Ok(match live {
            Some((key, status, staff_name)) => SessionSnapshot {
                has_session: true,
                session_id: Some(SessionId::new(key.to_string())),
                status: Some(status),
                staff_name,
            },
            None => SessionSnapshot::default(),
        })
    }

    async fn create_session(&self, _user: &UserIdentity) -> Result<CreatedSession, ServiceError> {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.calls.push(Call::CreateSession);
            inner.take_failure(Op::CreateSession)?;
        }
        let session_id = self.insert_session(SessionStatus::Waiting, None);
        Ok(CreatedSession {
            session_id,
            status: Some(SessionStatus::Waiting),
            staff_name: None,
        })
    }

    async fn messages(&self, session_id: &SessionId) -> Result<Vec<ChatMessage>, ServiceError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(Call::Messages(session_id.clone()));
        inner.take_failure(Op::Messages)?;
        Ok(inner
            .lookup(session_id)
            .map(|s| s.messages.clone())
            .unwrap_or_default())
    }

    async fn send_message(&self, message: &OutgoingMessage<'_>) -> Result<SendReceipt, ServiceError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(Call::Send {
            session_id: message.session_id.clone(),
            content: message.content.to_string(),
        });
        inner.take_failure(Op::Send)?;
        if inner.lookup(message.session_id).is_none() {
            return Err(ServiceError::Rejected {
                status: 400,
                message: "Chat session not found".into(),
            });
        }
        let key: u64 = message.session_id.as_str().parse().expect("numeric session id");
        let id = inner.push_message(key, message.sender_type, message.sender_name, message.content);
        Ok(SendReceipt {
            success: true,
            message_id: Some(id),
            timestamp: Some("2025-03-01T10:15:30.000".into()),
        })
    }

    async fn mark_read(&self, session_id: &SessionId, reader: SenderType) -> Result<(), ServiceError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(Call::MarkRead(session_id.clone(), reader));
        inner.take_failure(Op::MarkRead)
    }

    async fn close_session(&self, session_id: &SessionId) -> Result<(), ServiceError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(Call::Close(session_id.clone()));
        inner.take_failure(Op::Close)?;
        match inner.lookup(session_id) {
            Some(session) => {
                session.status = SessionStatus::Closed;
                Ok(())
            }
            None => Err(ServiceError::Rejected {
                status: 400,
                message: "Chat session not found".into(),
            }),
        }
    }
}

/// Everything the client told the surface, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SurfaceEvent {
    Message { content: String, sender: SenderType },
    Cleared,
    Status(String),
    WaitingShown,
    WaitingCleared,
    ClosedShown,
    Scrolled,
}

#[derive(Default)]
pub struct RecordingSurface {
    pub events: Vec<SurfaceEvent>,
    pub waiting_visible: bool,
}

impl RecordingSurface {
    pub fn rendered(&self) -> Vec<(String, SenderType)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                SurfaceEvent::Message { content, sender } => Some((content.clone(), *sender)),
                _ => None,
            })
            .collect()
    }

    /// Messages rendered since the last clear.
    pub fn visible(&self) -> Vec<(String, SenderType)> {
        let start = self
            .events
            .iter()
            .rposition(|e| *e == SurfaceEvent::Cleared)
            .map_or(0, |i| i + 1);
        self.events[start..]
            .iter()
            .filter_map(|e| match e {
                SurfaceEvent::Message { content, sender } => Some((content.clone(), *sender)),
                _ => None,
            })
            .collect()
    }

    pub fn last_status(&self) -> Option<&str> {
        self.events.iter().rev().find_map(|e| match e {
            SurfaceEvent::Status(s) => Some(s.as_str()),
            _ => None,
        })
    }

    pub fn saw(&self, event: &SurfaceEvent) -> bool {
        self.events.contains(event)
    }
}

impl UiSurface for RecordingSurface {
    fn render_message(&mut self, message: &RenderedMessage<'_>, _scroll: bool) {
        self.events.push(SurfaceEvent::Message {
            content: message.content.to_string(),
            sender: message.sender,
        });
    }

    fn clear_messages(&mut self) {
        self.waiting_visible = false;
        self.events.push(SurfaceEvent::Cleared);
    }

    fn set_status_text(&mut self, text: &str) {
        self.events.push(SurfaceEvent::Status(text.to_string()));
    }

    fn show_waiting_banner(&mut self) {
        self.waiting_visible = true;
        self.events.push(SurfaceEvent::WaitingShown);
    }

    fn clear_waiting_banner(&mut self) {
        self.waiting_visible = false;
        self.events.push(SurfaceEvent::WaitingCleared);
    }

    fn show_closed_banner(&mut self) {
        self.events.push(SurfaceEvent::ClosedShown);
    }

    fn scroll_to_latest(&mut self) {
        self.events.push(SurfaceEvent::Scrolled);
    }
}

pub fn customer() -> UserIdentity {
    UserIdentity::new("7", "Ada Lovelace").with_email("ada@example.com")
}

//! Wire and domain types shared by the sync client and its collaborators.

use std::fmt;

use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

/// Longest message body the client will submit, in characters.
pub const MAX_MESSAGE_CHARS: usize = 500;

/// Server-assigned session identifier.
///
/// Opaque to the client. The service may encode it as a JSON number or a
/// string; both decode to the same textual form.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SessionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(serde_json::Number),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => SessionId(s),
            Raw::Number(n) => SessionId(n.to_string()),
        })
    }
}

/// Lifecycle status of a session as reported by the service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    /// No session exists for the user.
    #[serde(rename = "NONE")]
    Absent,
    /// Created, no staff member has joined yet.
    Waiting,
    /// A staff member is assigned.
    Active,
    /// Closed by the service. The identifier must not be reused.
    Closed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Absent => "NONE",
            SessionStatus::Waiting => "WAITING",
            SessionStatus::Active => "ACTIVE",
            SessionStatus::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who authored a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SenderType {
    Customer,
    Staff,
}

impl SenderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SenderType::Customer => "CUSTOMER",
            SenderType::Staff => "STAFF",
        }
    }
}

impl fmt::Display for SenderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response of the current-session lookup.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    #[serde(default)]
    pub has_session: bool,
    #[serde(default)]
    pub session_id: Option<SessionId>,
    #[serde(default)]
    pub status: Option<SessionStatus>,
    #[serde(default)]
    pub staff_name: Option<String>,
}

impl SessionSnapshot {
    /// Effective status. A session without a reported status is waiting.
    pub fn status(&self) -> SessionStatus {
        if !self.has_session {
            return SessionStatus::Absent;
        }
        self.status.unwrap_or(SessionStatus::Waiting)
    }

    /// The session id, if the snapshot describes a session that may be resumed.
    pub fn live_session_id(&self) -> Option<&SessionId> {
        match self.status() {
            SessionStatus::Waiting | SessionStatus::Active => self.session_id.as_ref(),
            SessionStatus::Absent | SessionStatus::Closed => None,
        }
    }
}

/// Response of create-session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedSession {
    pub session_id: SessionId,
    #[serde(default)]
    pub status: Option<SessionStatus>,
    #[serde(default)]
    pub staff_name: Option<String>,
}

/// A message as listed by the service, ordered by `id` ascending.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: u64,
    pub sender_type: SenderType,
    #[serde(default)]
    pub sender_name: String,
    pub content: String,
    #[serde(default)]
    pub timestamp: String,
}

/// Success body of send-message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendReceipt {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message_id: Option<u64>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// The signed-in customer on whose behalf the client talks to the service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub user_id: String,
    pub user_name: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl UserIdentity {
    pub fn new(user_id: impl Into<String>, user_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            user_name: user_name.into(),
            email: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// Local timestamp for optimistically rendered messages, in the service's
/// `LocalDateTime` format.
pub fn now_timestamp() -> String {
    Local::now()
        .naive_local()
        .format("%Y-%m-%dT%H:%M:%S%.3f")
        .to_string()
}

/// `HH:MM` for a service timestamp. Unparseable input is returned as-is.
pub fn display_time(timestamp: &str) -> String {
    if let Ok(dt) = DateTime::parse_from_rfc3339(timestamp) {
        return dt.with_timezone(&Local).format("%H:%M").to_string();
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(timestamp, fmt).ok())
        .map(|dt| dt.format("%H:%M").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

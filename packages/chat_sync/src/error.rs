/// Failures reported by a [`ChatService`](crate::ChatService).
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("chat service is unavailable")]
    Unavailable,

    #[error("chat service request timed out")]
    Timeout,

    #[error("chat service rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("failed to decode chat service response: {0}")]
    Decode(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ServiceError {
    /// True when the service says the session no longer exists.
    pub fn is_session_gone(&self) -> bool {
        match self {
            Self::Rejected { message, .. } => message.to_ascii_lowercase().contains("not found"),
            _ => false,
        }
    }
}

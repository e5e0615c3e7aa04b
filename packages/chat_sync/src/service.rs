use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ServiceError;
use crate::types::{
    ChatMessage, CreatedSession, SendReceipt, SenderType, SessionId, SessionSnapshot,
    UserIdentity,
};

/// A message on its way to the service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutgoingMessage<'a> {
    pub session_id: &'a SessionId,
    pub content: &'a str,
    pub sender_type: SenderType,
    pub sender_id: &'a str,
    pub sender_name: &'a str,
}

/// The remote chat session service.
///
/// Implementations carry the user's identity context (cookies, CSRF tokens)
/// themselves; the `user` arguments identify who the call is made for.
#[async_trait]
pub trait ChatService: Send + Sync {
    /// The user's current waiting/active session, if any.
    async fn current_session(&self, user: &UserIdentity) -> Result<SessionSnapshot, ServiceError>;

    /// Create a session, or return the one the service already holds for the user.
    async fn create_session(&self, user: &UserIdentity) -> Result<CreatedSession, ServiceError>;

    /// Every message of a session, ordered by id ascending.
    async fn messages(&self, session_id: &SessionId) -> Result<Vec<ChatMessage>, ServiceError>;

    async fn send_message(
        &self,
        message: &OutgoingMessage<'_>,
    ) -> Result<SendReceipt, ServiceError>;

    /// Mark the other party's messages read on behalf of `reader`.
    async fn mark_read(&self, session_id: &SessionId, reader: SenderType)
    -> Result<(), ServiceError>;

    async fn close_session(&self, session_id: &SessionId) -> Result<(), ServiceError>;
}

#[async_trait]
impl<T: ChatService + ?Sized> ChatService for Arc<T> {
    async fn current_session(&self, user: &UserIdentity) -> Result<SessionSnapshot, ServiceError> {
        (**self).current_session(user).await
    }

    async fn create_session(&self, user: &UserIdentity) -> Result<CreatedSession, ServiceError> {
        (**self).create_session(user).await
    }

    async fn messages(&self, session_id: &SessionId) -> Result<Vec<ChatMessage>, ServiceError> {
        (**self).messages(session_id).await
    }

    async fn send_message(
        &self,
        message: &OutgoingMessage<'_>,
    ) -> Result<SendReceipt, ServiceError> {
        (**self).send_message(message).await
    }

    async fn mark_read(&self, session_id: &SessionId, reader: SenderType)
    -> Result<(), ServiceError> {
        (**self).mark_read(session_id, reader).await
    }

    async fn close_session(&self, session_id: &SessionId) -> Result<(), ServiceError> {
        (**self).close_session(session_id).await
    }
}

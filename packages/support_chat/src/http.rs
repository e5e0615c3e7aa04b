//! reqwest-backed [`ChatService`] talking to the `/api/chat` endpoints.

use async_trait::async_trait;
use chat_sync::{
    ChatMessage, ChatService, CreatedSession, OutgoingMessage, SendReceipt, SenderType,
    ServiceError, SessionId, SessionSnapshot, UserIdentity,
};
use reqwest::{Method, RequestBuilder, Response, header};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::{CsrfToken, ServiceConfig};

pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

const API_PREFIX: &str = "/api/chat";

/// Classify a transport failure.
pub fn from_reqwest(err: reqwest::Error) -> ServiceError {
    if err.is_connect() {
        ServiceError::Unavailable
    } else if err.is_timeout() {
        ServiceError::Timeout
    } else if err.is_decode() {
        ServiceError::Decode(err.to_string())
    } else {
        ServiceError::Other(err.into())
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

pub struct HttpChatService {
    http: reqwest::Client,
    base_url: String,
    csrf: Option<CsrfToken>,
    cookie: Option<String>,
}

impl HttpChatService {
    pub fn new(config: &ServiceConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            csrf: config.csrf.clone(),
            cookie: config.cookie.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}{}", self.base_url, API_PREFIX, path);
        let request_id = Uuid::new_v4().to_string();
        debug!(%method, %url, %request_id, "chat service request");

        let mut req = self
            .http
            .request(method, url)
            .header(REQUEST_ID_HEADER, request_id)
            .header(header::ACCEPT, "application/json");
        if let Some(cookie) = &self.cookie {
            req = req.header(header::COOKIE, cookie);
        }
        if let Some(csrf) = &self.csrf {
            req = req.header(csrf.header.as_str(), csrf.token.as_str());
        }
        req
    }

    async fn execute(&self, req: RequestBuilder) -> Result<Response, ServiceError> {
        let resp = req.send().await.map_err(from_reqwest)?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ErrorBody>(&body) {
            Ok(parsed) => parsed.error,
            Err(_) if body.trim().is_empty() => status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string(),
            Err(_) => body.trim().to_string(),
        };
        warn!(status = status.as_u16(), %message, "chat service rejected request");
        Err(ServiceError::Rejected {
            status: status.as_u16(),
            message,
        })
    }

    async fn fetch_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ServiceError> {
        let resp = self.execute(req).await?;
        resp.json::<T>().await.map_err(|e| {
            if e.is_decode() {
                ServiceError::Decode(e.to_string())
            } else {
                from_reqwest(e)
            }
        })
    }
}

#[async_trait]
impl ChatService for HttpChatService {
    async fn current_session(&self, user: &UserIdentity) -> Result<SessionSnapshot, ServiceError> {
        debug!(user_id = %user.user_id, "fetching current session");
        self.fetch_json(self.request(Method::GET, "/session")).await
    }

    async fn create_session(&self, user: &UserIdentity) -> Result<CreatedSession, ServiceError> {
        debug!(user_id = %user.user_id, "starting session");
        self.fetch_json(self.request(Method::POST, "/start")).await
    }

    async fn messages(&self, session_id: &SessionId) -> Result<Vec<ChatMessage>, ServiceError> {
        let path = format!("/messages/{}", session_id);
        self.fetch_json(self.request(Method::GET, &path)).await
    }

    async fn send_message(
        &self,
        message: &OutgoingMessage<'_>,
    ) -> Result<SendReceipt, ServiceError> {
        let form = [
            ("sessionId", message.session_id.as_str()),
            ("content", message.content),
            ("senderType", message.sender_type.as_str()),
            ("senderId", message.sender_id),
            ("senderName", message.sender_name),
        ];
        let resp = self
            .execute(self.request(Method::POST, "/send").form(&form))
            .await?;

        // Any 2xx means the message was stored; the body only adds details.
        let body = resp.text().await.map_err(from_reqwest)?;
        let mut receipt = if body.trim().is_empty() {
            SendReceipt::default()
        } else {
            serde_json::from_str::<SendReceipt>(&body).unwrap_or_else(|e| {
                debug!(error = %e, "ignoring unreadable send receipt");
                SendReceipt::default()
            })
        };
        receipt.success = true;
        Ok(receipt)
    }

    async fn mark_read(&self, session_id: &SessionId, reader: SenderType) -> Result<(), ServiceError> {
        let path = format!("/read/{}", session_id);
        self.execute(
            self.request(Method::POST, &path)
                .query(&[("readerType", reader.as_str())]),
        )
        .await
        .map(drop)
    }

    async fn close_session(&self, session_id: &SessionId) -> Result<(), ServiceError> {
        let path = format!("/close/{}", session_id);
        self.execute(self.request(Method::POST, &path))
            .await
            .map(drop)
    }
}

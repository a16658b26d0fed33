//! reqwest implementation of the backend gateway port
//!
//! Pure I/O: request building, status mapping and body decoding. Session
//! state, the busy flag and placeholder handling all live in the
//! application layer.

use crate::http::auth::AuthTokenSource;
use crate::http::decode::Utf8Carry;
use async_trait::async_trait;
use futures::StreamExt;
use parley_application::{BackendGateway, GatewayError, SendMessageRequest, StreamHandle};
use parley_domain::{
    ChannelId, ChannelSnapshot, ChatId, ConsensusProfile, RemoteChat, RemoteChatDetail,
    RemoteMessage, StreamEvent,
};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Channel capacity for decoded stream chunks.
const STREAM_BUFFER: usize = 32;

/// HTTP adapter for the chat backend.
pub struct HttpBackendGateway {
    client: reqwest::Client,
    base_url: String,
    auth: Arc<dyn AuthTokenSource>,
}

impl HttpBackendGateway {
    pub fn new(
        base_url: impl Into<String>,
        auth: Arc<dyn AuthTokenSource>,
        timeout: Option<Duration>,
    ) -> Result<Self, GatewayError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            // Only non-streaming requests get the overall timeout; the
            // chunked stream must stay open as long as the model talks.
            builder = builder.connect_timeout(timeout).read_timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| GatewayError::ConnectionError(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.client.request(method, self.url(path));
        if let Some(token) = self.auth.token() {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn execute(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, GatewayError> {
        let response = builder.send().await.map_err(transport_error)?;
        check_status(response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        let response = self.execute(self.request(Method::GET, path)).await?;
        decode_json(response).await
    }
}

fn transport_error(e: reqwest::Error) -> GatewayError {
    if e.is_connect() || e.is_timeout() {
        GatewayError::ConnectionError(e.to_string())
    } else {
        GatewayError::RequestFailed(e.to_string())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayError::Unauthorized,
        StatusCode::NOT_FOUND => GatewayError::NotFound(response.url().path().to_string()),
        _ => {
            let body = response.text().await.unwrap_or_default();
            GatewayError::RequestFailed(format!("{status}: {body}"))
        }
    })
}

async fn decode_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, GatewayError> {
    response
        .json()
        .await
        .map_err(|e| GatewayError::InvalidBody(e.to_string()))
}

#[async_trait]
impl BackendGateway for HttpBackendGateway {
    async fn create_chat(
        &self,
        name: Option<&str>,
        default_model: &str,
    ) -> Result<RemoteChat, GatewayError> {
        let body = serde_json::json!({
            "name": name,
            "default_model": default_model,
        });
        let response = self
            .execute(self.request(Method::POST, "/chats").json(&body))
            .await?;
        decode_json(response).await
    }

    async fn list_chats(&self) -> Result<Vec<RemoteChat>, GatewayError> {
        self.get_json("/chats").await
    }

    async fn fetch_chat(&self, chat: &ChatId) -> Result<RemoteChatDetail, GatewayError> {
        self.get_json(&format!("/chats/{chat}")).await
    }

    async fn delete_chat(&self, chat: &ChatId) -> Result<(), GatewayError> {
        self.execute(self.request(Method::DELETE, &format!("/chats/{chat}")))
            .await?;
        Ok(())
    }

    async fn send_message(
        &self,
        chat: &ChatId,
        request: &SendMessageRequest,
    ) -> Result<RemoteMessage, GatewayError> {
        let response = self
            .execute(
                self.request(Method::POST, &format!("/chats/{chat}/messages"))
                    .json(request),
            )
            .await?;
        decode_json(response).await
    }

    async fn stream_message(
        &self,
        chat: &ChatId,
        request: &SendMessageRequest,
        cancel: CancellationToken,
    ) -> Result<StreamHandle, GatewayError> {
        let response = self
            .execute(
                self.request(Method::POST, &format!("/chats/{chat}/messages/stream"))
                    .json(request),
            )
            .await?;

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        tokio::spawn(async move {
            let mut body = response.bytes_stream();
            let mut decoder = Utf8Carry::new();
            let mut full = String::new();
            loop {
                let chunk = tokio::select! {
                    _ = cancel.cancelled() => {
                        // Dropping the body aborts the in-flight read.
                        debug!("streaming read aborted by cancellation");
                        return;
                    }
                    chunk = body.next() => chunk,
                };
                match chunk {
                    Some(Ok(bytes)) => {
                        let text = decoder.push(&bytes);
                        if !text.is_empty() {
                            full.push_str(&text);
                            if tx.send(StreamEvent::Delta(text)).await.is_err() {
                                return;
                            }
                        }
                    }
                    Some(Err(e)) => {
                        let _ = tx.send(StreamEvent::Error(e.to_string())).await;
                        return;
                    }
                    None => {
                        let tail = decoder.finish();
                        if !tail.is_empty() {
                            full.push_str(&tail);
                            if tx.send(StreamEvent::Delta(tail)).await.is_err() {
                                return;
                            }
                        }
                        let _ = tx.send(StreamEvent::Completed(full)).await;
                        return;
                    }
                }
            }
        });
        Ok(StreamHandle::new(rx))
    }

    async fn list_messages(&self, chat: &ChatId) -> Result<Vec<RemoteMessage>, GatewayError> {
        self.get_json(&format!("/chats/{chat}/messages")).await
    }

    async fn channel_status(&self, channel: &ChannelId) -> Result<ChannelSnapshot, GatewayError> {
        self.get_json(&format!("/channels/{channel}")).await
    }

    async fn cancel_generation(&self, chat: &ChatId) -> Result<(), GatewayError> {
        self.execute(self.request(Method::POST, &format!("/chats/{chat}/cancel")))
            .await?;
        Ok(())
    }

    async fn list_profiles(&self) -> Result<Vec<ConsensusProfile>, GatewayError> {
        self.get_json("/profiles").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::auth::StaticToken;

    fn gateway(base: &str, token: Option<&str>) -> HttpBackendGateway {
        let auth: Arc<dyn AuthTokenSource> = match token {
            Some(t) => Arc::new(StaticToken::new(t)),
            None => Arc::new(StaticToken::anonymous()),
        };
        HttpBackendGateway::new(base, auth, None).unwrap()
    }

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let gw = gateway("http://localhost:8000/", None);
        assert_eq!(gw.url("/chats"), "http://localhost:8000/chats");
    }

    #[test]
    fn bearer_token_is_attached() {
        let gw = gateway("http://localhost:8000", Some("secret"));
        let request = gw.request(Method::GET, "/chats").build().unwrap();
        let auth = request.headers().get("authorization").unwrap();
        assert_eq!(auth.to_str().unwrap(), "Bearer secret");
    }

    #[test]
    fn anonymous_requests_have_no_auth_header() {
        let gw = gateway("http://localhost:8000", None);
        let request = gw.request(Method::GET, "/chats").build().unwrap();
        assert!(request.headers().get("authorization").is_none());
    }
}

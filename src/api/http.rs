//! reqwest-backed implementation of `TranslationApi`.
//! Pooled client, bearer token taken from an injected `AuthSession`,
//! non-2xx bodies turned into `ApiError::Api` with the server's message.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::{
    FlashcardsRequest, FlashcardsResponse, HistoryPage, TranslateBody, TranslateResponse,
    TranslationApi,
};
use crate::config::ClientConfig;
use crate::error::{ApiError, ApiResult};
use crate::history::HistoryEntry;

const FALLBACK_ERROR_MESSAGE: &str = "An error occurred";

/// Access token holder. Login, refresh and logout are owned by whoever holds the
/// `Arc`; the client only reads the token when building a request.
#[derive(Debug, Default)]
pub struct AuthSession {
    access_token: RwLock<Option<String>>,
}

impl AuthSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            access_token: RwLock::new(Some(token.into())),
        }
    }

    pub fn set_token(&self, token: impl Into<String>) {
        *self.access_token.write() = Some(token.into());
    }

    pub fn clear(&self) {
        *self.access_token.write() = None;
    }

    pub fn token(&self) -> Option<String> {
        self.access_token.read().clone()
    }
}

pub struct HttpApiClient {
    http: reqwest::Client,
    base_url: String,
    auth: Arc<AuthSession>,
}

impl HttpApiClient {
    pub fn new(config: &ClientConfig, auth: Arc<AuthSession>) -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            auth,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{}", self.base_url, path));
        match self.auth.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> ApiResult<T> {
        let response = self.send(builder).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn send(&self, builder: RequestBuilder) -> ApiResult<Response> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            debug!(status = status.as_u16(), url = %response.url(), "api_ok");
            return Ok(response);
        }
        let err = error_from_response(response).await;
        warn!(status = status.as_u16(), error = %err, "api_error");
        Err(err)
    }
}

/// Build an `ApiError::Api` from a failed response, pulling the human readable
/// message out of `message`, `error` or `detail`.
async fn error_from_response(response: Response) -> ApiError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let data = serde_json::from_str::<serde_json::Value>(&body).ok();

    let message = data
        .as_ref()
        .and_then(|value| {
            ["message", "error", "detail"]
                .iter()
                .find_map(|field| value.get(*field).and_then(|v| v.as_str()))
        })
        .filter(|m| !m.is_empty())
        .unwrap_or(FALLBACK_ERROR_MESSAGE)
        .to_string();

    ApiError::Api {
        message,
        status: Some(status),
        data,
    }
}

#[async_trait]
impl TranslationApi for HttpApiClient {
    async fn translate(&self, body: &TranslateBody) -> ApiResult<TranslateResponse> {
        self.send_json(self.request(Method::POST, "/translate").json(body))
            .await
    }

    async fn history_page(&self, page: u32, limit: u32) -> ApiResult<HistoryPage> {
        let path = format!("/translations/history?page={page}&limit={limit}");
        self.send_json(self.request(Method::GET, &path)).await
    }

    async fn update_translation(&self, id: i64, output_text: &str) -> ApiResult<HistoryEntry> {
        let body = serde_json::json!({ "output_text": output_text });
        let path = format!("/translations/{id}");
        self.send_json(self.request(Method::PATCH, &path).json(&body))
            .await
    }

    async fn delete_translation(&self, id: i64) -> ApiResult<()> {
        let path = format!("/translations/{id}");
        self.send(self.request(Method::DELETE, &path)).await?;
        Ok(())
    }

    async fn flashcards(&self, request: &FlashcardsRequest) -> ApiResult<FlashcardsResponse> {
        self.send_json(self.request(Method::POST, "/translations/flashcards").json(request))
            .await
    }
}

use reqwest::{multipart::Form, Client, Response};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use shared::error::ApiError;
use tracing::debug;

use crate::{config::Settings, error::ClientError};

/// Thin JSON-over-HTTP client for the ordering backend. Every endpoint is a
/// POST under one base URL.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(settings: &Settings) -> Result<Self, ClientError> {
        settings.validate()?;

        let mut builder = Client::builder();
        if let Some(timeout) = settings.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build http client: {e}")))?;

        Ok(Self {
            http,
            base_url: settings.api_base().to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn post_json<B, R>(&self, route: &'static str, body: &B) -> Result<R, ClientError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let text = self.post_json_text(route, body).await?;
        serde_json::from_str(&text).map_err(|source| ClientError::Decode { route, source })
    }

    /// Posts and only checks the status; acknowledgement bodies are not read
    /// into any type.
    pub async fn post_json_ack<B>(&self, route: &'static str, body: &B) -> Result<(), ClientError>
    where
        B: Serialize + ?Sized,
    {
        self.post_json_text(route, body).await.map(|_| ())
    }

    /// Posts and reads a successful body as JSON when it is JSON. Empty or
    /// non-JSON bodies come back as `Value::Null` instead of an error.
    pub async fn post_json_lenient<B>(
        &self,
        route: &'static str,
        body: &B,
    ) -> Result<Value, ClientError>
    where
        B: Serialize + ?Sized,
    {
        let text = self.post_json_text(route, body).await?;
        Ok(serde_json::from_str(&text).unwrap_or(Value::Null))
    }

    pub async fn post_multipart<R>(&self, route: &'static str, form: Form) -> Result<R, ClientError>
    where
        R: DeserializeOwned,
    {
        debug!(route, "posting multipart form");
        let response = self
            .http
            .post(format!("{}{route}", self.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(|source| ClientError::Transport { route, source })?;
        let text = read_success_body(route, response).await?;
        serde_json::from_str(&text).map_err(|source| ClientError::Decode { route, source })
    }

    async fn post_json_text<B>(&self, route: &'static str, body: &B) -> Result<String, ClientError>
    where
        B: Serialize + ?Sized,
    {
        debug!(route, "posting json request");
        let response = self
            .http
            .post(format!("{}{route}", self.base_url))
            .json(body)
            .send()
            .await
            .map_err(|source| ClientError::Transport { route, source })?;
        read_success_body(route, response).await
    }
}

async fn read_success_body(route: &'static str, response: Response) -> Result<String, ClientError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|source| ClientError::Transport { route, source })?;

    if !status.is_success() {
        let message = ApiError::from_body(&text)
            .map(|api_error| api_error.message)
            .unwrap_or(text);
        return Err(ClientError::Status {
            route,
            status,
            message,
        });
    }

    Ok(text)
}

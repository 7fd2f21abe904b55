//! Thin reqwest wrapper shared by every API component.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::endpoints::{BearerToken, CloudEndpoints};
use crate::error::{ClientError, Result};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// `{"items": [...]}` envelope used by most management and search responses.
#[derive(Debug, Deserialize)]
pub(crate) struct Items<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

impl<T> Items<T> {
    pub fn into_first(self, context: &str) -> Result<T> {
        self.items
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::malformed(context, "response contained no items"))
    }
}

#[derive(Clone)]
pub struct CloudClient {
    client: Client,
    endpoints: CloudEndpoints,
}

impl CloudClient {
    pub fn new(endpoints: CloudEndpoints, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ClientError::http("build HTTP client"))?;
        Ok(Self { client, endpoints })
    }

    pub fn endpoints(&self) -> &CloudEndpoints {
        &self.endpoints
    }

    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    /// Attaches the bearer token and JSON accept header.
    pub(crate) fn authorized(&self, request: RequestBuilder, token: &BearerToken) -> RequestBuilder {
        request
            .bearer_auth(token.secret())
            .header(reqwest::header::ACCEPT, "application/json")
    }

    pub(crate) async fn send(&self, request: RequestBuilder, context: &str) -> Result<Response> {
        let response = request.send().await.map_err(ClientError::http(context))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|err| format!("<unreadable response body: {err}>"));
        Err(ClientError::Status {
            context: context.to_string(),
            status,
            body,
        })
    }

    pub(crate) async fn send_json<T>(&self, request: RequestBuilder, context: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let response = self.send(request, context).await?;
        let body = response.text().await.map_err(ClientError::http(context))?;
        serde_json::from_str(&body).map_err(|err| ClientError::malformed(context, err.to_string()))
    }

    pub(crate) async fn send_text(&self, request: RequestBuilder, context: &str) -> Result<String> {
        let response = self.send(request, context).await?;
        response.text().await.map_err(ClientError::http(context))
    }

    pub(crate) async fn send_unit(&self, request: RequestBuilder, context: &str) -> Result<()> {
        self.send(request, context).await.map(|_| ())
    }
}

use serde::Deserialize;
use tracing::{debug, info};

use crate::endpoints::{BearerToken, ClientCredentials};
use crate::error::{ClientError, Result};
use crate::http::CloudClient;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// Exchanges client credentials for a bearer token. Failures are final; there is no retry.
pub struct Authenticator<'a> {
    client: &'a CloudClient,
}

impl<'a> Authenticator<'a> {
    pub fn new(client: &'a CloudClient) -> Self {
        Self { client }
    }

    pub async fn exchange(&self, credentials: &ClientCredentials) -> Result<BearerToken> {
        credentials.validate()?;

        let endpoints = self.client.endpoints();
        let request = self
            .client
            .http()
            .post(endpoints.token_url.clone())
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.as_str()),
                ("audience", endpoints.audience.as_str()),
            ]);

        let context = "obtain bearer token";
        let response: TokenResponse = self.client.send_json(request, context).await?;
        let token = response
            .access_token
            .filter(|token| !token.is_empty())
            .map(BearerToken::new)
            .ok_or_else(|| ClientError::malformed(context, "missing 'access_token'"))?;

        info!("bearer token obtained");
        debug!(token = %token.preview(), "bearer token preview");
        Ok(token)
    }
}

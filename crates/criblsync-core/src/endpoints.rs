use std::fmt;

use url::Url;

use crate::error::{ClientError, Result};

pub const DEFAULT_TOKEN_URL: &str = "https://login.cribl.cloud/oauth/token";
pub const DEFAULT_AUDIENCE: &str = "https://api.cribl.cloud";

/// Roots of the token and REST endpoints a [`crate::http::CloudClient`] talks to.
///
/// `api_root` is the `.../api/v1/` prefix; workspace- and group-scoped routes hang off
/// `m/<scope>/` and leader routes off `master/`.
#[derive(Debug, Clone)]
pub struct CloudEndpoints {
    pub token_url: Url,
    pub audience: String,
    pub api_root: Url,
}

impl CloudEndpoints {
    pub fn new(token_url: Url, audience: impl Into<String>, api_root: Url) -> Self {
        Self {
            token_url,
            audience: audience.into(),
            api_root,
        }
    }

    /// Search API of an organization: `https://<org>.cribl.cloud/api/v1/`.
    pub fn search(organization_id: &str) -> Result<Self> {
        require("organization id", organization_id)?;
        let api_root = parse_url(&format!("https://{organization_id}.cribl.cloud/api/v1/"))?;
        Ok(Self::new(parse_url(DEFAULT_TOKEN_URL)?, DEFAULT_AUDIENCE, api_root))
    }

    /// Management API of an organization's main workspace.
    pub fn management(organization_id: &str) -> Result<Self> {
        require("organization id", organization_id)?;
        let api_root = parse_url(&format!(
            "https://app.cribl.cloud/organizations/{organization_id}/workspaces/main/app/api/v1/"
        ))?;
        Ok(Self::new(parse_url(DEFAULT_TOKEN_URL)?, DEFAULT_AUDIENCE, api_root))
    }

    /// `<api_root>/m/<scope>/<segments...>`
    pub fn scoped_url(&self, scope: &str, segments: &[&str]) -> Result<Url> {
        self.build(|path| {
            path.push("m").push(scope).extend(segments);
        })
    }

    /// `<api_root>/master/<segments...>`
    pub fn master_url(&self, segments: &[&str]) -> Result<Url> {
        self.build(|path| {
            path.push("master").extend(segments);
        })
    }

    fn build(&self, extend: impl FnOnce(&mut url::PathSegmentsMut<'_>)) -> Result<Url> {
        let mut url = self.api_root.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                ClientError::Config(format!("API root {} cannot be used as a base", self.api_root))
            })?;
            path.pop_if_empty();
            extend(&mut path);
        }
        Ok(url)
    }
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|err| ClientError::Config(format!("invalid URL {raw}: {err}")))
}

pub(crate) fn require(name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ClientError::Config(format!(
            "{name} must be provided via arguments or configuration file"
        )));
    }
    Ok(())
}

/// Client-credentials pair. `Debug` never prints the secret.
#[derive(Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl ClientCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() || self.client_secret.trim().is_empty() {
            return Err(ClientError::Config(
                "client id and client secret must be provided via arguments or configuration file"
                    .into(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }

    /// First ten characters, for log lines.
    pub fn preview(&self) -> String {
        self.0.chars().take(10).collect()
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BearerToken({}...)", self.preview())
    }
}

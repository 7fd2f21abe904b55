//! Lookup file staging and catalog writes for one worker group.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::endpoints::BearerToken;
use crate::error::{ClientError, Result};
use crate::http::{CloudClient, Items};

/// A local lookup file and the id it is published under (its file name).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupFile {
    pub id: String,
    pub path: PathBuf,
}

impl LookupFile {
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let id = path
            .file_name()
            .and_then(|name| name.to_str())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                ClientError::Config(format!("lookup filename {} has no file name", path.display()))
            })?
            .to_string();
        Ok(Self { id, path })
    }

    /// Text before the first `.`; staged names must start with it.
    pub fn base_name(&self) -> &str {
        self.id.split('.').next().unwrap_or(&self.id)
    }

    pub fn content_type(&self) -> &'static str {
        if self.id.ends_with(".csv") {
            "text/csv"
        } else {
            "application/gzip"
        }
    }

    pub fn is_gzip(&self) -> bool {
        self.id.ends_with(".gz")
    }

    /// The `.yml` metadata file that sits next to the lookup in the group's config tree.
    pub fn metadata_id(&self) -> String {
        Path::new(&self.id)
            .with_extension("yml")
            .to_string_lossy()
            .into_owned()
    }

    /// Reads the upload body; `.gz` files are decompressed first.
    pub fn read_body(&self) -> Result<Vec<u8>> {
        if self.is_gzip() {
            let mut decoder = GzDecoder::new(File::open(&self.path)?);
            let mut body = Vec::new();
            decoder.read_to_end(&mut body)?;
            Ok(body)
        } else {
            Ok(fs::read(&self.path)?)
        }
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    filename: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CatalogItem {
    id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LookupBody<'a> {
    id: &'a str,
    file_info: FileInfo<'a>,
}

#[derive(Debug, Serialize)]
struct FileInfo<'a> {
    filename: &'a str,
}

pub struct LookupCatalog<'a> {
    client: &'a CloudClient,
    token: &'a BearerToken,
    group: &'a str,
}

impl<'a> LookupCatalog<'a> {
    pub fn new(client: &'a CloudClient, token: &'a BearerToken, group: &'a str) -> Self {
        Self {
            client,
            token,
            group,
        }
    }

    /// Stages the file and returns the temporary filename assigned by the server.
    pub async fn upload(&self, lookup: &LookupFile) -> Result<String> {
        let body = self.lookup_body(lookup)?;
        let url = self
            .client
            .endpoints()
            .scoped_url(self.group, &["system", "lookups"])?;
        let request = self
            .client
            .authorized(self.client.http().put(url), self.token)
            .query(&[("filename", lookup.id.as_str())])
            .header(CONTENT_TYPE, lookup.content_type())
            .body(body);

        let context = format!("upload '{}' to {}", lookup.id, self.group);
        let response: UploadResponse = self.client.send_json(request, &context).await?;
        let temp_filename = response
            .filename
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ClientError::malformed(&context, "missing 'filename'"))?;

        if !temp_filename.starts_with(lookup.base_name()) {
            return Err(ClientError::malformed(
                &context,
                format!("unexpected temporary filename '{temp_filename}'"),
            ));
        }

        info!(lookup = %lookup.id, group = self.group, temp_filename = %temp_filename, "lookup uploaded");
        Ok(temp_filename)
    }

    /// True when the group's catalog holds a lookup whose id equals `lookup_id` exactly.
    pub async fn exists(&self, lookup_id: &str) -> Result<bool> {
        let url = self
            .client
            .endpoints()
            .scoped_url(self.group, &["system", "lookups", lookup_id])?;
        let request = self.client.authorized(self.client.http().get(url), self.token);

        let context = format!("check lookup '{lookup_id}' in {}", self.group);
        let catalog: Items<CatalogItem> = self.client.send_json(request, &context).await?;
        Ok(catalog
            .items
            .iter()
            .any(|item| item.id.as_deref() == Some(lookup_id)))
    }

    pub async fn create(&self, lookup_id: &str, temp_filename: &str) -> Result<()> {
        let url = self
            .client
            .endpoints()
            .scoped_url(self.group, &["system", "lookups"])?;
        let request = self
            .client
            .authorized(self.client.http().post(url), self.token)
            .json(&LookupBody::new(lookup_id, temp_filename));

        self.client
            .send_unit(request, &format!("create lookup '{lookup_id}' in {}", self.group))
            .await?;
        info!(lookup = lookup_id, group = self.group, "created new lookup");
        Ok(())
    }

    pub async fn update(&self, lookup_id: &str, temp_filename: &str) -> Result<()> {
        let url = self
            .client
            .endpoints()
            .scoped_url(self.group, &["system", "lookups", lookup_id])?;
        let request = self
            .client
            .authorized(self.client.http().patch(url), self.token)
            .json(&LookupBody::new(lookup_id, temp_filename));

        self.client
            .send_unit(request, &format!("update lookup '{lookup_id}' in {}", self.group))
            .await?;
        info!(lookup = lookup_id, group = self.group, "updated existing lookup");
        Ok(())
    }

    fn lookup_body(&self, lookup: &LookupFile) -> Result<Vec<u8>> {
        lookup.read_body().map_err(|err| match err {
            ClientError::Io(source) => ClientError::Config(format!(
                "failed to read lookup file {}: {source}",
                lookup.path.display()
            )),
            other => other,
        })
    }
}

impl<'a> LookupBody<'a> {
    fn new(id: &'a str, filename: &'a str) -> Self {
        Self {
            id,
            file_info: FileInfo { filename },
        }
    }
}

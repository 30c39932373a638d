//! # Schema Fetching
//!
//! [`SchemaFetcher`] turns a schema identifier into schema text. Local
//! files are read with `tokio::fs`; `http`/`https` schemas are fetched
//! with a shared `reqwest::Client`. A non-2xx response is a failure.
//!
//! The fetcher does no caching. Each compiled schema is fetched once per
//! run by the service's compile cache.

use std::path::{Path, PathBuf};

use url::Url;

use crate::config::FetchConfig;
use crate::error::SchemaError;
use crate::paths::{resolve_identifier, SchemaLocation};

/// Loads schema text from disk or over HTTP.
#[derive(Debug, Clone)]
pub struct SchemaFetcher {
    root: Option<PathBuf>,
    http: reqwest::Client,
}

impl SchemaFetcher {
    /// Build a fetcher. `root` anchors relative identifiers.
    pub fn new(root: Option<PathBuf>, config: &FetchConfig) -> Result<Self, SchemaError> {
        Ok(Self {
            root,
            http: config.build_client()?,
        })
    }

    /// Build a fetcher around an existing client.
    pub fn with_client(root: Option<PathBuf>, http: reqwest::Client) -> Self {
        Self { root, http }
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Resolve an identifier without fetching it.
    pub fn locate(&self, identifier: &str) -> Result<SchemaLocation, SchemaError> {
        resolve_identifier(self.root(), identifier)
    }

    /// Fetch the text of the schema named by `identifier`.
    pub async fn fetch(&self, identifier: &str) -> Result<String, SchemaError> {
        let location = self.locate(identifier)?;
        self.fetch_location(&location).await
    }

    /// Fetch the text at an already-resolved location.
    pub async fn fetch_location(&self, location: &SchemaLocation) -> Result<String, SchemaError> {
        match location {
            SchemaLocation::File(path) => {
                tracing::debug!(path = %path.display(), "reading schema file");
                tokio::fs::read_to_string(path)
                    .await
                    .map_err(|source| SchemaError::Read {
                        path: path.clone(),
                        source,
                    })
            }
            SchemaLocation::Remote(url) => self.fetch_remote(url).await,
        }
    }

    async fn fetch_remote(&self, url: &Url) -> Result<String, SchemaError> {
        tracing::debug!(url = %url, "fetching remote schema");
        let resp = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|source| SchemaError::Fetch {
                identifier: url.to_string(),
                source,
            })?;

        if !resp.status().is_success() {
            return Err(SchemaError::HttpStatus {
                identifier: url.to_string(),
                status: resp.status().as_u16(),
            });
        }

        resp.text().await.map_err(|source| SchemaError::Fetch {
            identifier: url.to_string(),
            source,
        })
    }
}

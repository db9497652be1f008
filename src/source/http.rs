use anyhow::{Context, Result};
use regex::Regex;
use std::path::PathBuf;
use std::sync::Arc;

use super::{FetchContext, Installable};
use crate::core::FabError;
use crate::locator::locator_to_path;
use crate::manifest::decode_documents;
use crate::utils::fs::{atomic_write, remove_path};

/// A single YAML manifest served over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpSource {
    url: String,
    ctx: Arc<FetchContext>,
}

impl HttpSource {
    pub fn new(url: impl Into<String>, ctx: Arc<FetchContext>) -> Self {
        Self {
            url: url.into(),
            ctx,
        }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Check that a downloaded body is a well-formed YAML document stream.
pub fn validate_yaml_body(url: &str, body: &[u8]) -> Result<()> {
    decode_documents(body)
        .map(|_| ())
        .with_context(|| format!("Response from {url} is not valid YAML"))
}

impl Installable for HttpSource {
    fn validate(&self) -> Result<()> {
        let re = Regex::new(r"(?i)^https?://.+$")?;
        if !re.is_match(&self.url) {
            return Err(FabError::InvalidSource {
                component: self.url.clone(),
                reason: "url must start with http:// or https://".to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn install_path(&self) -> Result<PathBuf> {
        self.validate()?;
        self.ctx.destination(&locator_to_path(&self.url)?)
    }

    async fn install(&self) -> Result<()> {
        let dest = self.install_path()?;
        remove_path(&dest)?;

        let network_error = |reason: String| FabError::NetworkError {
            operation: format!("GET {}", self.url),
            reason,
        };
        let response =
            self.ctx.http().get(&self.url).send().await.map_err(|e| network_error(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(network_error(format!("server responded with {status}")).into());
        }
        let body = response.bytes().await.map_err(|e| network_error(e.to_string()))?;

        validate_yaml_body(&self.url, &body)?;
        atomic_write(&dest, &body)?;
        tracing::debug!("Downloaded {} ({} bytes) into {}", self.url, body.len(), dest.display());
        Ok(())
    }
}

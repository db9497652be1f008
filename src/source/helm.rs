use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use super::{FetchContext, Installable, check_coordinate};
use crate::constants::LATEST_VERSION;
use crate::core::FabError;
use crate::helm;
use crate::locator::locator_to_path;
use crate::utils::fs::move_dir;

/// A chart in a chart repository.
#[derive(Debug, Clone)]
pub struct HelmSource {
    url: String,
    chart: String,
    version: Option<String>,
    ctx: Arc<FetchContext>,
}

impl HelmSource {
    pub fn new(
        url: impl Into<String>,
        chart: impl Into<String>,
        version: Option<String>,
        ctx: Arc<FetchContext>,
    ) -> Self {
        Self {
            url: url.into(),
            chart: chart.into(),
            version: version.filter(|v| !v.is_empty()),
            ctx,
        }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn chart(&self) -> &str {
        &self.chart
    }
}

impl Installable for HelmSource {
    fn validate(&self) -> Result<()> {
        let reason = if self.url.trim().is_empty() {
            "helm repository url must not be empty"
        } else if self.chart.trim().is_empty() {
            "helm chart name must not be empty"
        } else {
            let shown = format!("{}/{}", self.url, self.chart);
            check_coordinate(&self.chart, "chart", &shown)?;
            if let Some(version) = &self.version {
                check_coordinate(version, "chart version", &shown)?;
            }
            return Ok(());
        };
        Err(FabError::InvalidSource {
            component: format!("{}/{}", self.url, self.chart),
            reason: reason.to_string(),
        }
        .into())
    }

    fn install_path(&self) -> Result<PathBuf> {
        self.validate()?;
        let relative = locator_to_path(&self.url)?
            .join(&self.chart)
            .join(self.version.as_deref().unwrap_or(LATEST_VERSION));
        self.ctx.destination(&relative)
    }

    async fn install(&self) -> Result<()> {
        let dest = self.install_path()?;

        let staging = tempfile::TempDir::new().context("Failed to create temporary directory for helm pull")?;
        let extracted = helm::pull(
            &self.url,
            &self.chart,
            self.version.as_deref(),
            staging.path(),
            self.ctx.helm_timeout(),
        )
        .await?;

        move_dir(&extracted, &dest).with_context(|| {
            format!("Failed to move chart {} into {}", self.chart, dest.display())
        })?;
        tracing::debug!(target: "helm", "Pulled {} into {}", self.chart, dest.display());
        Ok(())
    }
}

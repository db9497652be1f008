use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{Generatable, collect_yaml_files, require_exists, write_output};
use crate::constants::{DEFAULT_HELM_TIMEOUT, PRE_INSTALL_DIR_NAME};
use crate::helm::{self, TemplateOptions};
use crate::manifest::{
    Mapping, Origin, RenderedDocument, Value, decode_documents, encode_documents, inject_namespace,
    merge_rendered, namespace_document,
};

/// A chart rendered with `helm template`.
///
/// The documents under the chart's `crds/` directory are not emitted by
/// `helm template`; they are collected separately and placed ahead of the
/// templated documents.
#[derive(Debug, Clone)]
pub struct HelmGenerator {
    chart_path: PathBuf,
    output: PathBuf,
    release: String,
    component: String,
    values: Mapping,
    namespace: Option<String>,
    inject_namespace: bool,
    timeout: Duration,
}

impl HelmGenerator {
    pub fn new(chart_path: impl Into<PathBuf>, output: impl Into<PathBuf>, release: impl Into<String>) -> Self {
        let release = release.into();
        Self {
            chart_path: chart_path.into(),
            output: output.into(),
            component: release.clone(),
            release,
            values: Mapping::new(),
            namespace: None,
            inject_namespace: false,
            timeout: DEFAULT_HELM_TIMEOUT,
        }
    }

    /// Logical path the rendered documents are attributed to.
    #[must_use]
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = component.into();
        self
    }

    #[must_use]
    pub fn with_values(mut self, values: Mapping) -> Self {
        self.values = values;
        self
    }

    #[must_use]
    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace;
        self
    }

    #[must_use]
    pub const fn with_inject_namespace(mut self, inject: bool) -> Self {
        self.inject_namespace = inject;
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn chart_path(&self) -> &Path {
        &self.chart_path
    }

    #[must_use]
    pub fn release(&self) -> &str {
        &self.release
    }

    /// `helm template` options for a given values file.
    #[must_use]
    pub fn template_options(&self, values_file: &Path) -> TemplateOptions {
        TemplateOptions {
            release: Some(self.release.clone()),
            chart: self.chart_path.display().to_string(),
            namespace: self.namespace.clone(),
            values: vec![values_file.to_path_buf()],
            ..TemplateOptions::default()
        }
    }

    /// Decoded documents from the chart's pre-install directory, if any.
    pub fn pre_install_documents(&self) -> Result<Vec<Value>> {
        let dir = self.chart_path.join(PRE_INSTALL_DIR_NAME);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut documents = Vec::new();
        for file in collect_yaml_files(&dir)? {
            let bytes = std::fs::read(&file).with_context(|| format!("Failed to read {}", file.display()))?;
            documents.extend(
                decode_documents(&bytes).with_context(|| format!("Failed to decode {}", file.display()))?,
            );
        }
        Ok(documents)
    }

    /// Merge pre-install ahead of templated documents and apply the namespace.
    ///
    /// With namespace injection on, every document is placed in the namespace
    /// and a `Namespace` document for it is prepended unless the chart
    /// already renders one.
    pub fn finalize(&self, pre_install: Vec<Value>, templated: Vec<Value>) -> Result<Vec<RenderedDocument>> {
        let mut documents = merge_rendered(&self.component, pre_install, templated);
        let Some(namespace) = self.namespace.as_deref().filter(|_| self.inject_namespace) else {
            return Ok(documents);
        };

        for rendered in &mut documents {
            inject_namespace(&mut rendered.document, namespace)
                .with_context(|| format!("Failed to set namespace for release {}", self.release))?;
        }
        if !documents.iter().any(|rendered| declares_namespace(&rendered.document, namespace)) {
            documents.insert(
                0,
                RenderedDocument {
                    component: self.component.clone(),
                    origin: Origin::Generated,
                    document: namespace_document(namespace),
                },
            );
        }
        Ok(documents)
    }
}

fn declares_namespace(document: &Value, name: &str) -> bool {
    document.pointer(&["kind"]).and_then(Value::as_str) == Some("Namespace")
        && document.pointer(&["metadata", "name"]).and_then(Value::as_str) == Some(name)
}

fn count(documents: &[RenderedDocument], origin: Origin) -> usize {
    documents.iter().filter(|rendered| rendered.origin == origin).count()
}

impl Generatable for HelmGenerator {
    fn validate(&self) -> Result<()> {
        require_exists(&self.chart_path, "helm chart")
    }

    fn generate_path(&self) -> &Path {
        &self.output
    }

    async fn generate(&self) -> Result<usize> {
        let mut values_file = tempfile::Builder::new()
            .prefix("fab-values-")
            .suffix(".yaml")
            .tempfile()
            .context("Failed to create temporary helm values file")?;
        let values = serde_yaml::to_string(&self.values).context("Failed to encode helm values")?;
        values_file.write_all(values.as_bytes()).context("Failed to write temporary helm values file")?;
        values_file.flush()?;

        let pre_install = self.pre_install_documents()?;
        let templated = helm::template(&self.template_options(values_file.path()), self.timeout).await?;

        let rendered = self.finalize(pre_install, templated)?;
        tracing::debug!(
            target: "helm",
            "({}) release {}: {} pre-install, {} templated, {} generated document(s)",
            self.component,
            self.release,
            count(&rendered, Origin::PreInstall),
            count(&rendered, Origin::Templated),
            count(&rendered, Origin::Generated)
        );

        let documents: Vec<Value> = rendered.into_iter().map(|rendered| rendered.document).collect();
        write_output(&self.output, encode_documents(&documents)?.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FabError;
    use std::fs;
    use tempfile::TempDir;

    fn doc(yaml: &str) -> Value {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_template_options() {
        let generator = HelmGenerator::new("/charts/grafana", "/out/root_grafana.yaml", "root_grafana")
            .with_namespace(Some("monitoring".to_string()));
        let args = generator.template_options(Path::new("/tmp/values.yaml")).args();
        assert_eq!(
            args,
            [
                "template",
                "--create-namespace",
                "--namespace",
                "monitoring",
                "--values",
                "/tmp/values.yaml",
                "root_grafana",
                "/charts/grafana",
            ]
        );
    }

    #[test]
    fn test_pre_install_documents_come_first() {
        let temp = TempDir::new().unwrap();
        let crds = temp.path().join("crds");
        fs::create_dir_all(crds.join("nested")).unwrap();
        fs::write(crds.join("a.yaml"), "kind: CustomResourceDefinition\nmetadata: {name: a}\n---\n").unwrap();
        fs::write(crds.join("nested/b.yml"), "kind: CustomResourceDefinition\nmetadata: {name: b}\n").unwrap();

        let generator = HelmGenerator::new(temp.path(), temp.path().join("out.yaml"), "r");
        let pre_install = generator.pre_install_documents().unwrap();
        let documents = generator
            .finalize(pre_install, vec![doc("kind: Deployment"), Value::Null, doc("kind: Service")])
            .unwrap();

        let kinds: Vec<_> =
            documents.iter().map(|d| d.document.pointer(&["kind"]).and_then(Value::as_str).unwrap()).collect();
        assert_eq!(kinds, ["CustomResourceDefinition", "CustomResourceDefinition", "Deployment", "Service"]);
        let origins: Vec<_> = documents.iter().map(|d| d.origin).collect();
        assert_eq!(origins, [Origin::PreInstall, Origin::PreInstall, Origin::Templated, Origin::Templated]);
    }

    #[test]
    fn test_finalize_injects_namespace_only_when_enabled() {
        let generator = HelmGenerator::new("/c", "/o.yaml", "root_app")
            .with_component("root/app")
            .with_namespace(Some("apps".to_string()));
        let documents = generator.finalize(Vec::new(), vec![doc("kind: Service")]).unwrap();
        assert_eq!(documents.len(), 1);
        assert!(documents[0].document.pointer(&["metadata"]).is_none());
        assert_eq!(documents[0].component, "root/app");

        let generator = generator.with_inject_namespace(true);
        let documents = generator.finalize(Vec::new(), vec![doc("kind: Service")]).unwrap();
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].origin, Origin::Generated);
        assert_eq!(documents[0].document, namespace_document("apps"));
        assert_eq!(
            documents[1].document.pointer(&["metadata", "namespace"]).and_then(Value::as_str),
            Some("apps")
        );

        let err = generator
            .finalize(Vec::new(), vec![doc("kind: Service\nmetadata: {namespace: other}\n")])
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FabError>(),
            Some(FabError::NamespaceConflict { .. })
        ));
    }

    #[test]
    fn test_finalize_keeps_namespace_rendered_by_chart() {
        let generator = HelmGenerator::new("/c", "/o.yaml", "r")
            .with_namespace(Some("apps".to_string()))
            .with_inject_namespace(true);
        let documents = generator
            .finalize(Vec::new(), vec![doc("kind: Namespace\nmetadata: {name: apps}\n"), doc("kind: Service")])
            .unwrap();
        assert_eq!(documents.len(), 2);
        assert!(documents.iter().all(|d| d.origin == Origin::Templated));
    }

    #[test]
    fn test_validate_requires_chart() {
        let temp = TempDir::new().unwrap();
        assert!(HelmGenerator::new(temp.path(), "/o.yaml", "r").validate().is_ok());
        assert!(HelmGenerator::new(temp.path().join("missing"), "/o.yaml", "r").validate().is_err());
    }
}

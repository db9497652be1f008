//! Reconciling pre-install fragments with templated output.
//!
//! Pre-install documents (typically CRDs) declare types that templated
//! documents may instantiate, so they always come first in a component's
//! merged list. Empty documents are dropped; nothing is deduplicated.

use anyhow::Result;

use super::value::{Mapping, Value};
use crate::core::FabError;

/// Which rendering path produced a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Collected from the pre-install directory, not processed by the templating backend.
    PreInstall,
    /// Emitted by the templating backend.
    Templated,
    /// Added by fab itself, such as the release namespace.
    Generated,
}

/// A decoded document plus where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedDocument {
    /// Logical path of the component that produced the document
    pub component: String,
    pub origin: Origin,
    pub document: Value,
}

/// Concatenate pre-install documents ahead of templated documents.
///
/// Empty entries (null or `{}`) are filtered from both groups; the order inside
/// each group is preserved and duplicates across groups are kept.
#[must_use]
pub fn merge_documents(pre_install: Vec<Value>, templated: Vec<Value>) -> Vec<Value> {
    pre_install.into_iter().chain(templated).filter(|doc| !doc.is_empty_document()).collect()
}

/// [`merge_documents`], tagging every document with its provenance.
#[must_use]
pub fn merge_rendered(
    component: &str,
    pre_install: Vec<Value>,
    templated: Vec<Value>,
) -> Vec<RenderedDocument> {
    let tag = |origin: Origin| {
        move |document: Value| RenderedDocument {
            component: component.to_string(),
            origin,
            document,
        }
    };
    pre_install
        .into_iter()
        .filter(|doc| !doc.is_empty_document())
        .map(tag(Origin::PreInstall))
        .chain(templated.into_iter().filter(|doc| !doc.is_empty_document()).map(tag(Origin::Templated)))
        .collect()
}

/// Set `metadata.namespace` on a document.
///
/// A missing `metadata` map is created. A namespace that is already present is
/// accepted when it equals `namespace` and rejected otherwise; it is never
/// overwritten.
///
/// # Errors
///
/// - [`FabError::UnexpectedDocumentShape`] when the document or its `metadata`
///   is not a map
/// - [`FabError::NamespaceConflict`] when a different namespace is declared
pub fn inject_namespace(document: &mut Value, namespace: &str) -> Result<()> {
    let found = document.type_name();
    let Some(root) = document.as_map_mut() else {
        return Err(FabError::UnexpectedDocumentShape {
            reason: format!("expected a map document, found {found}"),
        }
        .into());
    };

    if !root.contains_key("metadata") {
        root.insert("metadata", Value::Map(Mapping::new()));
    }
    let shape = root.get("metadata").map_or("null", Value::type_name);
    let Some(Value::Map(metadata)) = root.get_mut("metadata") else {
        return Err(FabError::UnexpectedDocumentShape {
            reason: format!("expected 'metadata' to be a map, found {shape}"),
        }
        .into());
    };

    let conflict = match metadata.get("namespace") {
        None | Some(Value::Null) => None,
        Some(Value::String(existing)) if existing.is_empty() || existing == namespace => None,
        Some(existing) => {
            Some(existing.as_str().map_or_else(|| existing.type_name().to_string(), str::to_string))
        }
    };
    if let Some(existing) = conflict {
        return Err(FabError::NamespaceConflict {
            namespace: namespace.to_string(),
            existing,
        }
        .into());
    }

    metadata.insert("namespace", Value::from(namespace));
    Ok(())
}

/// A `v1/Namespace` document named `name`.
///
/// `helm template --create-namespace` does not emit the namespace it renders
/// into, so the Helm renderer prepends this document when it injects one.
#[must_use]
pub fn namespace_document(name: &str) -> Value {
    let metadata: Mapping = [("name", Value::from(name))].into_iter().collect();
    Value::Map(
        [
            ("apiVersion", Value::from("v1")),
            ("kind", Value::from("Namespace")),
            ("metadata", Value::Map(metadata)),
        ]
        .into_iter()
        .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorCategory;

    fn doc(kind: &str, name: &str) -> Value {
        let metadata: Mapping = [("name", Value::from(name))].into_iter().collect();
        Value::Map([("kind", Value::from(kind)), ("metadata", Value::Map(metadata))].into_iter().collect())
    }

    fn names(docs: &[Value]) -> Vec<&str> {
        docs.iter().filter_map(|d| d.pointer(&["metadata", "name"])?.as_str()).collect()
    }

    #[test]
    fn test_pre_install_precedes_templated() {
        let merged = merge_documents(
            vec![doc("CustomResourceDefinition", "p1"), doc("CustomResourceDefinition", "p2")],
            vec![doc("Deployment", "t1"), doc("Service", "t2"), doc("ConfigMap", "t3")],
        );
        assert_eq!(merged.len(), 5);
        assert_eq!(names(&merged), ["p1", "p2", "t1", "t2", "t3"]);
    }

    #[test]
    fn test_empty_documents_are_dropped() {
        let merged = merge_documents(
            vec![Value::Null, doc("CustomResourceDefinition", "p1")],
            vec![Value::Map(Mapping::new()), doc("Service", "t1"), Value::Null],
        );
        assert_eq!(names(&merged), ["p1", "t1"]);
    }

    #[test]
    fn test_duplicates_across_groups_are_kept() {
        let merged = merge_documents(vec![doc("Service", "same")], vec![doc("Service", "same")]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_merge_rendered_records_origin() {
        let merged = merge_rendered("root/app", vec![doc("CRD", "p")], vec![Value::Null, doc("Service", "t")]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].origin, Origin::PreInstall);
        assert_eq!(merged[1].origin, Origin::Templated);
        assert!(merged.iter().all(|d| d.component == "root/app"));
    }

    #[test]
    fn test_inject_namespace_creates_metadata() {
        let mut document = Value::Map([("kind", Value::from("Service"))].into_iter().collect());
        inject_namespace(&mut document, "foo").unwrap();
        assert_eq!(document.pointer(&["metadata", "namespace"]), Some(&Value::from("foo")));
    }

    #[test]
    fn test_inject_namespace_same_value_is_accepted() {
        let mut document = doc("Service", "svc");
        inject_namespace(&mut document, "foo").unwrap();
        inject_namespace(&mut document, "foo").unwrap();
        assert_eq!(document.pointer(&["metadata", "namespace"]), Some(&Value::from("foo")));
    }

    #[test]
    fn test_inject_namespace_conflict() {
        let mut document = doc("Service", "svc");
        inject_namespace(&mut document, "bar").unwrap();

        let err = inject_namespace(&mut document, "foo").unwrap_err();
        let fab = err.downcast_ref::<FabError>().unwrap();
        assert!(matches!(fab, FabError::NamespaceConflict { existing, .. } if existing == "bar"));
        assert_eq!(fab.category(), ErrorCategory::Consistency);
        // never overwritten
        assert_eq!(document.pointer(&["metadata", "namespace"]), Some(&Value::from("bar")));
    }

    #[test]
    fn test_inject_namespace_rejects_non_map_metadata() {
        let mut document =
            Value::Map([("metadata", Value::List(vec![]))].into_iter().collect());
        let err = inject_namespace(&mut document, "foo").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FabError>(),
            Some(FabError::UnexpectedDocumentShape { .. })
        ));
    }

    #[test]
    fn test_namespace_document() {
        let ns = namespace_document("monitoring");
        assert_eq!(ns.pointer(&["kind"]), Some(&Value::from("Namespace")));
        assert_eq!(ns.pointer(&["metadata", "name"]), Some(&Value::from("monitoring")));
    }
}

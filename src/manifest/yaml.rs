//! Multi-document YAML codec over [`Value`].

use anyhow::{Context, Result};
use serde::Deserialize;

use super::value::Value;

/// Decode a (possibly multi-document) YAML stream.
///
/// Empty documents (`---` followed by nothing, or a comment-only document)
/// decode to [`Value::Null`]; callers that want them gone filter with
/// [`Value::is_empty_document`].
///
/// # Errors
///
/// Fails on the first document that is not well-formed YAML.
pub fn decode_documents(bytes: &[u8]) -> Result<Vec<Value>> {
    let mut documents = Vec::new();
    for (index, document) in serde_yaml::Deserializer::from_slice(bytes).enumerate() {
        let value = Value::deserialize(document)
            .with_context(|| format!("Failed to decode YAML document #{}", index + 1))?;
        documents.push(value);
    }
    Ok(documents)
}

/// Encode documents as a `---`-separated YAML stream.
///
/// Every document is preceded by `---` so the output can be concatenated with
/// other streams safely.
///
/// # Errors
///
/// Fails if a document cannot be represented as YAML.
pub fn encode_documents(documents: &[Value]) -> Result<String> {
    let mut out = String::new();
    for document in documents {
        let body = serde_yaml::to_string(document).context("Failed to encode YAML document")?;
        out.push_str("---\n");
        out.push_str(&body);
    }
    Ok(out)
}

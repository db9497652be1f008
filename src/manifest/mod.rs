//! Rendered manifest documents.
//!
//! - [`value`] - the closed [`Value`] type every document decodes into
//! - [`yaml`] - multi-document YAML decode/encode
//! - [`merge`] - pre-install/templated merge and namespace injection

pub mod merge;
pub mod value;
pub mod yaml;

pub use merge::{
    Origin, RenderedDocument, inject_namespace, merge_documents, merge_rendered,
    namespace_document,
};
pub use value::{Mapping, Value};
pub use yaml::{decode_documents, encode_documents};

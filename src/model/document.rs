//! Document wrapper and encode/decode helpers.
//!
//! The store deals in untyped JSON documents; repositories deal in typed
//! records. Conversion happens here, at the boundary.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

// =============================================================================
// Error Types
// =============================================================================

/// Errors converting between typed records and wire documents.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// A record failed to encode to JSON.
    #[error("failed to encode record: {0}")]
    Encode(#[source] serde_json::Error),

    /// A document failed to decode into the target record type.
    #[error("failed to decode document {reference}: {source}")]
    Decode {
        reference: DocumentRef,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;

// =============================================================================
// DocumentRef
// =============================================================================

/// An address of a single document: collection name plus document id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentRef {
    pub collection: String,
    pub id: String,
}

impl DocumentRef {
    /// Create a reference to `id` within `collection`.
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

impl std::fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

// =============================================================================
// Document
// =============================================================================

/// A raw document as returned by the store: its address plus JSON payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub reference: DocumentRef,
    pub data: Value,
}

impl Document {
    /// Create a document from an address and payload.
    pub fn new(reference: DocumentRef, data: Value) -> Self {
        Self { reference, data }
    }
}

// =============================================================================
// Encode / Decode
// =============================================================================

/// Encode a typed record to its JSON document payload.
pub fn encode_record<T: Serialize>(record: &T) -> Result<Value> {
    serde_json::to_value(record).map_err(ModelError::Encode)
}

/// Decode a document into the target record type.
pub fn decode_document<T: DeserializeOwned>(document: &Document) -> Result<T> {
    serde_json::from_value(document.data.clone()).map_err(|source| ModelError::Decode {
        reference: document.reference.clone(),
        source,
    })
}

/// Decode a list of documents, silently dropping any that fail to decode.
///
/// Callers that care about dropped documents should compare the returned
/// length against the input length.
pub fn decode_documents<T: DeserializeOwned>(documents: &[Document]) -> Vec<T> {
    documents
        .iter()
        .filter_map(|doc| decode_document(doc).ok())
        .collect()
}

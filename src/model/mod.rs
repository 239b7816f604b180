//! Domain record types and document encoding.
//!
//! Records are plain serde models matching the backend's camelCase wire
//! format. The engine itself never creates or deletes records - repositories
//! do, through the store - so everything here is data plus encode/decode
//! helpers.

mod custom_field;
mod document;
mod records;

pub use custom_field::{CustomFieldKind, CustomFieldValue};
pub use document::{
    decode_document, decode_documents, encode_record, Document, DocumentRef, ModelError, Result,
};
pub use records::{
    CollectionRecord, ItemRecord, Location, TemplateComponent, TemplateRecord,
    COLLECTIONS_COLLECTION, ITEMS_COLLECTION, TEMPLATES_COLLECTION,
};

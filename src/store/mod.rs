//! Document storage seam.
//!
//! The engine never touches storage directly; it reads and creates
//! documents through [`DocumentStore`]. Two adapters are provided:
//! [`MemoryStore`] for embedding and tests, [`LocalStore`] for a directory
//! on disk.

mod local;
mod memory;

pub use local::LocalStore;
pub use memory::MemoryStore;

use crate::error::ExpungeResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Opaque document identifier.
pub type DocumentId = String;

/// Where a document's bytes live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StorageKind {
    Local { path: PathBuf },
    ObjectStore { url: String },
}

/// Descriptive record of a stored document. Owned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub id: DocumentId,
    pub original_filename: String,
    /// Name of the stored file.
    pub filename: String,
    /// Size in bytes.
    pub size: u64,
    pub page_count: usize,
    #[serde(rename = "is_redacted")]
    pub redacted: bool,
    pub storage: StorageKind,
    pub created_at: DateTime<Utc>,
    /// Source document of a redacted derivative.
    pub derived_from: Option<DocumentId>,
    pub public_url: Option<String>,
}

/// Draft for a document that does not exist yet; the store assigns the id,
/// the stored filename and the timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDocument {
    pub original_filename: String,
    pub page_count: usize,
    pub redacted: bool,
    pub derived_from: Option<DocumentId>,
}

/// Read and create access to stored documents.
///
/// Implementations must be shareable across threads; every `create` call
/// produces a new, distinct document.
pub trait DocumentStore: Send + Sync {
    /// Bytes of a document; `NotFound` for an unknown id.
    fn get_bytes(&self, id: &str) -> ExpungeResult<Vec<u8>>;

    /// Metadata of a document; `NotFound` for an unknown id.
    fn get_metadata(&self, id: &str) -> ExpungeResult<DocumentMetadata>;

    /// Stores `bytes` as a new document.
    fn create(&self, bytes: &[u8], draft: NewDocument) -> ExpungeResult<DocumentMetadata>;

    /// Publicly reachable URL of a document, if the store has one.
    fn public_url(&self, id: &str) -> ExpungeResult<Option<String>>;
}

/// Stored name for a new document: `<id>.pdf`.
pub(crate) fn stored_filename(id: &str) -> String {
    format!("{}.pdf", id)
}

pub(crate) fn new_id() -> DocumentId {
    uuid::Uuid::new_v4().to_string()
}

use super::{new_id, stored_filename, DocumentMetadata, DocumentStore, NewDocument, StorageKind};
use crate::error::{ExpungeError, ExpungeResult};
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Store holding everything in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<String, (DocumentMetadata, Vec<u8>)>>,
    public_base_url: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Documents get `<base>/<filename>` as their public URL.
    pub fn with_public_base_url(base: impl Into<String>) -> Self {
        Self {
            public_base_url: Some(base.into()),
            ..Self::default()
        }
    }

    /// Stores an original (unredacted) upload.
    pub fn insert(&self, original_filename: &str, bytes: &[u8]) -> ExpungeResult<DocumentMetadata> {
        let page_count = crate::text::TextExtractor::page_count(bytes).unwrap_or(0);
        self.create(
            bytes,
            NewDocument {
                original_filename: original_filename.to_string(),
                page_count,
                redacted: false,
                derived_from: None,
            },
        )
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }

    fn url_for(&self, filename: &str) -> Option<String> {
        self.public_base_url
            .as_ref()
            .map(|base| format!("{}/{}", base.trim_end_matches('/'), filename))
    }
}

fn not_found(id: &str) -> ExpungeError {
    ExpungeError::NotFound { id: id.to_string() }
}

impl DocumentStore for MemoryStore {
    fn get_bytes(&self, id: &str) -> ExpungeResult<Vec<u8>> {
        self.documents
            .read()
            .get(id)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| not_found(id))
    }

    fn get_metadata(&self, id: &str) -> ExpungeResult<DocumentMetadata> {
        self.documents
            .read()
            .get(id)
            .map(|(meta, _)| meta.clone())
            .ok_or_else(|| not_found(id))
    }

    fn create(&self, bytes: &[u8], draft: NewDocument) -> ExpungeResult<DocumentMetadata> {
        let id = new_id();
        let filename = stored_filename(&id);
        let metadata = DocumentMetadata {
            storage: StorageKind::ObjectStore {
                url: format!("memory://{}", filename),
            },
            public_url: self.url_for(&filename),
            id: id.clone(),
            original_filename: draft.original_filename,
            filename,
            size: bytes.len() as u64,
            page_count: draft.page_count,
            redacted: draft.redacted,
            created_at: Utc::now(),
            derived_from: draft.derived_from,
        };
        self.documents
            .write()
            .insert(id, (metadata.clone(), bytes.to_vec()));
        Ok(metadata)
    }

    fn public_url(&self, id: &str) -> ExpungeResult<Option<String>> {
        Ok(self.get_metadata(id)?.public_url)
    }
}

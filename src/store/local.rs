use super::{new_id, stored_filename, DocumentMetadata, DocumentStore, NewDocument, StorageKind};
use crate::config::StoreConfig;
use crate::error::{ExpungeError, ExpungeResult};
use crate::text::TextExtractor;
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Directory-backed store: `<id>.pdf` holds the bytes, `<id>.json` the
/// metadata.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
    public_base_url: Option<String>,
}

impl LocalStore {
    /// Opens (creating if needed) the store directory.
    pub fn open(config: &StoreConfig) -> ExpungeResult<Self> {
        fs::create_dir_all(&config.root).map_err(|source| ExpungeError::Io {
            path: config.root.clone(),
            source,
        })?;
        Ok(Self {
            root: config.root.clone(),
            public_base_url: config.public_base_url.clone(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Copies a PDF from disk into the store as an original document.
    pub fn import(&self, path: &Path) -> ExpungeResult<DocumentMetadata> {
        let bytes = fs::read(path).map_err(|source| ExpungeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let page_count = TextExtractor::page_count(&bytes)?;
        let original_filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string());
        self.create(
            &bytes,
            NewDocument {
                original_filename,
                page_count,
                redacted: false,
                derived_from: None,
            },
        )
    }

    /// Ids of every stored document, sorted.
    pub fn list(&self) -> ExpungeResult<Vec<String>> {
        let entries = fs::read_dir(&self.root).map_err(|source| self.io(&self.root, source))?;
        let mut ids: Vec<String> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.extension().map_or(false, |ext| ext == "json"))
            .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .collect();
        ids.sort();
        Ok(ids)
    }

    fn metadata_path(&self, id: &str) -> ExpungeResult<PathBuf> {
        // ids become file names, so nothing that could leave the directory
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(ExpungeError::NotFound { id: id.to_string() });
        }
        Ok(self.root.join(format!("{}.json", id)))
    }

    fn io(&self, path: &Path, source: std::io::Error) -> ExpungeError {
        ExpungeError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> ExpungeResult<()> {
        fs::write(path, bytes).map_err(|source| self.io(path, source))
    }

    /// Writes the PDF, then its metadata. The PDF is removed again when the
    /// metadata cannot be written.
    fn store_document(
        &self,
        metadata: &DocumentMetadata,
        pdf_path: &Path,
        bytes: &[u8],
    ) -> ExpungeResult<()> {
        self.write(pdf_path, bytes)?;
        if let Err(e) = self.write_metadata(metadata) {
            // a PDF without metadata is invisible to the store
            if let Err(cleanup) = fs::remove_file(pdf_path) {
                warn!(path = %pdf_path.display(), error = %cleanup, "orphaned document left behind");
            }
            return Err(e);
        }
        Ok(())
    }

    fn write_metadata(&self, metadata: &DocumentMetadata) -> ExpungeResult<()> {
        let json = serde_json::to_vec_pretty(metadata)?;
        self.write(&self.metadata_path(&metadata.id)?, &json)
    }

    /// Location of the stored PDF, always inside the store directory.
    ///
    /// Only the file name of a recorded path is used, so edited metadata
    /// cannot point reads elsewhere.
    fn pdf_path(&self, metadata: &DocumentMetadata) -> ExpungeResult<PathBuf> {
        let recorded = match &metadata.storage {
            StorageKind::Local { path } => path.file_name().map(|n| n.to_os_string()),
            StorageKind::ObjectStore { .. } => None,
        };
        let name = recorded.unwrap_or_else(|| metadata.filename.clone().into());
        let path = self.root.join(&name);
        if Path::new(&name).components().count() != 1 || !path.starts_with(&self.root) {
            return Err(ExpungeError::NotFound {
                id: metadata.id.clone(),
            });
        }
        Ok(path)
    }
}

impl DocumentStore for LocalStore {
    fn get_bytes(&self, id: &str) -> ExpungeResult<Vec<u8>> {
        let metadata = self.get_metadata(id)?;
        let path = self.pdf_path(&metadata)?;
        fs::read(&path).map_err(|source| self.io(&path, source))
    }

    fn get_metadata(&self, id: &str) -> ExpungeResult<DocumentMetadata> {
        let path = self.metadata_path(id)?;
        if !path.exists() {
            return Err(ExpungeError::NotFound { id: id.to_string() });
        }
        let raw = fs::read(&path).map_err(|source| self.io(&path, source))?;
        Ok(serde_json::from_slice(&raw)?)
    }

    fn create(&self, bytes: &[u8], draft: NewDocument) -> ExpungeResult<DocumentMetadata> {
        let id = new_id();
        let filename = stored_filename(&id);
        let pdf_path = self.root.join(&filename);
        let public_url = self
            .public_base_url
            .as_ref()
            .map(|base| format!("{}/{}", base.trim_end_matches('/'), filename));

        let metadata = DocumentMetadata {
            id: id.clone(),
            original_filename: draft.original_filename,
            filename,
            size: bytes.len() as u64,
            page_count: draft.page_count,
            redacted: draft.redacted,
            storage: StorageKind::Local {
                path: pdf_path.clone(),
            },
            created_at: Utc::now(),
            derived_from: draft.derived_from,
            public_url,
        };

        self.store_document(&metadata, &pdf_path, bytes)?;
        debug!(id = %id, size = bytes.len(), redacted = metadata.redacted, "document stored");
        Ok(metadata)
    }

    fn public_url(&self, id: &str) -> ExpungeResult<Option<String>> {
        Ok(self.get_metadata(id)?.public_url)
    }
}

//! Search and irreversible redaction of text in PDF documents.
//!
//! Text is extracted with positions straight from the page content streams,
//! searched for a literal query, and removed by rewriting those content
//! streams: matched glyphs are deleted (not covered) and an opaque marker is
//! drawn where they were.
//!
//! # Features
//!
//! - **Positioned search**: every match carries its page, context and
//!   bounding box in display coordinates
//! - **Physical removal**: matched glyphs are deleted from the content
//!   stream; the rest of the line keeps its exact position
//! - **Verification**: redacted output is re-searched before it is returned
//! - **Storage seam**: documents are read and created through
//!   [`DocumentStore`], with in-memory and local-directory adapters
//!
//! # Architecture
//!
//! - [`text`]: content stream interpretation and text layout
//! - [`search`]: literal matching producing [`Match`] records
//! - [`redaction`]: glyph removal and marker drawing
//! - [`output`]: downloads and persisted derivatives
//! - [`store`]: the document store trait and adapters
//! - [`service`]: the search / redact boundary operations
//! - [`config`]: engine and store configuration
//! - [`error`]: error taxonomy
//!
//! # Quick Start
//!
//! ```no_run
//! use expunge::{MemoryStore, RedactionService};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = MemoryStore::new();
//! let doc = store.insert("statement.pdf", &std::fs::read("statement.pdf")?)?;
//! let service = RedactionService::with_defaults(store);
//!
//! let found = service.search(&doc.id, "12345")?;
//! println!("{} match(es)", found.total_matches);
//!
//! let download = service.redact_and_stream(&doc.id, "12345")?;
//! std::fs::write(&download.filename, &download.bytes)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Working on bytes
//!
//! ```no_run
//! use expunge::{Redactor, TextExtractor};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bytes = std::fs::read("input.pdf")?;
//! let text = TextExtractor::extract(&bytes)?.text();
//! let result = Redactor::default().redact(&bytes, "secret")?;
//! assert_eq!(result.total_replacements, result.applied.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod output;
pub mod redaction;
pub mod search;
pub mod service;
pub mod store;
pub mod text;

pub use config::{AppConfig, EngineConfig, StoreConfig};
pub use error::{ExpungeError, ExpungeResult};
pub use output::{redacted_filename, OutputManager, PersistedRedaction, RedactedDownload};
pub use redaction::{RedactionResult, Redactor};
pub use search::{find_matches, Match, MatchOptions, Matcher};
pub use service::{RedactionService, SearchOutcome};
pub use store::{
    DocumentId, DocumentMetadata, DocumentStore, LocalStore, MemoryStore, NewDocument, StorageKind,
};
pub use text::{ExtractedDocument, PageText, TextExtractor, TextRun};

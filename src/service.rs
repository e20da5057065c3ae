//! The boundary operations: search a stored document, and redact it into a
//! download or a new stored document.

use crate::config::EngineConfig;
use crate::error::{ExpungeError, ExpungeResult};
use crate::output::{OutputManager, PersistedRedaction, RedactedDownload};
use crate::redaction::{RedactionResult, Redactor};
use crate::search::{Match, Matcher};
use crate::store::DocumentStore;
use crate::text::TextExtractor;
use serde::{Deserialize, Serialize};
use tracing::{info, info_span};

/// Search response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOutcome {
    pub matches: Vec<Match>,
    pub total_matches: usize,
}

/// Search and redaction over documents held by a [`DocumentStore`].
///
/// Stateless apart from its configuration, so one service can be shared
/// between threads.
pub struct RedactionService<S: DocumentStore> {
    store: S,
    matcher: Matcher,
    redactor: Redactor,
}

impl<S: DocumentStore> RedactionService<S> {
    /// Creates a service, validating `config`.
    pub fn new(store: S, config: EngineConfig) -> ExpungeResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            matcher: Matcher::new(config.matching),
            redactor: Redactor::new(config),
        })
    }

    /// Creates a service with the default configuration.
    pub fn with_defaults(store: S) -> Self {
        let config = EngineConfig::default();
        Self {
            store,
            matcher: Matcher::new(config.matching),
            redactor: Redactor::new(config),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        self.redactor.config()
    }

    /// Finds every occurrence of `query` in the stored document `id`.
    pub fn search(&self, id: &str, query: &str) -> ExpungeResult<SearchOutcome> {
        let _span = info_span!("search", document = %id).entered();
        validate_query(query)?;
        let bytes = self.store.get_bytes(id)?;
        let outcome = self.search_bytes(&bytes, query)?;
        info!(matches = outcome.total_matches, "search complete");
        Ok(outcome)
    }

    /// Redacts the stored document `id` and saves the result as a new
    /// document. The original is left untouched.
    pub fn redact_and_persist(&self, id: &str, query: &str) -> ExpungeResult<PersistedRedaction> {
        let _span = info_span!("redact_and_persist", document = %id).entered();
        validate_query(query)?;
        let source = self.store.get_metadata(id)?;
        let result = self.redact_bytes(&self.store.get_bytes(id)?, query)?;
        OutputManager::new(&self.store).persist(&source, result)
    }

    /// Redacts the stored document `id` into a download. Nothing is stored.
    pub fn redact_and_stream(&self, id: &str, query: &str) -> ExpungeResult<RedactedDownload> {
        let _span = info_span!("redact_and_stream", document = %id).entered();
        validate_query(query)?;
        let source = self.store.get_metadata(id)?;
        let result = self.redact_bytes(&self.store.get_bytes(id)?, query)?;
        Ok(OutputManager::new(&self.store).download(&source, result))
    }

    /// Searches raw document bytes.
    pub fn search_bytes(&self, bytes: &[u8], query: &str) -> ExpungeResult<SearchOutcome> {
        let extracted = TextExtractor::extract(bytes)?;
        let matches = self.matcher.find(extracted.pages(), query);
        Ok(SearchOutcome {
            total_matches: matches.len(),
            matches,
        })
    }

    /// Redacts raw document bytes.
    pub fn redact_bytes(&self, bytes: &[u8], query: &str) -> ExpungeResult<RedactionResult> {
        self.redactor.redact(bytes, query)
    }
}

fn validate_query(query: &str) -> ExpungeResult<()> {
    if query.trim().is_empty() {
        return Err(ExpungeError::invalid_input(
            "query",
            "search term must not be empty",
        ));
    }
    Ok(())
}

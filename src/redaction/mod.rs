//! Physical removal of matched text.
//!
//! The [`Redactor`] re-derives matches from the bytes it is given, deletes
//! the matched glyphs from the page content streams, draws an opaque marker
//! over each match, and verifies that the query no longer occurs in the
//! output.

pub mod forms;
pub mod overlay;
pub mod resources;
pub mod rewrite;

use crate::config::EngineConfig;
use crate::error::{ExpungeError, ExpungeResult};
use crate::search::{Match, Matcher};
use crate::text::{content, TextExtractor};
use lopdf::content::Operation;
use lopdf::{Dictionary, Object, Stream};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Outcome of a redaction.
#[derive(Debug, Clone, Default)]
pub struct RedactionResult {
    /// The redacted document.
    pub bytes: Vec<u8>,

    /// Number of occurrences removed; equals `applied.len()`.
    pub total_replacements: usize,

    /// The matches that were removed, in search order.
    pub applied: Vec<Match>,

    /// Pages whose content was rewritten.
    pub pages_modified: usize,
}

impl RedactionResult {
    /// Returns true if any redactions were applied.
    pub fn has_redactions(&self) -> bool {
        self.total_replacements > 0
    }
}

/// Produces redacted copies of PDF documents.
#[derive(Debug, Clone)]
pub struct Redactor {
    config: EngineConfig,
    matcher: Matcher,
}

impl Default for Redactor {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Redactor {
    pub fn new(config: EngineConfig) -> Self {
        let matcher = Matcher::new(config.matching);
        Self { config, matcher }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Removes every occurrence of `query` from the document in `bytes`.
    ///
    /// Without matches the output is a byte-for-byte copy of the input.
    ///
    /// # Errors
    ///
    /// `Redaction` when the document cannot be read or rewritten, or when
    /// the query can still be found in the output. No bytes are returned in
    /// that case.
    pub fn redact(&self, bytes: &[u8], query: &str) -> ExpungeResult<RedactionResult> {
        self.run(bytes, query, None)
    }

    /// Like [`Redactor::redact`], but first checks that `expected` is exactly
    /// what a fresh search of `bytes` finds.
    ///
    /// Matches from an earlier search of a different or since-changed
    /// document are rejected rather than trusted.
    pub fn redact_matches(
        &self,
        bytes: &[u8],
        query: &str,
        expected: &[Match],
    ) -> ExpungeResult<RedactionResult> {
        self.run(bytes, query, Some(expected))
    }

    fn run(
        &self,
        bytes: &[u8],
        query: &str,
        expected: Option<&[Match]>,
    ) -> ExpungeResult<RedactionResult> {
        let extracted = TextExtractor::extract(bytes).map_err(ExpungeError::into_redaction)?;
        let matches = self.matcher.find(extracted.pages(), query);

        if let Some(expected) = expected {
            let agrees = expected.len() == matches.len()
                && expected.iter().zip(&matches).all(|(e, m)| e.same_occurrence(m));
            if !agrees {
                return Err(ExpungeError::redaction(format!(
                    "supplied matches do not describe this document ({} supplied, {} found)",
                    expected.len(),
                    matches.len()
                )));
            }
        }

        if matches.is_empty() {
            debug!("no matches, returning the document unchanged");
            return Ok(RedactionResult {
                bytes: bytes.to_vec(),
                ..RedactionResult::default()
            });
        }

        let label = self
            .config
            .label()
            .filter(|label| !self.matcher.contains(label, query));
        if label.is_none() && self.config.label().is_some() {
            debug!("label omitted because it contains the query");
        }

        let mut by_page: BTreeMap<u32, Vec<&Match>> = BTreeMap::new();
        for m in &matches {
            by_page.entry(m.page).or_default().push(m);
        }

        let (mut doc, scans) = extracted.into_parts();
        let mut replaced_forms = BTreeSet::new();
        let mut kept_forms = BTreeSet::new();
        for scan in &scans {
            let Some(page_matches) = by_page.get(&scan.number) else {
                let drawn = scan.streams.iter().filter_map(|s| s.form.as_ref());
                kept_forms.extend(drawn.map(|call| call.id));
                continue;
            };
            let removed: BTreeSet<_> = page_matches
                .iter()
                .flat_map(|m| m.glyphs.iter().copied())
                .collect();

            let mut page_resources = resources::page_copy(&doc, scan.id);
            let rewritten = forms::rewrite_page(&mut doc, scan, &removed, &mut page_resources)?;
            replaced_forms.extend(rewritten.replaced);
            kept_forms.extend(rewritten.kept);

            let font_name =
                label.map(|_| overlay::install_label_font(&mut doc, &mut page_resources));
            let segments: Vec<_> = page_matches.iter().map(|m| m.segments.clone()).collect();
            let marker = overlay::marker_operations(
                &segments,
                &scan.geometry,
                label.zip(font_name.as_deref()),
                &self.config,
            );

            let page_ops = rewritten.operations;
            let mut operations = Vec::with_capacity(page_ops.len() + marker.len() + 4);
            operations.push(Operation::new("q", vec![]));
            let open = rewrite::open_saves(&page_ops);
            operations.extend(page_ops);
            operations.extend((0..open).map(|_| Operation::new("Q", vec![])));
            operations.push(Operation::new("Q", vec![]));
            operations.extend(marker);

            let encoded = content::encode(&operations).map_err(|e| {
                ExpungeError::redaction_on_page(scan.number, format!("content encoding: {}", e))
            })?;
            let stream_id = doc.add_object(Stream::new(Dictionary::new(), encoded));
            let page = doc
                .get_object_mut(scan.id)
                .and_then(Object::as_dict_mut)
                .map_err(|e| ExpungeError::redaction_on_page(scan.number, e.to_string()))?;
            page.set("Contents", Object::Reference(stream_id));
            page.set("Resources", Object::Dictionary(page_resources));
            debug!(page = scan.number, matches = page_matches.len(), "page rewritten");
        }

        // originals of copied forms must not stay reachable through shared resources
        let stale: BTreeSet<_> = replaced_forms.difference(&kept_forms).copied().collect();
        if !stale.is_empty() {
            let unlinked = resources::forget_forms(&mut doc, &stale);
            debug!(forms = stale.len(), entries = unlinked, "replaced forms unlinked");
        }
        let still_drawn = replaced_forms.intersection(&kept_forms).count();
        if still_drawn > 0 {
            warn!(forms = still_drawn, "redacted forms are still drawn unchanged elsewhere");
        }

        // drop the replaced content streams so the removed text is not left in the file
        let pruned = doc.prune_objects();
        debug!(objects = pruned.len(), "unreferenced objects pruned");

        let mut output = Vec::new();
        doc.save_to(&mut output)
            .map_err(|e| ExpungeError::redaction(format!("serialization failed: {}", e)))?;

        if self.config.verify {
            self.verify(&output, query)?;
        }

        let pages_modified = by_page.len();
        info!(replacements = matches.len(), pages = pages_modified, "redaction applied");
        Ok(RedactionResult {
            bytes: output,
            total_replacements: matches.len(),
            pages_modified,
            applied: matches,
        })
    }

    fn verify(&self, output: &[u8], query: &str) -> ExpungeResult<()> {
        let extracted = TextExtractor::extract(output).map_err(|e| {
            ExpungeError::redaction(format!("redacted output is unreadable: {}", e))
        })?;
        let residual = self.matcher.find(extracted.pages(), query);
        if let Some(first) = residual.first() {
            warn!(count = residual.len(), page = first.page, "query still present after redaction");
            return Err(ExpungeError::redaction_on_page(
                first.page,
                format!("{} occurrence(s) remain after rewriting", residual.len()),
            ));
        }
        Ok(())
    }
}

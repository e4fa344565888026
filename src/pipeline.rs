//! Top-level harvest pipeline: load a stored pattern or discover one, then
//! extract.
//!
//! The flow per page is: try the store; on a hit, extract directly. On a
//! miss, run structure discovery (grouping → likelihood → learning), persist
//! the winner, and extract with it. Neither discovery failure nor a persist
//! failure is fatal: the worst outcome for any page is an empty or partial
//! record set.

use crate::analysis::grouping::find_candidate_groups;
use crate::analysis::learner::learn_site_pattern;
use crate::analysis::likelihood::select_listing_group;
use crate::extract::{ExtractedRecord, ExtractionEngine};
use crate::fields::FieldCatalogue;
use crate::pattern::SitePattern;
use crate::store::PatternStore;
use scraper::Html;
use tracing::{debug, info, warn};

/// Where the pattern used for extraction came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternSource {
    /// Loaded from the pattern store.
    Stored,
    /// Discovered fresh on this page.
    Learned,
}

/// Outcome of one harvest call.
pub struct Harvest {
    /// Accepted records, in document order of their listing blocks.
    pub records: Vec<ExtractedRecord>,
    /// The pattern used for extraction, if discovery succeeded.
    pub pattern: Option<SitePattern>,
    pub source: Option<PatternSource>,
    /// Set when a freshly learned pattern could not be persisted. Extraction
    /// still ran with the in-memory pattern; the caller should retry or log.
    pub persist_error: Option<anyhow::Error>,
}

impl Harvest {
    fn empty() -> Self {
        Self {
            records: Vec::new(),
            pattern: None,
            source: None,
            persist_error: None,
        }
    }
}

/// One engine instance per site pipeline; different sites are independent
/// and may run in parallel with separate instances over a shared store.
pub struct ListingHarvester<S> {
    store: S,
    catalogue: FieldCatalogue,
}

impl<S: PatternStore> ListingHarvester<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            catalogue: FieldCatalogue::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn catalogue(&self) -> &FieldCatalogue {
        &self.catalogue
    }

    /// Harvest one page: reuse the stored pattern when one exists, learn
    /// otherwise.
    pub fn harvest(&self, html: &str, site_id: &str, page_url: &str) -> Harvest {
        let document = Html::parse_document(html);

        if let Some(pattern) = self.store.load(site_id) {
            info!(
                "using stored pattern for {} ({} field(s))",
                site_id,
                pattern.fields.len()
            );
            let records = ExtractionEngine::new(&self.catalogue).extract(&document, &pattern, page_url);
            return Harvest {
                records,
                pattern: Some(pattern),
                source: Some(PatternSource::Stored),
                persist_error: None,
            };
        }

        self.learn_and_extract(&document, site_id, page_url)
    }

    /// Harvest with forced re-learning, ignoring any stored pattern. For
    /// orchestrators reacting to drift (e.g. a stored pattern that suddenly
    /// yields zero records).
    pub fn harvest_fresh(&self, html: &str, site_id: &str, page_url: &str) -> Harvest {
        let document = Html::parse_document(html);
        self.learn_and_extract(&document, site_id, page_url)
    }

    fn learn_and_extract(&self, document: &Html, site_id: &str, page_url: &str) -> Harvest {
        let groups = find_candidate_groups(document);
        if groups.is_empty() {
            debug!("no repeated block groups on {}", site_id);
            return Harvest::empty();
        }

        let Some((group, score)) = select_listing_group(groups, &self.catalogue) else {
            debug!("no candidate group cleared the likelihood threshold on {}", site_id);
            return Harvest::empty();
        };
        info!(
            "selected listing group {:?} (score {:.2}, {} members) on {}",
            group.class_signature,
            score,
            group.members.len(),
            site_id
        );

        let pattern = learn_site_pattern(&group, &self.catalogue, site_id, page_url);

        let persist_error = match self.store.save(site_id, &pattern) {
            Ok(()) => None,
            Err(e) => {
                warn!("failed to persist pattern for {}: {:#}", site_id, e);
                Some(e)
            }
        };

        let records = ExtractionEngine::new(&self.catalogue).extract(document, &pattern, page_url);
        Harvest {
            records,
            pattern: Some(pattern),
            source: Some(PatternSource::Learned),
            persist_error,
        }
    }
}

/// Compute a candidate pattern for a page without touching any store. Pure
/// counterpart of [`ListingHarvester::harvest`] for callers that manage
/// persistence themselves.
pub fn learn_pattern(
    html: &str,
    site_id: &str,
    page_url: &str,
    catalogue: &FieldCatalogue,
) -> Option<SitePattern> {
    let document = Html::parse_document(html);
    let groups = find_candidate_groups(&document);
    let (group, _score) = select_listing_group(groups, catalogue)?;
    Some(learn_site_pattern(&group, catalogue, site_id, page_url))
}

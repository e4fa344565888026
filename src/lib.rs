//! madori: self-learning structure discovery and extraction for
//! real-estate listing pages.
//!
//! Given a page whose markup has never been seen before, the engine finds
//! the repeated block of markup that represents one listing (grouping by
//! class signature, filtered by structural cohesion), checks that the
//! winning group actually looks like listings (price / address / area
//! signals), learns a per-field locator map by majority vote over sampled
//! blocks, persists the result keyed by site identity, and extracts typed
//! records. Pages from a known site skip straight to extraction with the
//! stored pattern.
//!
//! Fetching, crawling, record persistence and orchestration are the
//! caller's business: this crate takes raw HTML plus a site identifier and
//! returns records. All analysis is synchronous and CPU-bound; the only
//! I/O is the [`store::PatternStore`] and the only concurrency rule is that
//! saves for one site key never interleave.

pub mod analysis;
pub mod dom;
pub mod error;
pub mod extract;
pub mod fields;
pub mod pattern;
pub mod pipeline;
pub mod store;

pub use error::PatternError;
pub use extract::{ExtractedRecord, ExtractionEngine};
pub use fields::{FieldCatalogue, FieldKind, FieldValue};
pub use pattern::{FieldPattern, Locator, SitePattern};
pub use pipeline::{learn_pattern, Harvest, ListingHarvester, PatternSource};
pub use store::{JsonPatternStore, MemoryPatternStore, PatternStore, SqlitePatternStore};

//! Pattern-driven extraction: apply a learned [`SitePattern`] to a page and
//! produce typed listing records.

use crate::dom::{block_elements, class_signature, descendant_elements, element_text, same_tag_position, sorted_classes};
use crate::fields::{FieldCatalogue, FieldKind, FieldValue};
use crate::pattern::{Locator, SitePattern};
use chrono::{DateTime, Utc};
use fnv::FnvHasher;
use regex::Regex;
use scraper::{ElementRef, Html};
use serde::Serialize;
use std::collections::BTreeMap;
use std::hash::Hasher;
use tracing::debug;
use url::Url;

/// Accepted sale-price range in yen. Records outside it are dropped.
pub const MIN_PRICE_YEN: u64 = 1_000_000;
pub const MAX_PRICE_YEN: u64 = 10_000_000_000;

/// Minimum extraction confidence for a record to be kept.
pub const MIN_RECORD_CONFIDENCE: f64 = 0.3;

/// One extracted listing. Handed to the caller; this core keeps no copy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedRecord {
    pub site_id: String,
    pub source_url: String,
    /// Digits of the detail-page link, or a content hash when absent.
    pub listing_id: String,
    pub scraped_at: DateTime<Utc>,
    /// Mean confidence of the field locators that produced a value here.
    pub confidence: f64,
    pub fields: BTreeMap<FieldKind, FieldValue>,
}

impl ExtractedRecord {
    pub fn price_yen(&self) -> Option<u64> {
        self.fields.get(&FieldKind::Price).and_then(FieldValue::as_price)
    }
}

/// Applies a site pattern to page markup.
pub struct ExtractionEngine<'a> {
    catalogue: &'a FieldCatalogue,
    id_digits: Regex,
}

impl<'a> ExtractionEngine<'a> {
    pub fn new(catalogue: &'a FieldCatalogue) -> Self {
        Self {
            catalogue,
            id_digits: Regex::new(r"\d{5,}").expect("listing id regex is valid"),
        }
    }

    /// Extract all acceptable records from the page, in document order of
    /// the matched listing blocks. Blocks that fail to produce an
    /// acceptable record are skipped, never fatal.
    pub fn extract(
        &self,
        document: &Html,
        pattern: &SitePattern,
        page_url: &str,
    ) -> Vec<ExtractedRecord> {
        let mut records = Vec::new();
        for block in block_elements(document) {
            if class_signature(&block) != pattern.block_signature {
                continue;
            }
            match self.extract_block(block, pattern, page_url) {
                Some(record) => records.push(record),
                None => debug!("block skipped: no acceptable record"),
            }
        }
        records
    }

    fn extract_block(
        &self,
        block: ElementRef<'_>,
        pattern: &SitePattern,
        page_url: &str,
    ) -> Option<ExtractedRecord> {
        let mut fields = BTreeMap::new();
        let mut confidences = Vec::new();

        for (kind, field_pattern) in &pattern.fields {
            let Some(node) = resolve_locator(block, &field_pattern.locator) else {
                continue;
            };
            let text = element_text(&node);
            if let Some(value) = self.catalogue.parse_value(*kind, &text) {
                fields.insert(*kind, value);
                confidences.push(field_pattern.confidence);
            }
        }

        let confidence = if confidences.is_empty() {
            0.0
        } else {
            confidences.iter().sum::<f64>() / confidences.len() as f64
        };

        let price = fields.get(&FieldKind::Price).and_then(FieldValue::as_price)?;
        if !(MIN_PRICE_YEN..=MAX_PRICE_YEN).contains(&price) {
            debug!("block skipped: price {} yen out of bounds", price);
            return None;
        }
        if confidence < MIN_RECORD_CONFIDENCE {
            debug!("block skipped: confidence {:.2} below floor", confidence);
            return None;
        }

        Some(ExtractedRecord {
            site_id: pattern.site_id.clone(),
            source_url: page_url.to_string(),
            listing_id: self.listing_id(block, page_url),
            scraped_at: Utc::now(),
            confidence,
            fields,
        })
    }

    /// Synthetic listing id: the last run of 5+ digits in the block's detail
    /// link, else an FNV-64 hash of the link; a block with no link hashes
    /// its own text.
    fn listing_id(&self, block: ElementRef<'_>, page_url: &str) -> String {
        let href = descendant_elements(block)
            .find(|e| e.value().name() == "a" && e.value().attr("href").is_some())
            .and_then(|e| e.value().attr("href").map(str::to_string));

        match href {
            Some(href) => {
                let absolute = resolve_url(page_url, &href);
                match self.id_digits.find_iter(&absolute).last() {
                    Some(m) => m.as_str().to_string(),
                    None => content_hash(&absolute),
                }
            }
            None => content_hash(&element_text(&block)),
        }
    }
}

/// Resolve a field locator against one listing block.
pub fn resolve_locator<'a>(block: ElementRef<'a>, locator: &Locator) -> Option<ElementRef<'a>> {
    match locator {
        Locator::Classes(classes) => {
            descendant_elements(block).find(|e| sorted_classes(e) == *classes)
        }
        Locator::Nth { tag, position } => descendant_elements(block)
            .find(|e| e.value().name() == tag.as_str() && same_tag_position(e) == *position),
    }
}

/// Resolve a potentially relative URL against the page URL.
fn resolve_url(page_url: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    if let Ok(base) = Url::parse(page_url) {
        if let Ok(resolved) = base.join(href) {
            return resolved.to_string();
        }
    }
    href.to_string()
}

fn content_hash(input: &str) -> String {
    let mut hasher = FnvHasher::default();
    hasher.write(input.as_bytes());
    format!("{:016x}", hasher.finish())
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::FieldPattern;

    const PAGE_URL: &str = "https://example.jp/chuko/tokyo/";

    fn pattern_with(fields: Vec<FieldPattern>) -> SitePattern {
        let fields: BTreeMap<FieldKind, FieldPattern> =
            fields.into_iter().map(|f| (f.field, f)).collect();
        let confidence = if fields.is_empty() {
            0.0
        } else {
            fields.values().map(|f| f.confidence).sum::<f64>() / fields.len() as f64
        };
        SitePattern {
            site_id: "example.jp".to_string(),
            base_url: PAGE_URL.to_string(),
            learned_at: Utc::now(),
            block_signature: "property-card".to_string(),
            fields,
            confidence,
        }
    }

    fn field(kind: FieldKind, locator: Locator, confidence: f64) -> FieldPattern {
        FieldPattern {
            field: kind,
            locator,
            confidence,
            samples: Vec::new(),
        }
    }

    fn classes(name: &str) -> Locator {
        Locator::Classes(vec![name.to_string()])
    }

    fn full_pattern(price_confidence: f64) -> SitePattern {
        pattern_with(vec![
            field(FieldKind::Price, classes("price"), price_confidence),
            field(FieldKind::Address, classes("addr"), 1.0),
            field(FieldKind::Area, classes("spec"), 1.0),
        ])
    }

    fn card(price: &str, i: usize) -> String {
        format!(
            r#"<li class="property-card">
                 <p class="price">{price}</p>
                 <p class="addr">東京都品川区東品川{i}-2-3</p>
                 <p class="spec">55.3㎡</p>
                 <a href="/bukken/9876543{i}/">詳細</a>
               </li>"#
        )
    }

    fn page(cards: &[String]) -> Html {
        Html::parse_document(&format!(
            "<html><body><ul>{}</ul></body></html>",
            cards.join("\n")
        ))
    }

    #[test]
    fn test_extracts_records_in_document_order() {
        let catalogue = FieldCatalogue::new();
        let engine = ExtractionEngine::new(&catalogue);
        let cards: Vec<String> = (0..3).map(|i| card("3,980万円", i)).collect();
        let document = page(&cards);

        let records = engine.extract(&document, &full_pattern(1.0), PAGE_URL);
        assert_eq!(records.len(), 3);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.price_yen(), Some(39_800_000));
            assert_eq!(record.listing_id, format!("9876543{i}"));
            assert_eq!(
                record.fields.get(&FieldKind::Area),
                Some(&FieldValue::Area(55.3))
            );
            assert_eq!(record.confidence, 1.0);
            assert_eq!(record.source_url, PAGE_URL);
        }
    }

    #[test]
    fn test_price_bounds_reject_records() {
        let catalogue = FieldCatalogue::new();
        let engine = ExtractionEngine::new(&catalogue);

        // 0.05万円 = 500 yen: below the floor.
        let document = page(&[card("0.05万円", 0)]);
        assert!(engine.extract(&document, &full_pattern(1.0), PAGE_URL).is_empty());

        // 500億円 = 50,000,000,000 yen: above the ceiling.
        let document = page(&[card("500億円", 0)]);
        assert!(engine.extract(&document, &full_pattern(1.0), PAGE_URL).is_empty());

        // Bounds are inclusive.
        let document = page(&[card("100万円", 0)]);
        assert_eq!(
            engine.extract(&document, &full_pattern(1.0), PAGE_URL)[0].price_yen(),
            Some(1_000_000)
        );
    }

    #[test]
    fn test_rental_price_yields_no_record() {
        let catalogue = FieldCatalogue::new();
        let engine = ExtractionEngine::new(&catalogue);
        let document = page(&[card("12万円/月", 0)]);
        assert!(engine.extract(&document, &full_pattern(1.0), PAGE_URL).is_empty());
    }

    #[test]
    fn test_confidence_floor_boundary() {
        let catalogue = FieldCatalogue::new();
        let engine = ExtractionEngine::new(&catalogue);
        // Single-field pattern so the record confidence equals the field's.
        let pattern_029 = pattern_with(vec![field(FieldKind::Price, classes("price"), 0.29)]);
        let pattern_030 = pattern_with(vec![field(FieldKind::Price, classes("price"), 0.30)]);
        let document = page(&[card("3,980万円", 0)]);

        assert!(engine.extract(&document, &pattern_029, PAGE_URL).is_empty());
        assert_eq!(engine.extract(&document, &pattern_030, PAGE_URL).len(), 1);
    }

    #[test]
    fn test_missing_fields_are_omitted_not_zeroed() {
        let catalogue = FieldCatalogue::new();
        let engine = ExtractionEngine::new(&catalogue);
        // The pattern knows an address locator the page no longer carries.
        let pattern = pattern_with(vec![
            field(FieldKind::Price, classes("price"), 0.9),
            field(FieldKind::Address, classes("gone"), 0.1),
        ]);
        let document = page(&[card("3,980万円", 0)]);

        let records = engine.extract(&document, &pattern, PAGE_URL);
        assert_eq!(records.len(), 1);
        assert!(!records[0].fields.contains_key(&FieldKind::Address));
        // Confidence averages only the price locator, not the missing one.
        assert!((records[0].confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_listing_id_falls_back_to_link_hash() {
        let catalogue = FieldCatalogue::new();
        let engine = ExtractionEngine::new(&catalogue);
        let card = r#"<li class="property-card">
                        <p class="price">3,980万円</p>
                        <a href="/bukken/no-digits/">詳細</a>
                      </li>"#
            .to_string();
        let pattern = pattern_with(vec![field(FieldKind::Price, classes("price"), 1.0)]);
        let document = page(&[card]);

        let records = engine.extract(&document, &pattern, PAGE_URL);
        assert_eq!(records.len(), 1);
        let id = &records[0].listing_id;
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(id, &content_hash("https://example.jp/bukken/no-digits/"));
    }

    #[test]
    fn test_listing_id_uses_last_digit_run() {
        let catalogue = FieldCatalogue::new();
        let engine = ExtractionEngine::new(&catalogue);
        let card = r#"<li class="property-card">
                        <p class="price">3,980万円</p>
                        <a href="/area/13109/bukken/55500123/">詳細</a>
                      </li>"#
            .to_string();
        let pattern = pattern_with(vec![field(FieldKind::Price, classes("price"), 1.0)]);
        let document = page(&[card]);

        let records = engine.extract(&document, &pattern, PAGE_URL);
        assert_eq!(records[0].listing_id, "55500123");
    }

    #[test]
    fn test_positional_locator_resolution() {
        let catalogue = FieldCatalogue::new();
        let engine = ExtractionEngine::new(&catalogue);
        let card = r#"<li class="property-card">
                        <span>駅徒歩5分</span><span>3,980万円</span>
                      </li>"#
            .to_string();
        let pattern = pattern_with(vec![field(
            FieldKind::Price,
            Locator::Nth {
                tag: "span".to_string(),
                position: 2,
            },
            1.0,
        )]);
        let document = page(&[card]);

        let records = engine.extract(&document, &pattern, PAGE_URL);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].price_yen(), Some(39_800_000));
    }

    #[test]
    fn test_one_bad_block_does_not_abort_the_page() {
        let catalogue = FieldCatalogue::new();
        let engine = ExtractionEngine::new(&catalogue);
        let cards = vec![
            card("3,980万円", 0),
            // Price node present but unparseable: block dropped, not fatal.
            card("お問い合わせください", 1),
            card("4,180万円", 2),
        ];
        let document = page(&cards);

        let records = engine.extract(&document, &full_pattern(1.0), PAGE_URL);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].listing_id, "98765430");
        assert_eq!(records[1].listing_id, "98765432");
    }

    #[test]
    fn test_resolve_url() {
        assert_eq!(
            resolve_url(PAGE_URL, "/bukken/123/"),
            "https://example.jp/bukken/123/"
        );
        assert_eq!(
            resolve_url(PAGE_URL, "https://other.jp/x"),
            "https://other.jp/x"
        );
    }
}

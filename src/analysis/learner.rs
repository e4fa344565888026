//! Per-field locator learning by majority vote over sampled listing blocks.

use crate::analysis::grouping::ElementGroup;
use crate::dom::{element_text, same_tag_position, sorted_classes};
use crate::fields::{FieldCatalogue, FieldKind, PatternFamily};
use crate::pattern::{FieldPattern, Locator, SitePattern};
use chrono::Utc;
use scraper::ElementRef;
use std::collections::BTreeMap;
use tracing::info;

/// How many group members are sampled for locator learning.
pub const SAMPLE_LIMIT: usize = 10;

/// How many matched values are kept per field as diagnostics.
pub const SAMPLE_VALUE_LIMIT: usize = 3;

/// Learn a complete [`SitePattern`] from the winning element group.
///
/// For each field in the catalogue, every sampled member is searched for the
/// tightest descendant whose visible text matches the field's pattern family;
/// the locators derived from those nodes are tallied and the most frequent
/// one wins (ties keep the first seen). Confidence is the winner's frequency
/// over the samples that produced *any* candidate, so fields legitimately
/// absent from some blocks are not penalized. Fields with no candidates at
/// all are omitted.
///
/// This is pure computation: persisting the result is the caller's business.
pub fn learn_site_pattern(
    group: &ElementGroup<'_>,
    catalogue: &FieldCatalogue,
    site_id: &str,
    base_url: &str,
) -> SitePattern {
    let samples: Vec<ElementRef<'_>> = group.members.iter().take(SAMPLE_LIMIT).copied().collect();

    let mut fields = BTreeMap::new();
    for kind in FieldKind::ALL {
        let family = catalogue.family(kind);
        let mut candidates: Vec<(Locator, String)> = Vec::new();
        for sample in &samples {
            if let Some((node, value)) = find_field_node(*sample, family) {
                candidates.push((locator_for(node), value));
            }
        }
        if candidates.is_empty() {
            continue;
        }

        let (locator, count) = majority_locator(&candidates);
        let confidence = count as f64 / candidates.len() as f64;
        let sample_values: Vec<String> = candidates
            .iter()
            .filter(|(l, _)| *l == locator)
            .map(|(_, v)| v.clone())
            .take(SAMPLE_VALUE_LIMIT)
            .collect();

        fields.insert(
            kind,
            FieldPattern {
                field: kind,
                locator,
                confidence,
                samples: sample_values,
            },
        );
    }

    let confidence = aggregate_confidence(&fields);
    info!(
        "learned pattern for {} with {} field(s), aggregate confidence {:.2}",
        site_id,
        fields.len(),
        confidence
    );

    SitePattern {
        site_id: site_id.to_string(),
        base_url: base_url.to_string(),
        learned_at: Utc::now(),
        block_signature: group.class_signature.clone(),
        fields,
        confidence,
    }
}

/// Search the block's descendants for the tightest element whose visible
/// text matches the family: a match is pushed down to the deepest element
/// that still contains it, so locators land on leaf-ish nodes rather than
/// wrapper containers.
fn find_field_node<'a>(
    block: ElementRef<'a>,
    family: &PatternFamily,
) -> Option<(ElementRef<'a>, String)> {
    block
        .children()
        .filter_map(ElementRef::wrap)
        .find_map(|child| tightest_in(child, family))
}

fn tightest_in<'a>(el: ElementRef<'a>, family: &PatternFamily) -> Option<(ElementRef<'a>, String)> {
    let text = element_text(&el);
    let matched = family.first_match(&text)?.to_string();
    if let Some(deeper) = el
        .children()
        .filter_map(ElementRef::wrap)
        .find_map(|child| tightest_in(child, family))
    {
        return Some(deeper);
    }
    Some((el, matched))
}

/// Locator for a node relative to its containing block: class-based when the
/// node carries classes, positional (tag + 1-based same-tag sibling index)
/// otherwise.
fn locator_for(node: ElementRef<'_>) -> Locator {
    let classes = sorted_classes(&node);
    if !classes.is_empty() {
        return Locator::Classes(classes);
    }
    Locator::Nth {
        tag: node.value().name().to_string(),
        position: same_tag_position(&node),
    }
}

/// Most frequent locator; ties keep the first-seen one.
fn majority_locator(candidates: &[(Locator, String)]) -> (Locator, usize) {
    let mut tally: Vec<(Locator, usize)> = Vec::new();
    for (locator, _) in candidates {
        match tally.iter_mut().find(|(l, _)| l == locator) {
            Some((_, n)) => *n += 1,
            None => tally.push((locator.clone(), 1)),
        }
    }
    let mut best = tally[0].clone();
    for entry in tally.into_iter().skip(1) {
        if entry.1 > best.1 {
            best = entry;
        }
    }
    best
}

fn aggregate_confidence(fields: &BTreeMap<FieldKind, FieldPattern>) -> f64 {
    if fields.is_empty() {
        return 0.0;
    }
    fields.values().map(|f| f.confidence).sum::<f64>() / fields.len() as f64
}

//! Scores whether a candidate group actually holds property listings.

use crate::analysis::grouping::ElementGroup;
use crate::dom::element_text;
use crate::fields::{FieldCatalogue, FieldKind};
use tracing::debug;

/// How many group members are sampled for scoring.
pub const SAMPLE_LIMIT: usize = 5;

/// A group must score strictly above this to be accepted as the page's
/// listing-block pattern.
pub const ACCEPT_THRESHOLD: f64 = 0.5;

/// Mean per-sample likelihood that the group's members are listings.
///
/// Each sampled member contributes 0.3 if any price pattern matches its full
/// text, 0.3 for an address match, and 0.2 for an area-or-floor-plan match
/// (per-sample maximum 0.8).
pub fn score_group(group: &ElementGroup<'_>, catalogue: &FieldCatalogue) -> f64 {
    let mut total = 0.0;
    let mut sampled = 0usize;
    for member in group.members.iter().take(SAMPLE_LIMIT) {
        let text = element_text(member);
        let mut score = 0.0;
        if catalogue.family(FieldKind::Price).is_match(&text) {
            score += 0.3;
        }
        if catalogue.family(FieldKind::Address).is_match(&text) {
            score += 0.3;
        }
        if catalogue.matches_area_or_plan(&text) {
            score += 0.2;
        }
        total += score;
        sampled += 1;
    }
    if sampled == 0 {
        0.0
    } else {
        total / sampled as f64
    }
}

/// Pick the highest-scoring group, provided it clears [`ACCEPT_THRESHOLD`].
/// Ties keep the earlier group in document order.
pub fn select_listing_group<'a>(
    groups: Vec<ElementGroup<'a>>,
    catalogue: &FieldCatalogue,
) -> Option<(ElementGroup<'a>, f64)> {
    let mut best: Option<(ElementGroup<'a>, f64)> = None;
    for group in groups {
        let score = score_group(&group, catalogue);
        debug!("group {:?} scored {:.2}", group.class_signature, score);
        match &best {
            Some((_, leader)) if *leader >= score => {}
            _ => best = Some((group, score)),
        }
    }
    best.filter(|(_, score)| *score > ACCEPT_THRESHOLD)
}

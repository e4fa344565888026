//! Repeated-block discovery: groups block-level elements by class signature
//! and keeps only structurally cohesive groups.

use crate::analysis::signature::{similarity, StructureSignature};
use crate::dom::{block_elements, class_signature};
use scraper::{ElementRef, Html};
use std::collections::HashMap;
use tracing::debug;

/// Minimum members for a group to count as a listing-grid candidate. A
/// single repeated pair is not strong enough evidence of a listing grid.
pub const MIN_GROUP_SIZE: usize = 3;

/// Every member must score at least this against the group's first member.
pub const COHESION_THRESHOLD: f64 = 0.8;

/// An ordered run of block elements sharing a normalized class signature.
pub struct ElementGroup<'a> {
    /// Shared class signature (sorted, space-joined).
    pub class_signature: String,
    /// Members in document order.
    pub members: Vec<ElementRef<'a>>,
}

/// Find all listing-block candidate groups on the page, in document order of
/// their first member.
///
/// Groups smaller than [`MIN_GROUP_SIZE`] are dropped outright. Cohesion is
/// all-or-nothing: one member under [`COHESION_THRESHOLD`] rejects the whole
/// group, so grids polluted by unrelated widgets never survive.
pub fn find_candidate_groups(document: &Html) -> Vec<ElementGroup<'_>> {
    let mut order: Vec<String> = Vec::new();
    let mut buckets: HashMap<String, Vec<ElementRef<'_>>> = HashMap::new();

    for el in block_elements(document) {
        let signature = class_signature(&el);
        if signature.is_empty() {
            continue;
        }
        match buckets.get_mut(&signature) {
            Some(members) => members.push(el),
            None => {
                order.push(signature.clone());
                buckets.insert(signature, vec![el]);
            }
        }
    }

    let mut groups = Vec::new();
    for signature in order {
        let members = buckets.remove(&signature).unwrap_or_default();
        if members.len() < MIN_GROUP_SIZE {
            continue;
        }
        if !is_cohesive(&members) {
            debug!("group {:?} rejected: structurally incohesive", signature);
            continue;
        }
        groups.push(ElementGroup {
            class_signature: signature,
            members,
        });
    }
    groups
}

fn is_cohesive(members: &[ElementRef<'_>]) -> bool {
    let reference = StructureSignature::of(&members[0]);
    members
        .iter()
        .skip(1)
        .all(|m| similarity(&reference, &StructureSignature::of(m)) >= COHESION_THRESHOLD)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(body: &str) -> String {
        format!(r#"<li class="property-card">{body}</li>"#)
    }

    fn page(cards: &[String]) -> Html {
        Html::parse_document(&format!(
            "<html><body><ul>{}</ul></body></html>",
            cards.join("\n")
        ))
    }

    #[test]
    fn test_three_identical_blocks_form_a_group() {
        let cards: Vec<String> = (0..3)
            .map(|i| card(&format!("<p>物件{i}</p><a href='/b/{i}'>詳細</a>")))
            .collect();
        let document = page(&cards);
        let groups = find_candidate_groups(&document);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].class_signature, "property-card");
        assert_eq!(groups[0].members.len(), 3);
    }

    #[test]
    fn test_two_blocks_never_form_a_group() {
        // Known-too-small fixture: the 3-member floor rejects a 2-item grid.
        let cards: Vec<String> = (0..2)
            .map(|i| card(&format!("<p>物件{i}</p><a href='/b/{i}'>詳細</a>")))
            .collect();
        let document = page(&cards);
        assert!(find_candidate_groups(&document).is_empty());
    }

    #[test]
    fn test_polluted_group_is_rejected_whole() {
        // Same class, but one member has a completely different shape.
        let mut cards: Vec<String> = (0..3)
            .map(|i| card(&format!("<p>物件{i}</p><a href='/b/{i}'><img src='{i}.jpg'></a>")))
            .collect();
        cards.push(card(
            "<table><tr><td>営業時間</td></tr></table><form><input></form><p>店舗案内</p>",
        ));
        let document = page(&cards);
        assert!(find_candidate_groups(&document).is_empty());
    }

    #[test]
    fn test_classless_blocks_are_not_grouped() {
        let document = Html::parse_document(
            "<html><body><div>a</div><div>b</div><div>c</div></body></html>",
        );
        assert!(find_candidate_groups(&document).is_empty());
    }

    #[test]
    fn test_groups_in_document_order() {
        let html = format!(
            "<html><body>
               <ul>{}{}{}</ul>
               <div class='ad'>x</div><div class='ad'>y</div><div class='ad'>z</div>
             </body></html>",
            card("<p>a</p>"),
            card("<p>b</p>"),
            card("<p>c</p>"),
        );
        let document = Html::parse_document(&html);
        let groups = find_candidate_groups(&document);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].class_signature, "property-card");
        assert_eq!(groups[1].class_signature, "ad");
    }
}

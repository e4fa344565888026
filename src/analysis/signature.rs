//! Structural shape signatures and pairwise similarity scoring.

use crate::dom::{contains_image, contains_link, element_text, sorted_classes};
use scraper::ElementRef;

/// Visible-text lengths closer than this many characters count as matching.
pub const TEXT_LEN_TOLERANCE: usize = 50;

/// The structural shape of one element, derived on demand for similarity
/// scoring. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct StructureSignature {
    /// Tag name.
    pub tag: String,
    /// Sorted class list.
    pub classes: Vec<String>,
    /// Immediate children as `(tag, sorted classes)` pairs.
    pub children: Vec<(String, Vec<String>)>,
    /// Visible-text length in characters.
    pub text_len: usize,
    /// Whether an `<a href>` descendant is present.
    pub has_link: bool,
    /// Whether an `<img>` descendant is present.
    pub has_image: bool,
}

impl StructureSignature {
    pub fn of(el: &ElementRef<'_>) -> Self {
        let children = el
            .children()
            .filter_map(ElementRef::wrap)
            .map(|c| (c.value().name().to_string(), sorted_classes(&c)))
            .collect();
        Self {
            tag: el.value().name().to_string(),
            classes: sorted_classes(el),
            children,
            text_len: element_text(el).chars().count(),
            has_link: contains_link(el),
            has_image: contains_image(el),
        }
    }
}

/// Weighted sum of six binary criteria, in `[0.0, 1.0]`.
///
/// Tag equality 0.30, class-list equality 0.30, equal child count 0.20,
/// text-length difference under [`TEXT_LEN_TOLERANCE`] 0.10, matching link
/// presence 0.05, matching image presence 0.05. No partial credit within a
/// criterion. Points accumulate as integers so identical signatures score
/// exactly 1.0.
pub fn similarity(a: &StructureSignature, b: &StructureSignature) -> f64 {
    let mut points: u32 = 0;
    if a.tag == b.tag {
        points += 30;
    }
    if a.classes == b.classes {
        points += 30;
    }
    if a.children.len() == b.children.len() {
        points += 20;
    }
    if a.text_len.abs_diff(b.text_len) < TEXT_LEN_TOLERANCE {
        points += 10;
    }
    if a.has_link == b.has_link {
        points += 5;
    }
    if a.has_image == b.has_image {
        points += 5;
    }
    f64::from(points) / 100.0
}

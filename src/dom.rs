//! DOM access helpers shared by structure analysis and extraction.
//!
//! All functions here operate on `scraper` element references and are
//! synchronous; `scraper`'s types are `!Send`, so async callers should wrap
//! whole-page operations in `tokio::task::spawn_blocking`.

use scraper::{ElementRef, Html};

/// Block-level container tags considered as listing-block candidates.
pub const BLOCK_CONTAINER_TAGS: [&str; 5] = ["div", "li", "article", "section", "tr"];

/// Whether a tag belongs to the block-container candidate set.
pub fn is_block_container(tag: &str) -> bool {
    BLOCK_CONTAINER_TAGS.contains(&tag)
}

/// Collect all visible text content from an element, trimmed and whitespace-
/// collapsed.
pub fn element_text(el: &ElementRef<'_>) -> String {
    el.text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// The element's class list, sorted and deduplicated.
pub fn sorted_classes(el: &ElementRef<'_>) -> Vec<String> {
    let mut classes: Vec<String> = el.value().classes().map(str::to_string).collect();
    classes.sort();
    classes.dedup();
    classes
}

/// Normalized class signature: the sorted class list joined by single spaces.
/// Empty for classless elements.
pub fn class_signature(el: &ElementRef<'_>) -> String {
    sorted_classes(el).join(" ")
}

/// All descendant elements of `el` in document order, excluding `el` itself.
pub fn descendant_elements<'a>(el: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    let root_id = el.id();
    el.descendants()
        .filter_map(ElementRef::wrap)
        .filter(move |e| e.id() != root_id)
}

/// All block-container elements of the document, in document order.
pub fn block_elements<'a>(document: &'a Html) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|e| is_block_container(e.value().name()))
}

/// Whether the element contains an `<a href>` descendant.
pub fn contains_link(el: &ElementRef<'_>) -> bool {
    descendant_elements(*el).any(|e| e.value().name() == "a" && e.value().attr("href").is_some())
}

/// Whether the element contains an `<img>` descendant.
pub fn contains_image(el: &ElementRef<'_>) -> bool {
    descendant_elements(*el).any(|e| e.value().name() == "img")
}

/// 1-based position of the element among its same-tag siblings.
pub fn same_tag_position(el: &ElementRef<'_>) -> usize {
    let tag = el.value().name();
    el.prev_siblings()
        .filter_map(ElementRef::wrap)
        .filter(|s| s.value().name() == tag)
        .count()
        + 1
}

//! The semantic field catalogue: what this engine knows how to recognize.
//!
//! Each field kind carries an ordered regex family ("attempt to match a value
//! in text"; the first pattern that hits anywhere wins) and a typed parser
//! ("parse matched text to a typed value"). The same catalogue instance is
//! shared by the likelihood evaluator, the field-mapping learner, and the
//! extraction engine, so the three stages always agree on what counts as a
//! price, an address, and so on.
//!
//! The families target the text conventions of Japanese property portals:
//! 億/万円 price forms, prefecture-rooted addresses, ㎡/平米/坪 floor areas,
//! nLDK floor plans and 築N年 construction ages.

use chrono::{Datelike, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One square tsubo in square meters.
pub const TSUBO_TO_SQM: f64 = 3.30579;

/// Text fragments that mark a money amount as monthly rent rather than a
/// sale price.
const RENTAL_MARKERS: [&str; 5] = ["月額", "/月", "家賃", "賃料", "月々"];

// ── Field kinds ──────────────────────────────────────────────────────────────

/// The fixed set of semantic fields the engine can learn locators for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Price,
    Address,
    Area,
    FloorPlan,
    BuildingType,
    ConstructionYear,
    ListingCompany,
}

impl FieldKind {
    /// Every field kind, in catalogue order.
    pub const ALL: [FieldKind; 7] = [
        FieldKind::Price,
        FieldKind::Address,
        FieldKind::Area,
        FieldKind::FloorPlan,
        FieldKind::BuildingType,
        FieldKind::ConstructionYear,
        FieldKind::ListingCompany,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Price => "price",
            FieldKind::Address => "address",
            FieldKind::Area => "area",
            FieldKind::FloorPlan => "floor_plan",
            FieldKind::BuildingType => "building_type",
            FieldKind::ConstructionYear => "construction_year",
            FieldKind::ListingCompany => "listing_company",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed field value produced by extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// Sale price in yen.
    Price(u64),
    /// Floor area in square meters.
    Area(f64),
    /// Construction year (Gregorian).
    Year(i32),
    /// Pass-through text for the remaining fields.
    Text(String),
}

impl FieldValue {
    pub fn as_price(&self) -> Option<u64> {
        match self {
            FieldValue::Price(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_area(&self) -> Option<f64> {
        match self {
            FieldValue::Area(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

// ── Pattern families ─────────────────────────────────────────────────────────

const PRICE_PATTERNS: &[&str] = &[
    r"\d[\d,，]*億(?:[\d,，]+(?:\.\d+)?万)?円",
    r"\d[\d,，]*(?:\.\d+)?万円",
    r"\d{1,3}(?:[,，]\d{3})+円",
];

const ADDRESS_PATTERNS: &[&str] = &[
    r"(?:東京都|北海道|大阪府|京都府|\p{Han}{2,3}県)\p{Han}{1,6}[市区町村郡][\p{Han}\p{Hiragana}\p{Katakana}ー0-9０-９−\-]*",
    r"\p{Han}{2,6}市\p{Han}{1,6}区[\p{Han}\p{Hiragana}\p{Katakana}ー0-9０-９−\-]*",
];

const AREA_PATTERNS: &[&str] = &[
    r"\d+(?:\.\d+)?\s*(?:㎡|m²|m2|平米)",
    r"\d+(?:\.\d+)?\s*坪",
];

const FLOOR_PLAN_PATTERNS: &[&str] = &[r"[1-9][0-9]?(?:S?LDK|[SL]?DK|[KR])", r"ワンルーム"];

const BUILDING_TYPE_PATTERNS: &[&str] =
    &[r"(?:新築|中古)?(?:一戸建て?|戸建て?|マンション|アパート|テラスハウス|タウンハウス|土地)"];

const CONSTRUCTION_YEAR_PATTERNS: &[&str] = &[
    r"築年月\s*[:：]?\s*(?:19|20)\d{2}年",
    r"(?:19|20)\d{2}年(?:築|建築)",
    r"築\s*\d{1,3}年",
];

const LISTING_COMPANY_PATTERNS: &[&str] = &[
    r"(?:株式会社|有限会社)\S{1,30}",
    r"\S{2,20}(?:不動産|ハウジング|エステート|リアルティ)",
];

/// An ordered list of alternative patterns for one field; the first pattern
/// that matches anywhere in the text wins.
pub struct PatternFamily {
    patterns: Vec<Regex>,
}

impl PatternFamily {
    fn compile(patterns: &[&str]) -> Self {
        Self {
            patterns: patterns
                .iter()
                .map(|p| Regex::new(p).expect("field pattern regex is valid"))
                .collect(),
        }
    }

    /// The winning match for this family, if any pattern hits.
    pub fn first_match<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.patterns
            .iter()
            .find_map(|re| re.find(text))
            .map(|m| m.as_str())
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(text))
    }
}

// ── Catalogue ────────────────────────────────────────────────────────────────

/// Compiled pattern families plus the value parsers, built once and shared.
pub struct FieldCatalogue {
    // Indexed by `FieldKind as usize`, in `FieldKind::ALL` order.
    families: [PatternFamily; 7],
    price_oku: Regex,
    price_man: Regex,
    price_yen: Regex,
    area_sqm: Regex,
    area_tsubo: Regex,
    leading_number: Regex,
    year_explicit: Regex,
    year_age: Regex,
}

impl Default for FieldCatalogue {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldCatalogue {
    pub fn new() -> Self {
        Self {
            families: [
                PatternFamily::compile(PRICE_PATTERNS),
                PatternFamily::compile(ADDRESS_PATTERNS),
                PatternFamily::compile(AREA_PATTERNS),
                PatternFamily::compile(FLOOR_PLAN_PATTERNS),
                PatternFamily::compile(BUILDING_TYPE_PATTERNS),
                PatternFamily::compile(CONSTRUCTION_YEAR_PATTERNS),
                PatternFamily::compile(LISTING_COMPANY_PATTERNS),
            ],
            price_oku: Regex::new(r"(\d+)億(?:(\d+(?:\.\d+)?)万)?円").expect("price regex is valid"),
            price_man: Regex::new(r"(\d+(?:\.\d+)?)万円").expect("price regex is valid"),
            price_yen: Regex::new(r"(\d{4,})円").expect("price regex is valid"),
            area_sqm: Regex::new(r"(\d+(?:\.\d+)?)\s*(?:㎡|m²|m2|平米)").expect("area regex is valid"),
            area_tsubo: Regex::new(r"(\d+(?:\.\d+)?)\s*坪").expect("area regex is valid"),
            leading_number: Regex::new(r"\d+(?:\.\d+)?").expect("number regex is valid"),
            year_explicit: Regex::new(r"((?:19|20)\d{2})年").expect("year regex is valid"),
            year_age: Regex::new(r"築\s*(\d{1,3})年").expect("year regex is valid"),
        }
    }

    /// The match family for a field kind.
    pub fn family(&self, kind: FieldKind) -> &PatternFamily {
        &self.families[kind as usize]
    }

    /// Whether the text contains an area or a floor-plan expression. The
    /// likelihood evaluator treats these as one signal.
    pub fn matches_area_or_plan(&self, text: &str) -> bool {
        self.family(FieldKind::Area).is_match(text) || self.family(FieldKind::FloorPlan).is_match(text)
    }

    /// Parse a located node's text into the field's typed value.
    pub fn parse_value(&self, kind: FieldKind, text: &str) -> Option<FieldValue> {
        match kind {
            FieldKind::Price => self.parse_price_yen(text).map(FieldValue::Price),
            FieldKind::Area => self.parse_area_sqm(text).map(FieldValue::Area),
            FieldKind::ConstructionYear => self.parse_construction_year(text).map(FieldValue::Year),
            _ => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(FieldValue::Text(trimmed.to_string()))
                }
            }
        }
    }

    /// Parse a sale price in yen. `X億Y万円` resolves to X·10⁸ + Y·10⁴,
    /// `X万円` to X·10⁴. Text carrying a rental qualifier yields no price.
    pub fn parse_price_yen(&self, text: &str) -> Option<u64> {
        if RENTAL_MARKERS.iter().any(|m| text.contains(m)) {
            return None;
        }
        let cleaned: String = text
            .chars()
            .filter(|c| !matches!(c, ',' | '，' | ' ' | '\u{3000}'))
            .collect();

        if let Some(caps) = self.price_oku.captures(&cleaned) {
            let oku: f64 = caps[1].parse().ok()?;
            let man: f64 = match caps.get(2) {
                Some(m) => m.as_str().parse().ok()?,
                None => 0.0,
            };
            return Some((oku * 100_000_000.0 + man * 10_000.0).round() as u64);
        }
        if let Some(caps) = self.price_man.captures(&cleaned) {
            let man: f64 = caps[1].parse().ok()?;
            return Some((man * 10_000.0).round() as u64);
        }
        if let Some(caps) = self.price_yen.captures(&cleaned) {
            return caps[1].parse().ok();
        }
        None
    }

    /// Parse a floor area in square meters; 坪 (tsubo) values are converted.
    pub fn parse_area_sqm(&self, text: &str) -> Option<f64> {
        let value = if let Some(caps) = self.area_sqm.captures(text) {
            caps[1].parse::<f64>().ok()?
        } else if let Some(caps) = self.area_tsubo.captures(text) {
            caps[1].parse::<f64>().ok()? * TSUBO_TO_SQM
        } else {
            self.leading_number.find(text)?.as_str().parse::<f64>().ok()?
        };
        (value > 0.0 && value < 100_000.0).then_some(value)
    }

    /// Parse a construction year: an explicit 4-digit year, or 築N年 counted
    /// back from the current year. Values outside [1900, current year] are
    /// discarded.
    pub fn parse_construction_year(&self, text: &str) -> Option<i32> {
        let current = Utc::now().year();
        let year = if let Some(caps) = self.year_explicit.captures(text) {
            caps[1].parse::<i32>().ok()?
        } else if let Some(caps) = self.year_age.captures(text) {
            current - caps[1].parse::<i32>().ok()?
        } else {
            return None;
        };
        (1900..=current).contains(&year).then_some(year)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

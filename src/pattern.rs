//! Learned site patterns: the durable output of structure discovery.

use crate::error::PatternError;
use crate::fields::FieldKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A resolvable reference to one descendant node within a listing block.
///
/// Persisted as a string: `class:<sorted classes>` or `nth:<tag>:<position>`
/// (1-based position among same-tag siblings).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Locator {
    /// Matches the first descendant carrying exactly this sorted class list.
    Classes(Vec<String>),
    /// Matches the first descendant of `tag` at this same-tag sibling index.
    Nth { tag: String, position: usize },
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Classes(classes) => write!(f, "class:{}", classes.join(" ")),
            Locator::Nth { tag, position } => write!(f, "nth:{tag}:{position}"),
        }
    }
}

impl FromStr for Locator {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(rest) = s.strip_prefix("class:") {
            let classes: Vec<String> = rest.split_whitespace().map(str::to_string).collect();
            if classes.is_empty() {
                return Err(PatternError::InvalidLocator(s.to_string()));
            }
            return Ok(Locator::Classes(classes));
        }
        if let Some(rest) = s.strip_prefix("nth:") {
            let (tag, position) = rest
                .split_once(':')
                .ok_or_else(|| PatternError::InvalidLocator(s.to_string()))?;
            let position: usize = position
                .parse()
                .map_err(|_| PatternError::InvalidLocator(s.to_string()))?;
            if tag.is_empty() || position == 0 {
                return Err(PatternError::InvalidLocator(s.to_string()));
            }
            return Ok(Locator::Nth {
                tag: tag.to_string(),
                position,
            });
        }
        Err(PatternError::InvalidLocator(s.to_string()))
    }
}

impl TryFrom<String> for Locator {
    type Error = PatternError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Locator> for String {
    fn from(locator: Locator) -> String {
        locator.to_string()
    }
}

/// Learned locator for one semantic field, with its vote confidence and up
/// to three matched values kept as diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldPattern {
    pub field: FieldKind,
    pub locator: Locator,
    pub confidence: f64,
    #[serde(default)]
    pub samples: Vec<String>,
}

/// The complete learned pattern for one site.
///
/// Created whole on a successful learn and replaced whole on re-learning;
/// never partially mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SitePattern {
    pub site_id: String,
    pub base_url: String,
    pub learned_at: DateTime<Utc>,
    /// Normalized class signature shared by the listing blocks.
    pub block_signature: String,
    pub fields: BTreeMap<FieldKind, FieldPattern>,
    /// Mean of the per-field confidences.
    pub confidence: f64,
}

impl SitePattern {
    pub fn field(&self, kind: FieldKind) -> Option<&FieldPattern> {
        self.fields.get(&kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_string_round_trip() {
        for locator in [
            Locator::Classes(vec!["price".to_string(), "tax-in".to_string()]),
            Locator::Nth {
                tag: "span".to_string(),
                position: 2,
            },
        ] {
            let text = locator.to_string();
            assert_eq!(text.parse::<Locator>().unwrap(), locator);
        }
    }

    #[test]
    fn test_locator_rejects_malformed_strings() {
        for bad in ["", "class:", "nth:span", "nth:span:0", "nth::3", "css:.price"] {
            assert!(bad.parse::<Locator>().is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn test_site_pattern_json_round_trip() {
        let mut fields = BTreeMap::new();
        fields.insert(
            FieldKind::Price,
            FieldPattern {
                field: FieldKind::Price,
                locator: Locator::Classes(vec!["property-price".to_string()]),
                confidence: 0.9,
                samples: vec!["3,980万円".to_string()],
            },
        );
        let pattern = SitePattern {
            site_id: "example.jp".to_string(),
            base_url: "https://example.jp/list".to_string(),
            learned_at: Utc::now(),
            block_signature: "property-card".to_string(),
            fields,
            confidence: 0.9,
        };

        let json = serde_json::to_string_pretty(&pattern).unwrap();
        assert!(json.contains("\"class:property-price\""));
        let back: SitePattern = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pattern);
    }

    #[test]
    fn test_corrupt_locator_fails_deserialization() {
        let json = r#"{"field":"price","locator":"css:.price","confidence":1.0}"#;
        assert!(serde_json::from_str::<FieldPattern>(json).is_err());
    }
}

//! Write-back filtering for the live feed
//!
//! The downstream indexer stamps a handful of fields (timestamps, job ids,
//! crawl markers) on every document it touches. Those writes come back
//! through the feed; forwarding them would reprocess the document forever.
//!
//! Rules are dot-delimited field paths. A segment of `$` or `*` matches
//! exactly one numeric array index, so `styles.$.modifiedAt` matches
//! `styles.3.modifiedAt` but not `styles.modifiedAt` or `styles.x.modifiedAt`.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeSet;
use thiserror::Error;

/// Fields rewritten by the downstream indexer on every pass
pub const DEFAULT_IGNORED_FIELDS: &[&str] = &[
    "modifiedAt",
    "styles.$.modifiedAt",
    "styles.$.crawlerInfo.jobId",
    "styles.$.crawlerInfo.lastCrawled",
    "styles.$.variants.$.stockUpdatedAt",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("empty filter rule")]
    Empty,

    #[error("filter rule {rule:?} has an empty segment")]
    EmptySegment { rule: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// One numeric array index
    AnyIndex,
}

/// One ignorable field pattern
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FilterRule {
    pattern: String,
    segments: SmallVec<[Segment; 6]>,
}

impl FilterRule {
    pub fn parse(pattern: &str) -> Result<Self, FilterError> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err(FilterError::Empty);
        }

        let mut segments = SmallVec::new();
        for part in pattern.split('.') {
            let segment = match part {
                "" => {
                    return Err(FilterError::EmptySegment {
                        rule: pattern.to_string(),
                    })
                }
                "$" | "*" => Segment::AnyIndex,
                literal => Segment::Literal(literal.to_string()),
            };
            segments.push(segment);
        }

        Ok(Self {
            pattern: pattern.to_string(),
            segments,
        })
    }

    /// Whether a changed field path matches this rule
    pub fn matches(&self, path: &str) -> bool {
        let mut parts = path.split('.');
        for segment in &self.segments {
            let part = match parts.next() {
                Some(p) => p,
                None => return false,
            };
            let ok = match segment {
                Segment::Literal(lit) => lit == part,
                Segment::AnyIndex => !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()),
            };
            if !ok {
                return false;
            }
        }
        parts.next().is_none()
    }

    /// Anchored regular expression equivalent, for server-side matching
    pub fn to_regex(&self) -> String {
        let body: Vec<String> = self
            .segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(lit) => escape_regex(lit),
                Segment::AnyIndex => "\\d+".to_string(),
            })
            .collect();
        format!("^{}$", body.join("\\."))
    }
}

fn escape_regex(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    for c in literal.chars() {
        if "\\^$.|?*+()[]{}-/".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

impl TryFrom<String> for FilterRule {
    type Error = FilterError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        FilterRule::parse(&value)
    }
}

impl From<FilterRule> for String {
    fn from(rule: FilterRule) -> Self {
        rule.pattern
    }
}

impl std::fmt::Display for FilterRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.pattern)
    }
}

/// Decides whether a mutation carries a real change
#[derive(Debug, Clone, Default)]
pub struct FeedFilter {
    rules: Vec<FilterRule>,
}

impl FeedFilter {
    pub fn new(rules: Vec<FilterRule>) -> Self {
        Self { rules }
    }

    /// Parse a list of patterns
    pub fn from_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Self, FilterError> {
        let rules = patterns
            .iter()
            .map(|p| FilterRule::parse(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(rules))
    }

    /// The built-in write-back field set
    pub fn with_default_rules() -> Self {
        // Built-in patterns are well-formed
        Self::from_patterns(DEFAULT_IGNORED_FIELDS).unwrap_or_default()
    }

    pub fn rules(&self) -> &[FilterRule] {
        &self.rules
    }

    /// A path is ignorable when any rule matches it
    pub fn is_ignorable(&self, path: &str) -> bool {
        self.rules.iter().any(|rule| rule.matches(path))
    }

    /// Forward unless every changed path is ignorable.
    ///
    /// An empty set means the source had no field-level diff (insert,
    /// replace, delete) and is always forwarded.
    pub fn should_forward(&self, changed_fields: &BTreeSet<String>) -> bool {
        changed_fields.is_empty() || changed_fields.iter().any(|path| !self.is_ignorable(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(paths: &[&str]) -> BTreeSet<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_default_rule_scenarios() {
        let filter = FeedFilter::with_default_rules();

        assert!(!filter.should_forward(&fields(&["modifiedAt"])));
        assert!(filter.should_forward(&fields(&["modifiedAt", "price"])));
        assert!(!filter.should_forward(&fields(&["styles.3.variants.1.stockUpdatedAt"])));
        assert!(filter.should_forward(&fields(&["styles.3.title"])));
    }

    #[test]
    fn test_empty_change_set_is_forwarded() {
        let filter = FeedFilter::with_default_rules();
        assert!(filter.should_forward(&BTreeSet::new()));
    }

    #[test]
    fn test_all_noise_mixture_is_dropped() {
        let filter = FeedFilter::with_default_rules();
        let noise = fields(&[
            "modifiedAt",
            "styles.0.modifiedAt",
            "styles.12.crawlerInfo.jobId",
            "styles.12.crawlerInfo.lastCrawled",
            "styles.2.variants.40.stockUpdatedAt",
        ]);
        assert!(!filter.should_forward(&noise));
    }

    #[test]
    fn test_wildcard_requires_numeric_index() {
        let rule = FilterRule::parse("styles.$.modifiedAt").unwrap();

        assert!(rule.matches("styles.0.modifiedAt"));
        assert!(rule.matches("styles.105.modifiedAt"));
        assert!(!rule.matches("styles.modifiedAt"));
        assert!(!rule.matches("styles.x.modifiedAt"));
        assert!(!rule.matches("styles..modifiedAt"));
        assert!(!rule.matches("styles.1.modifiedAt.extra"));
        assert!(!rule.matches("prefix.styles.1.modifiedAt"));
    }

    #[test]
    fn test_exact_rule_is_anchored() {
        let rule = FilterRule::parse("modifiedAt").unwrap();

        assert!(rule.matches("modifiedAt"));
        assert!(!rule.matches("modifiedAtUtc"));
        assert!(!rule.matches("meta.modifiedAt"));
    }

    #[test]
    fn test_star_is_an_alias() {
        let rule = FilterRule::parse("styles.*.variants.*.stockUpdatedAt").unwrap();
        assert!(rule.matches("styles.3.variants.1.stockUpdatedAt"));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(FilterRule::parse("  "), Err(FilterError::Empty));
        assert!(matches!(
            FilterRule::parse("styles..title"),
            Err(FilterError::EmptySegment { .. })
        ));
    }

    #[test]
    fn test_to_regex() {
        let rule = FilterRule::parse("styles.$.variants.$.stockUpdatedAt").unwrap();
        assert_eq!(rule.to_regex(), "^styles\\.\\d+\\.variants\\.\\d+\\.stockUpdatedAt$");

        let rule = FilterRule::parse("modifiedAt").unwrap();
        assert_eq!(rule.to_regex(), "^modifiedAt$");
    }

    #[test]
    fn test_no_rules_forwards_everything() {
        let filter = FeedFilter::default();
        assert!(filter.should_forward(&fields(&["modifiedAt"])));
    }
}

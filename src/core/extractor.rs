//! Pulls the two portfolio figures out of the investor dashboard HTML.
//!
//! Each figure is located by an [`ExtractionRule`]: an anchor that identifies
//! a landmark element by attribute or label text, and a relative path from the
//! anchor to the element carrying the number. Layout around the anchors may
//! move freely; a changed anchor is reported as an extraction error instead of
//! producing a wrong number.

use crate::domain::model::{PortfolioMetrics, RawPage};
use crate::domain::ports::MetricsExtractor;
use crate::utils::error::{Result, SyncError};
use crate::utils::html::{Document, Tag, TagKind};

/// Correction added to both figures before they are written to the sheet.
pub const DEFAULT_OFFSET: i64 = 5000;

const CURRENCY_MARKS: &[&str] = &["â‚¹", "₹", "Rs.", "INR", "$"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricField {
    TotalPortfolioValue,
    MfCurrentCost,
}

impl MetricField {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricField::TotalPortfolioValue => "total_portfolio_value",
            MetricField::MfCurrentCost => "mf_current_cost",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementMatcher {
    pub tag: String,
    pub class: Option<String>,
}

impl ElementMatcher {
    pub fn new(tag: &str, class: Option<&str>) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            class: class.map(str::to_string),
        }
    }

    fn matches(&self, tag: &Tag) -> bool {
        tag.kind != TagKind::Close
            && tag.name == self.tag
            && self.class.as_deref().map_or(true, |class| tag.has_class(class))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anchor {
    /// Element whose attribute value contains the given text.
    Attribute {
        tag: String,
        name: String,
        contains: String,
    },
    /// Element whose whole text equals the given label.
    Label { tag: String, text: String },
}

impl Anchor {
    fn locate(&self, doc: &Document) -> Option<usize> {
        match self {
            Anchor::Attribute {
                tag,
                name,
                contains,
            } => doc.find(|t| {
                t.name == *tag && t.attr(name).is_some_and(|value| value.contains(contains.as_str()))
            }),
            Anchor::Label { tag, text } => {
                let mut from = 0;
                while let Some(index) = doc.find_from(from, |t| t.name == *tag) {
                    if doc.inner_text(index) == *text {
                        return Some(index);
                    }
                    from = index + 1;
                }
                None
            }
        }
    }

    fn describe(&self) -> String {
        match self {
            Anchor::Attribute {
                tag,
                name,
                contains,
            } => format!("<{} {}*=\"{}\">", tag, name, contains),
            Anchor::Label { tag, text } => format!("<{}>{}</{}>", tag, text, tag),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelativePath {
    /// First matching element nested inside the anchor.
    Descendant(ElementMatcher),
    /// First matching element after the anchor under the same parent.
    NextSibling(ElementMatcher),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRule {
    pub field: MetricField,
    pub anchor: Anchor,
    pub path: RelativePath,
}

impl ExtractionRule {
    /// `<div onclick="fnTotalPortfolioValue()"> … <span class="comma_fixed">1,234</span>`
    pub fn total_portfolio_value() -> Self {
        Self {
            field: MetricField::TotalPortfolioValue,
            anchor: Anchor::Attribute {
                tag: "div".to_string(),
                name: "onclick".to_string(),
                contains: "fnTotalPortfolioValue".to_string(),
            },
            path: RelativePath::Descendant(ElementMatcher::new("span", Some("comma_fixed"))),
        }
    }

    /// `<h6>MF Current Cost</h6> … <h4 class="… totalcost">₹1,234</h4>`
    pub fn mf_current_cost() -> Self {
        Self {
            field: MetricField::MfCurrentCost,
            anchor: Anchor::Label {
                tag: "h6".to_string(),
                text: "MF Current Cost".to_string(),
            },
            path: RelativePath::NextSibling(ElementMatcher::new("h4", Some("totalcost"))),
        }
    }

    /// Raw text of the target element.
    pub fn apply(&self, html: &str) -> Result<String> {
        self.apply_to(&Document::parse(html))
    }

    fn apply_to(&self, doc: &Document) -> Result<String> {
        let anchor = self.anchor.locate(doc).ok_or_else(|| {
            SyncError::extraction(
                self.field.as_str(),
                format!("anchor {} not found", self.anchor.describe()),
            )
        })?;

        let target = match &self.path {
            RelativePath::Descendant(matcher) => doc
                .descendants(anchor)
                .find(|&i| matcher.matches(doc.tag(i))),
            RelativePath::NextSibling(matcher) => doc
                .next_siblings(anchor)
                .into_iter()
                .find(|&i| matcher.matches(doc.tag(i))),
        };

        let target = target.ok_or_else(|| {
            SyncError::extraction(
                self.field.as_str(),
                format!(
                    "no value element {:?} relative to {}",
                    self.path,
                    self.anchor.describe()
                ),
            )
        })?;

        Ok(doc.inner_text(target))
    }
}

/// Strips currency formatting, truncates to a whole number and applies `offset`.
pub fn normalize_amount(field: MetricField, raw: &str, offset: i64) -> Result<i64> {
    let mut cleaned = raw.to_string();
    for mark in CURRENCY_MARKS {
        cleaned = cleaned.replace(mark, "");
    }
    let cleaned: String = cleaned
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();

    let parsed: f64 = cleaned.parse().map_err(|_| {
        SyncError::extraction(field.as_str(), format!("'{}' is not a number", raw))
    })?;
    if !parsed.is_finite() {
        return Err(SyncError::extraction(
            field.as_str(),
            format!("'{}' is not a finite amount", raw),
        ));
    }

    let truncated = parsed.trunc();
    if truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
        return Err(SyncError::extraction(
            field.as_str(),
            format!("'{}' is out of range", raw),
        ));
    }

    let adjusted = (truncated as i64).checked_add(offset).ok_or_else(|| {
        SyncError::extraction(field.as_str(), format!("'{}' overflows with offset", raw))
    })?;
    if adjusted < 0 {
        return Err(SyncError::extraction(
            field.as_str(),
            format!("adjusted amount {} is negative", adjusted),
        ));
    }
    Ok(adjusted)
}

#[derive(Debug, Clone)]
pub struct PortfolioExtractor {
    offset: i64,
    total_value_rule: ExtractionRule,
    mf_cost_rule: ExtractionRule,
}

impl Default for PortfolioExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_OFFSET)
    }
}

impl PortfolioExtractor {
    pub fn new(offset: i64) -> Self {
        Self {
            offset,
            total_value_rule: ExtractionRule::total_portfolio_value(),
            mf_cost_rule: ExtractionRule::mf_current_cost(),
        }
    }

    fn read(&self, doc: &Document, rule: &ExtractionRule) -> Result<i64> {
        let raw = rule.apply_to(doc)?;
        tracing::debug!("Raw {} text: {:?}", rule.field.as_str(), raw);
        normalize_amount(rule.field, &raw, self.offset)
    }
}

impl MetricsExtractor for PortfolioExtractor {
    fn extract(&self, page: RawPage) -> Result<PortfolioMetrics> {
        let doc = Document::parse(page.as_str());
        tracing::debug!("Parsed investor page: {} tags", doc.tags().len());

        let total_portfolio_value = self.read(&doc, &self.total_value_rule)?;
        let mf_current_cost = self.read(&doc, &self.mf_cost_rule)?;

        Ok(PortfolioMetrics {
            total_portfolio_value,
            mf_current_cost,
        })
    }
}

//! Confidence report and review gate.
//!
//! A transaction needs human review when any of these holds:
//!
//! - overall confidence is below the overall threshold
//! - a required field has no value
//! - a critical field's confidence is below the critical threshold
//!
//! Thresholds are strict lower bounds: a score equal to its threshold passes.
//! Non-critical fields below their tier threshold are reported but do not
//! change the status.

use std::collections::BTreeMap;

use offerchain_core::config::ReviewThresholds;
use offerchain_core::{FieldSchema, FieldTier, TermValue};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewStatus {
    Completed,
    NeedsReview,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "COMPLETED",
            Self::NeedsReview => "NEEDS_REVIEW",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReviewReason {
    OverallBelowThreshold { overall: f64, threshold: f64 },
    MissingRequired { field: String },
    CriticalBelowThreshold { field: String, confidence: f64, threshold: f64 },
}

impl std::fmt::Display for ReviewReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OverallBelowThreshold { overall, threshold } => {
                write!(f, "overall confidence {overall:.1} below {threshold:.1}")
            }
            Self::MissingRequired { field } => write!(f, "required field {field} is missing"),
            Self::CriticalBelowThreshold {
                field,
                confidence,
                threshold,
            } => write!(
                f,
                "critical field {field} at {confidence:.1}, below {threshold:.1}"
            ),
        }
    }
}

/// A present field scoring below its tier threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LowConfidenceField {
    pub field: String,
    pub tier: FieldTier,
    pub confidence: f64,
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageConfidenceStats {
    pub mean: f64,
    pub min: f64,
    /// Pages below the optional-tier threshold.
    pub low_pages: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfidenceReport {
    pub overall: f64,
    pub field_confidence: BTreeMap<String, f64>,
    pub missing_required: Vec<String>,
    pub below_threshold: Vec<LowConfidenceField>,
    pub pages: Option<PageConfidenceStats>,
    pub status: ReviewStatus,
    pub reasons: Vec<ReviewReason>,
}

pub struct ReviewGate<'a> {
    thresholds: &'a ReviewThresholds,
    schema: &'a FieldSchema,
}

impl<'a> ReviewGate<'a> {
    pub fn new(thresholds: &'a ReviewThresholds, schema: &'a FieldSchema) -> Self {
        Self { thresholds, schema }
    }

    /// `page_confidence` holds `(page_number, confidence)` pairs.
    pub fn evaluate(
        &self,
        fields: &BTreeMap<String, TermValue>,
        field_confidence: &BTreeMap<String, f64>,
        overall: f64,
        page_confidence: &[(u32, f64)],
    ) -> ConfidenceReport {
        let mut reasons = Vec::new();
        if overall < self.thresholds.overall {
            reasons.push(ReviewReason::OverallBelowThreshold {
                overall,
                threshold: self.thresholds.overall,
            });
        }

        let mut missing_required = Vec::new();
        let mut below_threshold = Vec::new();
        let mut report_confidence = BTreeMap::new();
        for spec in self.schema.iter() {
            let present = fields.get(&spec.name).is_some_and(|v| !v.is_null());
            if !present {
                if spec.required {
                    missing_required.push(spec.name.clone());
                    reasons.push(ReviewReason::MissingRequired {
                        field: spec.name.clone(),
                    });
                }
                continue;
            }

            let confidence = field_confidence.get(&spec.name).copied().unwrap_or(overall);
            report_confidence.insert(spec.name.clone(), confidence);
            let Some(tier) = spec.tier else { continue };
            let threshold = self.thresholds.for_tier(tier);
            if confidence < threshold {
                below_threshold.push(LowConfidenceField {
                    field: spec.name.clone(),
                    tier,
                    confidence,
                    threshold,
                });
                if tier == FieldTier::Critical {
                    reasons.push(ReviewReason::CriticalBelowThreshold {
                        field: spec.name.clone(),
                        confidence,
                        threshold,
                    });
                }
            }
        }

        let status = if reasons.is_empty() {
            ReviewStatus::Completed
        } else {
            ReviewStatus::NeedsReview
        };

        ConfidenceReport {
            overall,
            field_confidence: report_confidence,
            missing_required,
            below_threshold,
            pages: self.page_stats(page_confidence),
            status,
            reasons,
        }
    }

    fn page_stats(&self, pages: &[(u32, f64)]) -> Option<PageConfidenceStats> {
        if pages.is_empty() {
            return None;
        }
        let sum: f64 = pages.iter().map(|(_, c)| c).sum();
        Some(PageConfidenceStats {
            mean: sum / pages.len() as f64,
            min: pages.iter().map(|(_, c)| *c).fold(f64::INFINITY, f64::min),
            low_pages: pages
                .iter()
                .filter(|(_, c)| *c < self.thresholds.optional)
                .map(|(p, _)| *p)
                .collect(),
        })
    }
}

//! Wire formats of the upstream providers (OCR, page labelling, field
//! extraction) and the packet that bundles them.
//!
//! These are deserialised as-is; [`DocumentExtraction::parse`] type-checks an
//! extraction against the field schema. Page labels are validated by the
//! classifier, which owns their enum sets.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ReconcileError;
use crate::schema::FieldSchema;
use crate::terms::TermValue;
use crate::timeline::{RawTimelineEvent, TimelineEvent};

pub const EXTRACTION_PROVIDER: &str = "extraction";

/// Everything the core needs for one transaction packet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacketInput {
    pub declared_page_count: usize,
    /// OCR markdown per page, in page order.
    pub page_texts: Vec<String>,
    #[serde(default)]
    pub page_labels: Option<PageLabelResult>,
    #[serde(default)]
    pub extractions: Vec<DocumentExtraction>,
}

/// Output of the LLM page-labelling pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageLabelResult {
    pub page_count: usize,
    /// One slot per page; `null` means the service offered no label.
    pub pages: Vec<Option<PageLabel>>,
}

/// One page label. Every field is optional; `null` falls back to the
/// heuristic value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageLabel {
    #[serde(default)]
    pub form_code: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content_category: Option<String>,
    #[serde(default)]
    pub has_filled_fields: Option<bool>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub buyer_signature_dates: Option<Vec<String>>,
    #[serde(default)]
    pub seller_signature_dates: Option<Vec<String>>,
    #[serde(default)]
    pub title_snippet: Option<String>,
    #[serde(default)]
    pub counter_number: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionConfidence {
    pub overall: f64,
    #[serde(default)]
    pub fields: BTreeMap<String, f64>,
}

/// Field extraction for one document (or one critical-page set).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentExtraction {
    /// Pages this extraction was produced from. The first page decides which
    /// document unit it belongs to.
    pub pages: Vec<u32>,
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
    pub confidence: ExtractionConfidence,
    #[serde(default)]
    pub timeline_events: Vec<RawTimelineEvent>,
}

/// A schema-checked extraction. `fields` holds only explicitly stated values.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedExtraction {
    pub pages: Vec<u32>,
    pub fields: BTreeMap<String, TermValue>,
    pub overall_confidence: f64,
    pub field_confidence: BTreeMap<String, f64>,
    pub timeline_events: BTreeMap<String, TimelineEvent>,
}

impl ParsedExtraction {
    pub fn first_page(&self) -> u32 {
        self.pages[0]
    }

    /// Per-field score, falling back to the document's overall score.
    pub fn confidence_for(&self, name: &str) -> f64 {
        self.field_confidence
            .get(name)
            .copied()
            .unwrap_or(self.overall_confidence)
    }
}

impl DocumentExtraction {
    /// Type-check against `schema`. Any violation fails the whole extraction;
    /// nothing is defaulted.
    pub fn parse(
        &self,
        schema: &FieldSchema,
        page_count: usize,
    ) -> Result<ParsedExtraction, ReconcileError> {
        let fail = |detail: String| ReconcileError::schema(EXTRACTION_PROVIDER, detail);

        if self.pages.is_empty() {
            return Err(fail("extraction lists no pages".into()));
        }
        if let Some(&bad) = self
            .pages
            .iter()
            .find(|&&p| p == 0 || p as usize > page_count)
        {
            return Err(fail(format!("page {bad} outside 1..={page_count}")));
        }

        check_score("overall", self.confidence.overall).map_err(fail)?;

        let mut fields = BTreeMap::new();
        for (name, raw) in &self.fields {
            let spec = schema
                .get(name)
                .ok_or_else(|| fail(format!("unknown field {name:?}")))?;
            let value =
                TermValue::from_json(spec.kind, raw).map_err(|e| fail(format!("{name}: {e}")))?;
            if !value.is_null() {
                fields.insert(name.clone(), value);
            }
        }

        let mut timeline_events = BTreeMap::new();
        for raw in &self.timeline_events {
            let event = TimelineEvent::try_from(raw.clone()).map_err(fail)?;
            if timeline_events.contains_key(&event.key) {
                return Err(fail(format!("duplicate timeline event {:?}", event.key)));
            }
            timeline_events.insert(event.key.clone(), event);
        }

        for (name, &score) in &self.confidence.fields {
            if schema.get(name).is_none() && !timeline_events.contains_key(name) {
                return Err(fail(format!("confidence for unknown field {name:?}")));
            }
            check_score(name, score).map_err(fail)?;
        }

        Ok(ParsedExtraction {
            pages: self.pages.clone(),
            fields,
            overall_confidence: self.confidence.overall,
            field_confidence: self.confidence.fields.clone(),
            timeline_events,
        })
    }
}

/// Confidence scores are percentages.
pub fn check_score(name: &str, score: f64) -> Result<(), String> {
    if score.is_finite() && (0.0..=100.0).contains(&score) {
        Ok(())
    } else {
        Err(format!("confidence {name} = {score} outside 0..=100"))
    }
}

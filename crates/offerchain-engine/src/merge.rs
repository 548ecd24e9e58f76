//! Field merge and acceptance.
//!
//! Every schema field starts out null. The base contract's stated terms are
//! applied first, then each step of the merge plan in order; a later
//! document overrides a field only where it states a value. Every value
//! remembers which document supplied it and at what confidence.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use offerchain_core::{FieldSchema, TermValue, TimelineEvent};
use serde::Serialize;

use crate::counter::{DocumentUnits, MergeStep, Party, StatedTerms};
use crate::log::{ReconcileLog, Stage};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FinalTerms {
    /// One entry per schema field; `Null` where no document states a value.
    pub fields: BTreeMap<String, TermValue>,
    pub timeline_events_structured: BTreeMap<String, TimelineEvent>,
    /// Document label that supplied each non-null field.
    pub sources: BTreeMap<String, String>,
    pub event_sources: BTreeMap<String, String>,
    pub field_confidence: BTreeMap<String, f64>,
    pub event_confidence: BTreeMap<String, f64>,
}

impl FinalTerms {
    fn for_schema(schema: &FieldSchema) -> Self {
        Self {
            fields: schema
                .iter()
                .map(|spec| (spec.name.clone(), TermValue::Null))
                .collect(),
            ..Default::default()
        }
    }

    /// Non-null value of `name`.
    pub fn get(&self, name: &str) -> Option<&TermValue> {
        self.fields.get(name).filter(|v| !v.is_null())
    }

    /// Add a structured event computed after merge.
    pub fn add_event(&mut self, event: TimelineEvent, source: &str, confidence: f64) {
        self.event_sources.insert(event.key.clone(), source.to_string());
        self.event_confidence.insert(event.key.clone(), confidence);
        self.timeline_events_structured
            .insert(event.key.clone(), event);
    }

    /// Write a value computed after merge.
    pub fn set(&mut self, name: &str, value: TermValue, source: &str, confidence: f64) {
        self.fields.insert(name.to_string(), value);
        self.sources.insert(name.to_string(), source.to_string());
        self.field_confidence.insert(name.to_string(), confidence);
    }
}

/// One field value replaced during merge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    pub field: String,
    pub source: String,
    pub previous: TermValue,
    pub value: TermValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeOutcome {
    pub terms: FinalTerms,
    pub changes: Vec<FieldChange>,
    /// Labels of every applied document, in application order.
    pub applied: Vec<String>,
    /// Base contract followed by the applied counter offers.
    pub chain: String,
    /// Lowest overall score among the extractions that were applied.
    pub overall_confidence: f64,
}

struct Merger {
    terms: FinalTerms,
    changes: Vec<FieldChange>,
    applied: Vec<String>,
    overall: Option<f64>,
}

impl Merger {
    fn apply(&mut self, label: &str, stated: &StatedTerms) {
        for (name, value) in &stated.fields {
            let previous = self
                .terms
                .fields
                .insert(name.clone(), value.clone())
                .unwrap_or(TermValue::Null);
            if previous != *value {
                self.changes.push(FieldChange {
                    field: name.clone(),
                    source: label.to_string(),
                    previous,
                    value: value.clone(),
                });
            }
            self.terms.sources.insert(name.clone(), label.to_string());
            self.terms
                .field_confidence
                .insert(name.clone(), stated.confidence_for(name));
        }
        for (key, event) in &stated.events {
            self.terms
                .timeline_events_structured
                .insert(key.clone(), event.clone());
            self.terms
                .event_sources
                .insert(key.clone(), label.to_string());
            self.terms
                .event_confidence
                .insert(key.clone(), stated.confidence_for(key));
        }
        if let Some(score) = stated.overall {
            self.overall = Some(self.overall.map_or(score, |o| o.min(score)));
        }
        self.applied.push(label.to_string());
    }
}

pub fn merge_terms(
    schema: &FieldSchema,
    units: &DocumentUnits,
    log: &mut ReconcileLog,
) -> MergeOutcome {
    let base_label = units.base.label();
    let mut merger = Merger {
        terms: FinalTerms::for_schema(schema),
        changes: Vec::new(),
        applied: Vec::new(),
        overall: None,
    };
    merger.apply(&base_label, &units.base.terms);

    let mut chain = vec![base_label];
    for step in units.merge_plan() {
        match step {
            MergeStep::Counter(i) => {
                let counter = &units.counters[i];
                let label = counter.label();
                merger.apply(&label, &counter.modified);
                chain.push(label);
            }
            MergeStep::Addendum(i) => {
                let addendum = &units.addenda[i];
                merger.apply(&addendum.label, &addendum.modified);
            }
        }
    }

    for change in merger.changes.iter().filter(|c| !c.previous.is_null()) {
        log.info(
            Stage::Merge,
            format!(
                "{}: {} -> {} ({})",
                change.field, change.previous, change.value, change.source
            ),
        );
    }

    MergeOutcome {
        terms: merger.terms,
        changes: merger.changes,
        applied: merger.applied,
        chain: chain.join(" → "),
        overall_confidence: merger.overall.unwrap_or(0.0),
    }
}

// ── Acceptance ──

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcceptanceDecision {
    pub date: NaiveDate,
    /// Document whose signature completed the agreement.
    pub decided_by: String,
    pub signed_by: Party,
    pub page: u32,
    pub confidence: f64,
}

/// Acceptance date of the agreement.
///
/// The highest-numbered valid counter with a known issuer decides it: the
/// other party's latest signature on that counter completes the agreement.
/// Without such a counter, the later of the base contract's buyer and seller
/// signatures is used, and both must be present.
pub fn determine_acceptance(units: &DocumentUnits) -> Option<AcceptanceDecision> {
    let deciding = units.acceptance_candidates().max_by(|a, b| {
        a.number
            .cmp(&b.number)
            .then_with(|| a.latest_signature().cmp(&b.latest_signature()))
            .then_with(|| a.first_page().cmp(&b.first_page()))
    });

    if let Some(counter) = deciding {
        let (signed_by, signature) = match counter.counter_type.origin()? {
            Party::Buyer => (Party::Seller, counter.seller_signature?),
            Party::Seller => (Party::Buyer, counter.buyer_signature?),
        };
        return Some(AcceptanceDecision {
            date: signature.date,
            decided_by: counter.label(),
            signed_by,
            page: signature.page,
            confidence: signature.confidence,
        });
    }

    let buyer = units.base.buyer_signature?;
    let seller = units.base.seller_signature?;
    let (signed_by, signature) = if seller.date >= buyer.date {
        (Party::Seller, seller)
    } else {
        (Party::Buyer, buyer)
    };
    Some(AcceptanceDecision {
        date: signature.date,
        decided_by: units.base.label(),
        signed_by,
        page: signature.page,
        confidence: signature.confidence,
    })
}

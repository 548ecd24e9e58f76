//! Packet reconciliation: classification through review.
//!
//! Provider contract violations abort the packet with a [`ReconcileError`];
//! everything else is recorded in the result's log and processing continues.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use offerchain_classify::{OCR_PROVIDER, PageClassifier};
use offerchain_core::schema::names;
use offerchain_core::timeline::ACCEPTANCE;
use offerchain_core::{
    PacketInput, PageMetadata, ParsedExtraction, ReconcileConfig, ReconcileError, TermValue,
};
use serde::Serialize;
use tracing::info;

use crate::calendar::BusinessCalendar;
use crate::counter::{AddendumUnit, BaseContract, CounterOfferUnit, build_units};
use crate::log::{ReconcileLog, Stage};
use crate::merge::{AcceptanceDecision, FieldChange, FinalTerms, determine_acceptance, merge_terms};
use crate::priority::{PagePriority, compute_priorities, merge_order};
use crate::review::{ConfidenceReport, ReviewGate, ReviewStatus};
use crate::timeline::{CLOSING, ResolvedEvent, derive_standard_events, resolve_timeline};

/// Provenance label for values derived from day-count fields.
const DERIVED_SOURCE: &str = "derived";
const TIMELINE_SOURCE: &str = "timeline";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciledTransaction {
    pub pages: Vec<PageMetadata>,
    pub priorities: Vec<PagePriority>,
    pub page_order: Vec<u32>,
    pub base: BaseContract,
    pub counters: Vec<CounterOfferUnit>,
    pub addenda: Vec<AddendumUnit>,
    pub final_terms: FinalTerms,
    pub changes: Vec<FieldChange>,
    pub applied: Vec<String>,
    pub chain: String,
    pub acceptance_date: Option<NaiveDate>,
    pub acceptance: Option<AcceptanceDecision>,
    pub timeline: BTreeMap<String, ResolvedEvent>,
    pub confidence: ConfidenceReport,
    pub status: ReviewStatus,
    pub log: ReconcileLog,
}

/// Reconciler with compiled classifier tables, reusable across packets.
pub struct Reconciler {
    config: ReconcileConfig,
    classifier: PageClassifier,
    calendar: BusinessCalendar,
}

impl Reconciler {
    pub fn new(config: ReconcileConfig) -> Result<Self, ReconcileError> {
        config.validate()?;
        Ok(Self {
            classifier: PageClassifier::new(&config.classifier)?,
            calendar: BusinessCalendar::new(&config.calendar),
            config,
        })
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    pub fn calendar(&self) -> &BusinessCalendar {
        &self.calendar
    }

    pub fn reconcile(&self, packet: &PacketInput) -> Result<ReconciledTransaction, ReconcileError> {
        let mut log = ReconcileLog::default();
        let schema = &self.config.fields;

        // ── Provider contracts ──
        let actual = packet.page_texts.len();
        if actual != packet.declared_page_count {
            return Err(ReconcileError::StructuralMismatch {
                provider: OCR_PROVIDER,
                declared: packet.declared_page_count,
                actual,
            });
        }
        if actual == 0 {
            return Err(ReconcileError::schema(OCR_PROVIDER, "packet has no pages"));
        }

        let pages = self
            .classifier
            .classify_document(&packet.page_texts, packet.page_labels.as_ref())?;
        log.info(
            Stage::Classify,
            format!(
                "{} pages classified{}",
                pages.len(),
                if packet.page_labels.is_some() {
                    " with page labels"
                } else {
                    ""
                }
            ),
        );

        let extractions = packet
            .extractions
            .iter()
            .map(|e| e.parse(schema, pages.len()))
            .collect::<Result<Vec<ParsedExtraction>, _>>()?;

        // ── Priority and units ──
        let priorities = compute_priorities(&pages, &self.config.priority);
        let page_order = merge_order(&priorities);
        for (page, counter_page) in priorities
            .iter()
            .filter_map(|p| Some((p.page_number, p.attached_to?)))
        {
            log.info(
                Stage::Priority,
                format!("page {page} attached to counter page {counter_page}"),
            );
        }

        let units = build_units(
            &pages,
            &priorities,
            &extractions,
            &self.config.priority,
            &mut log,
        );

        // ── Merge ──
        let merged = merge_terms(schema, &units, &mut log);
        let mut terms = merged.terms;

        let acceptance = determine_acceptance(&units);
        let stated_acceptance = terms.get(names::ACCEPTANCE_DATE).and_then(|v| v.as_date());
        let acceptance_date = match &acceptance {
            Some(decision) => {
                if let Some(stated) = stated_acceptance
                    && stated != decision.date
                {
                    log.warn(
                        Stage::Merge,
                        format!(
                            "stated acceptance date {stated} replaced by {} from {}",
                            decision.date, decision.decided_by
                        ),
                    );
                }
                if schema.get(names::ACCEPTANCE_DATE).is_some() {
                    terms.set(
                        names::ACCEPTANCE_DATE,
                        TermValue::Date(decision.date),
                        &format!("acceptance rule: {}", decision.decided_by),
                        decision.confidence,
                    );
                }
                log.info(
                    Stage::Merge,
                    format!("acceptance {} from {}", decision.date, decision.decided_by),
                );
                Some(decision.date)
            }
            None => {
                match stated_acceptance {
                    Some(stated) => log.warn(
                        Stage::Merge,
                        format!("acceptance not determinable from signatures; keeping stated {stated}"),
                    ),
                    None => log.warn(Stage::Merge, "acceptance date undetermined"),
                }
                stated_acceptance
            }
        };

        // ── Timeline ──
        if terms.timeline_events_structured.remove(ACCEPTANCE).is_some() {
            terms.event_sources.remove(ACCEPTANCE);
            terms.event_confidence.remove(ACCEPTANCE);
            log.warn(
                Stage::Timeline,
                "ignoring stated \"acceptance\" event; acceptance comes from signatures",
            );
        }
        for event in derive_standard_events(&terms, &mut log) {
            let confidence = standard_event_confidence(&terms, &event.key);
            terms.add_event(event, DERIVED_SOURCE, confidence);
        }

        let timeline = resolve_timeline(
            &terms.timeline_events_structured,
            acceptance_date,
            &self.calendar,
        );
        for event in timeline.values() {
            if let Some(reason) = &event.unresolved {
                log.warn(Stage::Timeline, format!("{} unresolved: {reason}", event.key));
            }
        }

        if terms.get(names::CLOSING_DATE).is_none()
            && schema.get(names::CLOSING_DATE).is_some()
            && let Some(date) = timeline.get(CLOSING).and_then(|e| e.date)
        {
            let confidence = terms.event_confidence.get(CLOSING).copied().unwrap_or(0.0);
            terms.set(
                names::CLOSING_DATE,
                TermValue::Date(date),
                TIMELINE_SOURCE,
                confidence,
            );
            log.info(Stage::Timeline, format!("closing_date filled from timeline: {date}"));
        }

        // ── Review ──
        let page_confidence: Vec<(u32, f64)> =
            pages.iter().map(|p| (p.page_number, p.confidence)).collect();
        let report = ReviewGate::new(&self.config.review, schema).evaluate(
            &terms.fields,
            &terms.field_confidence,
            merged.overall_confidence,
            &page_confidence,
        );
        for reason in &report.reasons {
            log.warn(Stage::Review, reason.to_string());
        }
        let status = report.status;
        log.info(Stage::Review, format!("status {}", status.as_str()));

        info!(
            pages = pages.len(),
            counters = units.counters.len(),
            chain = %merged.chain,
            status = status.as_str(),
            "packet reconciled"
        );

        Ok(ReconciledTransaction {
            pages,
            priorities,
            page_order,
            base: units.base,
            counters: units.counters,
            addenda: units.addenda,
            final_terms: terms,
            changes: merged.changes,
            applied: merged.applied,
            chain: merged.chain,
            acceptance_date,
            acceptance,
            timeline,
            confidence: report,
            status,
            log,
        })
    }
}

/// A derived event is as trustworthy as the field it came from.
fn standard_event_confidence(terms: &FinalTerms, key: &str) -> f64 {
    let field = match key {
        CLOSING if terms.get(names::CLOSING_DATE).is_some() => names::CLOSING_DATE,
        CLOSING => "close_of_escrow_days",
        "initialDeposit" => "initial_deposit_days",
        "sellerDisclosures" => "seller_disclosure_days",
        "inspectionContingency" => "inspection_contingency_days",
        "appraisalContingency" => "appraisal_contingency_days",
        "loanContingency" => "loan_contingency_days",
        _ => return 0.0,
    };
    terms.field_confidence.get(field).copied().unwrap_or(0.0)
}

/// One-shot reconciliation with `config`.
pub fn reconcile(
    packet: &PacketInput,
    config: &ReconcileConfig,
) -> Result<ReconciledTransaction, ReconcileError> {
    Reconciler::new(config.clone())?.reconcile(packet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::CounterType;
    use crate::log::Level;
    use crate::timeline::Unresolved;
    use offerchain_core::{Money, PageRole};
    use serde_json::{Value, json};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn packet(value: Value) -> PacketInput {
        serde_json::from_value(value).unwrap()
    }

    fn run(value: Value) -> ReconciledTransaction {
        reconcile(&packet(value), &ReconcileConfig::default()).unwrap()
    }

    fn price(dollars: f64) -> TermValue {
        TermValue::Money(Money::from_dollars(dollars))
    }

    /// Base-contract extraction with every required field except the two
    /// dates the pipeline derives.
    fn base_extraction(price: &str) -> Value {
        json!({
            "pages": [1],
            "fields": {
                "property_address": "12 Oak St, Davis, CA 95616",
                "purchase_price": price,
                "buyer_names": "John Smith",
                "initial_deposit_amount": "$15,000",
                "initial_deposit_days": 3,
                "loan_type": "conventional",
                "inspection_contingency_days": 17,
                "appraisal_contingency_days": 17,
                "loan_contingency_days": 21,
                "close_of_escrow_days": 30
            },
            "confidence": {
                "overall": 92,
                "fields": {
                    "property_address": 99,
                    "purchase_price": 98,
                    "inspection_contingency_days": 97,
                    "appraisal_contingency_days": 97,
                    "loan_contingency_days": 97,
                    "close_of_escrow_days": 97
                }
            }
        })
    }

    fn base_only_packet() -> Value {
        json!({
            "declared_page_count": 1,
            "page_texts": ["CALIFORNIA RESIDENTIAL PURCHASE AGREEMENT"],
            "page_labels": {"page_count": 1, "pages": [{
                "form_code": "RPA", "role": "main_contract", "confidence": 98,
                "buyer_signature_dates": ["2026-01-02"],
                "seller_signature_dates": ["2026-01-03"]
            }]},
            "extractions": [base_extraction("$500,000")]
        })
    }

    fn seller_counter_packet() -> Value {
        json!({
            "declared_page_count": 3,
            "page_texts": [
                "CALIFORNIA RESIDENTIAL PURCHASE AGREEMENT",
                "SELLER COUNTER OFFER No. 1",
                "SELLER COUNTER OFFER No. 1 (page 2)"
            ],
            "page_labels": {"page_count": 3, "pages": [
                {"form_code": "RPA", "role": "main_contract", "confidence": 98,
                 "buyer_signature_dates": ["2026-01-02"]},
                {"form_code": "SCO", "role": "counter_offer", "confidence": 97,
                 "counter_number": 1},
                {"form_code": "SCO", "role": "counter_offer", "confidence": 97,
                 "counter_number": 1,
                 "seller_signature_dates": ["2026-01-04"],
                 "buyer_signature_dates": ["2026-01-05"]}
            ]},
            "extractions": [
                base_extraction("$500,000"),
                {"pages": [2, 3], "fields": {"purchase_price": "$510,000"},
                 "confidence": {"overall": 95, "fields": {"purchase_price": 99}}}
            ]
        })
    }

    #[test]
    fn base_contract_only_completes() {
        let r = run(base_only_packet());
        assert_eq!(r.final_terms.fields["purchase_price"], price(500_000.0));
        assert_eq!(r.chain, "RPA");
        assert_eq!(r.acceptance_date, Some(d(2026, 1, 3)));
        // Saturday acceptance; 30 calendar days lands on Monday 2026-02-02.
        assert_eq!(
            r.final_terms.fields[names::CLOSING_DATE],
            TermValue::Date(d(2026, 2, 2))
        );
        assert_eq!(r.status, ReviewStatus::Completed, "{:?}", r.confidence.reasons);
    }

    #[test]
    fn seller_counter_changes_price_and_decides_acceptance() {
        let r = run(seller_counter_packet());
        assert_eq!(r.final_terms.fields["purchase_price"], price(510_000.0));
        assert_eq!(r.final_terms.sources["purchase_price"], "SCO #1");
        assert_eq!(r.chain, "RPA → SCO #1");
        assert_eq!(r.acceptance_date, Some(d(2026, 1, 5)));
        assert_eq!(
            r.final_terms.fields[names::ACCEPTANCE_DATE],
            TermValue::Date(d(2026, 1, 5))
        );
        assert_eq!(r.status, ReviewStatus::Completed, "{:?}", r.confidence.reasons);
    }

    #[test]
    fn fields_not_mentioned_by_counters_keep_base_values() {
        let r = run(seller_counter_packet());
        let base = run(base_only_packet());
        for field in [
            "property_address",
            "inspection_contingency_days",
            "loan_type",
            "initial_deposit_amount",
        ] {
            assert_eq!(
                r.final_terms.fields[field], base.final_terms.fields[field],
                "{field}"
            );
        }
    }

    #[test]
    fn standard_events_resolve_and_fill_closing_date() {
        let r = run(seller_counter_packet());
        // Acceptance 2026-01-05: deposit 3 days later, closing 30 days later.
        assert_eq!(r.timeline["initialDeposit"].date, Some(d(2026, 1, 8)));
        assert_eq!(r.timeline["closing"].date, Some(d(2026, 2, 4)));
        assert_eq!(
            r.final_terms.fields[names::CLOSING_DATE],
            TermValue::Date(d(2026, 2, 4))
        );
        assert_eq!(r.final_terms.sources[names::CLOSING_DATE], TIMELINE_SOURCE);
        assert_eq!(r.final_terms.event_sources["closing"], DERIVED_SOURCE);
    }

    #[test]
    fn highest_valid_counter_decides_acceptance() {
        let r = run(json!({
            "declared_page_count": 5,
            "page_texts": ["rpa", "bco 1", "sco 2", "sco 2 signatures", "bco 3"],
            "page_labels": {"page_count": 5, "pages": [
                {"form_code": "RPA", "role": "main_contract",
                 "buyer_signature_dates": ["2026-01-02"]},
                {"form_code": "BCO", "role": "counter_offer", "counter_number": 1,
                 "buyer_signature_dates": ["2026-01-03"],
                 "seller_signature_dates": ["2026-01-04"]},
                {"form_code": "SCO", "role": "counter_offer", "counter_number": 2},
                {"form_code": "SCO", "role": "counter_offer", "counter_number": 2,
                 "buyer_signature_dates": ["2026-01-06"]},
                {"form_code": "BCO", "role": "counter_offer", "counter_number": 3,
                 "buyer_signature_dates": ["2026-01-08"],
                 "seller_signature_dates": ["2026-01-09"]}
            ]},
            "extractions": [base_extraction("$500,000")]
        }));
        let validity: Vec<_> = r.counters.iter().map(|c| (c.label(), c.valid)).collect();
        assert_eq!(
            validity,
            vec![
                ("BCO #1".to_string(), true),
                ("SCO #2".to_string(), false),
                ("BCO #3".to_string(), true)
            ]
        );
        let acceptance = r.acceptance.unwrap();
        assert_eq!(acceptance.decided_by, "BCO #3");
        assert_eq!(acceptance.date, d(2026, 1, 9));
        assert_eq!(r.chain, "RPA → BCO #1 → BCO #3");
        assert!(
            r.log
                .warnings()
                .any(|e| e.stage == Stage::Counters && e.message.contains("SCO #2"))
        );
    }

    #[test]
    fn heuristic_classification_end_to_end() {
        let r = run(json!({
            "declared_page_count": 3,
            "page_texts": [
                "# CALIFORNIA RESIDENTIAL PURCHASE AGREEMENT\n\
                 Purchase price $500,000. Initial deposit $15,000. Loan amount $400,000.\n\
                 Buyer ____________ Date 01/02/2026\n\
                 RPA REVISED 12/24 (PAGE 1 OF 1)",
                "SELLER COUNTER OFFER No. 1\n\
                 This is a counter offer to the Residential Purchase Agreement dated 01/02/2026.\n\
                 1. Purchase price to be $510,000.",
                "SELLER COUNTER OFFER No. 1 (page 2)\n\
                 Seller ____________ Date 01/04/2026\n\
                 Buyer ____________ Date 01/05/2026"
            ],
            "extractions": [
                base_extraction("$500,000"),
                {"pages": [2], "fields": {"purchase_price": 510000},
                 "confidence": {"overall": 95}}
            ]
        }));
        assert_eq!(r.pages[0].role, PageRole::MainContract);
        assert_eq!(r.counters.len(), 1);
        assert_eq!(r.counters[0].counter_type, CounterType::Sco);
        assert_eq!(r.counters[0].pages, vec![2, 3]);
        assert_eq!(r.chain, "RPA → SCO #1");
        assert_eq!(r.acceptance_date, Some(d(2026, 1, 5)));
        // Heuristic page confidence is 85, below the critical threshold for
        // the acceptance date it supplies.
        assert_eq!(r.status, ReviewStatus::NeedsReview);
        assert!(
            r.confidence
                .reasons
                .iter()
                .any(|reason| reason.to_string().contains(names::ACCEPTANCE_DATE))
        );
    }

    #[test]
    fn reconciliation_is_idempotent() {
        let a = run(seller_counter_packet());
        let b = run(seller_counter_packet());
        assert_eq!(
            serde_json::to_string(&a.final_terms).unwrap(),
            serde_json::to_string(&b.final_terms).unwrap()
        );
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn missing_required_field_needs_review() {
        let mut value = base_only_packet();
        value["extractions"][0]["fields"]["loan_type"] = Value::Null;
        let r = run(value);
        assert_eq!(r.status, ReviewStatus::NeedsReview);
        assert_eq!(r.confidence.missing_required, vec!["loan_type".to_string()]);
    }

    #[test]
    fn no_acceptance_leaves_relative_events_unresolved() {
        let mut value = base_only_packet();
        value["page_labels"]["pages"][0]["seller_signature_dates"] = Value::Null;
        let r = run(value);
        assert_eq!(r.acceptance_date, None);
        assert_eq!(
            r.timeline["closing"].unresolved,
            Some(Unresolved::AcceptanceUnknown)
        );
        assert_eq!(r.final_terms.fields[names::CLOSING_DATE], TermValue::Null);
        assert_eq!(r.status, ReviewStatus::NeedsReview);
    }

    #[test]
    fn timeline_cycle_is_flagged_without_blocking() {
        let mut value = base_only_packet();
        value["extractions"][0]["timeline_events"] = json!([
            {"event_key": "a", "date_type": "relative", "relative_days": 1, "anchor_point": "b"},
            {"event_key": "b", "date_type": "relative", "relative_days": 1, "anchor_point": "a"}
        ]);
        let r = run(value);
        assert!(matches!(r.timeline["a"].unresolved, Some(Unresolved::Cycle { .. })));
        assert!(matches!(r.timeline["b"].unresolved, Some(Unresolved::Cycle { .. })));
        assert!(r.timeline["closing"].is_resolved());
        assert_eq!(r.status, ReviewStatus::Completed);
        assert!(
            r.log
                .entries()
                .iter()
                .any(|e| e.stage == Stage::Timeline && e.level == Level::Warn)
        );
    }

    #[test]
    fn self_anchored_event_does_not_abort_packet() {
        let mut value = base_only_packet();
        value["extractions"][0]["timeline_events"] = json!([
            {"event_key": "a", "date_type": "relative", "relative_days": 1, "anchor_point": "a"}
        ]);
        let r = run(value);
        assert_eq!(
            r.timeline["a"].unresolved,
            Some(Unresolved::Cycle {
                path: vec!["a".into(), "a".into()]
            })
        );
        assert_eq!(r.timeline["closing"].date, Some(d(2026, 2, 2)));
        assert_eq!(r.timeline["initialDeposit"].date, Some(d(2026, 1, 6)));
        assert_eq!(r.status, ReviewStatus::Completed);
    }

    #[test]
    fn negative_day_count_warns_instead_of_vanishing() {
        let mut value = base_only_packet();
        value["extractions"][0]["fields"]["inspection_contingency_days"] = json!(-3);
        let r = run(value);
        assert!(!r.timeline.contains_key("inspectionContingency"));
        assert!(
            r.log
                .warnings()
                .any(|e| e.stage == Stage::Timeline
                    && e.message.contains("inspection_contingency_days is -3"))
        );
    }

    #[test]
    fn stated_acceptance_event_is_ignored() {
        let mut value = base_only_packet();
        value["extractions"][0]["timeline_events"] = json!([
            {"event_key": "acceptance", "date_type": "specified", "specified_date": "2025-12-01"}
        ]);
        let r = run(value);
        assert!(!r.timeline.contains_key(ACCEPTANCE));
        assert_eq!(r.acceptance_date, Some(d(2026, 1, 3)));
    }

    #[test]
    fn ocr_page_count_mismatch_is_fatal() {
        let mut value = base_only_packet();
        value["declared_page_count"] = json!(2);
        let err = reconcile(&packet(value), &ReconcileConfig::default()).unwrap_err();
        match err {
            ReconcileError::StructuralMismatch {
                provider,
                declared,
                actual,
            } => {
                assert_eq!(provider, OCR_PROVIDER);
                assert_eq!((declared, actual), (2, 1));
            }
            other => panic!("expected structural mismatch, got {other}"),
        }
    }

    #[test]
    fn label_count_mismatch_is_fatal() {
        let mut value = base_only_packet();
        value["page_labels"]["page_count"] = json!(2);
        let err = reconcile(&packet(value), &ReconcileConfig::default()).unwrap_err();
        assert!(matches!(err, ReconcileError::StructuralMismatch { .. }));
    }

    #[test]
    fn extraction_schema_violation_is_fatal() {
        let mut value = base_only_packet();
        value["extractions"][0]["fields"]["purchase_price"] = json!(true);
        let err = reconcile(&packet(value), &ReconcileConfig::default()).unwrap_err();
        assert!(matches!(err, ReconcileError::SchemaViolation { .. }));
    }

    #[test]
    fn empty_packet_rejected() {
        let err = reconcile(
            &packet(json!({"declared_page_count": 0, "page_texts": []})),
            &ReconcileConfig::default(),
        )
        .unwrap_err();
        assert!(err.is_provider_error());
    }
}

//! LLM page labels: validation and adoption.
//!
//! A label result is adopted only as a whole. Page-count disagreement is a
//! structural mismatch; any label outside the fixed enum sets, any confidence
//! outside 0–100 and any unparseable signature date is a schema violation.

use chrono::NaiveDate;
use offerchain_core::dates::parse_date_list;
use offerchain_core::provider::check_score;
use offerchain_core::{
    ContentCategory, FormCode, PageLabel, PageLabelResult, PageMetadata, PageRole, ReconcileError,
};

pub const LABEL_PROVIDER: &str = "page_labels";

/// A page label whose values have been checked against the enum sets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedLabel {
    pub form_code: Option<FormCode>,
    pub role: Option<PageRole>,
    pub content_category: Option<ContentCategory>,
    pub has_filled_fields: Option<bool>,
    pub confidence: Option<f64>,
    pub buyer_signature_dates: Option<Vec<NaiveDate>>,
    pub seller_signature_dates: Option<Vec<NaiveDate>>,
    pub title_snippet: Option<String>,
    pub counter_number: Option<u32>,
}

impl ValidatedLabel {
    fn from_label(page: usize, label: &PageLabel) -> Result<Self, ReconcileError> {
        let fail = |detail: String| {
            ReconcileError::schema(LABEL_PROVIDER, format!("page {page}: {detail}"))
        };

        let role = label
            .role
            .as_deref()
            .map(str::parse::<PageRole>)
            .transpose()
            .map_err(fail)?;
        let content_category = label
            .content_category
            .as_deref()
            .map(str::parse::<ContentCategory>)
            .transpose()
            .map_err(fail)?;
        if let Some(score) = label.confidence {
            check_score("page", score).map_err(fail)?;
        }
        let buyer_signature_dates = label
            .buyer_signature_dates
            .as_deref()
            .map(parse_date_list)
            .transpose()
            .map_err(fail)?;
        let seller_signature_dates = label
            .seller_signature_dates
            .as_deref()
            .map(parse_date_list)
            .transpose()
            .map_err(fail)?;
        if label.counter_number == Some(0) {
            return Err(fail("counter_number must be 1-based".into()));
        }

        Ok(Self {
            form_code: label.form_code.as_deref().map(FormCode::new),
            role,
            content_category,
            has_filled_fields: label.has_filled_fields,
            confidence: label.confidence,
            buyer_signature_dates,
            seller_signature_dates,
            title_snippet: label.title_snippet.clone(),
            counter_number: label.counter_number,
        })
    }

    /// Override the heuristic result with every value this label carries.
    pub fn apply_to(&self, meta: &mut PageMetadata) {
        if let Some(v) = &self.form_code {
            meta.form_code = v.clone();
        }
        if let Some(v) = self.role {
            meta.role = v;
        }
        if let Some(v) = self.content_category {
            meta.content_category = v;
        }
        if let Some(v) = self.has_filled_fields {
            meta.has_filled_fields = v;
        }
        if let Some(v) = self.confidence {
            meta.confidence = v;
        }
        if let Some(v) = &self.buyer_signature_dates {
            meta.buyer_signature_dates = v.clone();
        }
        if let Some(v) = &self.seller_signature_dates {
            meta.seller_signature_dates = v.clone();
        }
        if let Some(v) = &self.title_snippet {
            meta.title_snippet = v.clone();
        }
        if let Some(v) = self.counter_number {
            meta.counter_number = Some(v);
        }
    }
}

/// Validate a full label result against the locally detected page count.
///
/// Returns one slot per page, `None` where the service gave no label.
pub fn validate_labels(
    result: &PageLabelResult,
    local_page_count: usize,
) -> Result<Vec<Option<ValidatedLabel>>, ReconcileError> {
    if result.pages.len() != result.page_count {
        return Err(ReconcileError::StructuralMismatch {
            provider: LABEL_PROVIDER,
            declared: result.page_count,
            actual: result.pages.len(),
        });
    }
    if result.page_count != local_page_count {
        return Err(ReconcileError::StructuralMismatch {
            provider: LABEL_PROVIDER,
            declared: local_page_count,
            actual: result.page_count,
        });
    }

    result
        .pages
        .iter()
        .enumerate()
        .map(|(i, slot)| {
            slot.as_ref()
                .map(|label| ValidatedLabel::from_label(i + 1, label))
                .transpose()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(json: &str) -> PageLabelResult {
        serde_json::from_str(json).unwrap()
    }

    fn blank_page(n: u32) -> PageMetadata {
        PageMetadata {
            page_number: n,
            form_code: FormCode::unknown(),
            role: PageRole::Other,
            content_category: ContentCategory::Boilerplate,
            has_filled_fields: false,
            confidence: 55.0,
            buyer_signature_dates: vec![],
            seller_signature_dates: vec![],
            title_snippet: "heuristic".into(),
            counter_number: None,
        }
    }

    #[test]
    fn validates_well_formed_result() {
        let r = result(
            r#"{"page_count":2,"pages":[
                {"form_code":"bco","role":"counter_offer","content_category":"signatures",
                 "confidence":96,"buyer_signature_dates":["2026-02-03"],"counter_number":1},
                null
            ]}"#,
        );
        let labels = validate_labels(&r, 2).unwrap();
        assert_eq!(labels.len(), 2);
        let first = labels[0].as_ref().unwrap();
        assert_eq!(first.form_code.as_ref().unwrap().as_str(), "BCO");
        assert_eq!(first.role, Some(PageRole::CounterOffer));
        assert_eq!(first.counter_number, Some(1));
        assert!(labels[1].is_none());
    }

    #[test]
    fn internal_count_mismatch() {
        let r = result(r#"{"page_count":3,"pages":[null,null]}"#);
        let err = validate_labels(&r, 2).unwrap_err();
        match err {
            ReconcileError::StructuralMismatch {
                declared, actual, ..
            } => {
                assert_eq!(declared, 3);
                assert_eq!(actual, 2);
            }
            other => panic!("expected structural mismatch, got {other}"),
        }
    }

    #[test]
    fn local_count_mismatch() {
        let r = result(r#"{"page_count":2,"pages":[null,null]}"#);
        assert!(matches!(
            validate_labels(&r, 5),
            Err(ReconcileError::StructuralMismatch { .. })
        ));
    }

    #[test]
    fn bad_category_is_schema_violation_naming_page() {
        let r = result(r#"{"page_count":2,"pages":[null,{"content_category":"terms"}]}"#);
        let err = validate_labels(&r, 2).unwrap_err();
        assert!(matches!(err, ReconcileError::SchemaViolation { .. }));
        assert!(err.to_string().contains("page 2"), "{err}");
    }

    #[test]
    fn bad_confidence_rejected() {
        let r = result(r#"{"page_count":1,"pages":[{"confidence":-4}]}"#);
        assert!(validate_labels(&r, 1).is_err());
    }

    #[test]
    fn bad_signature_date_rejected() {
        let r = result(r#"{"page_count":1,"pages":[{"seller_signature_dates":["whenever"]}]}"#);
        assert!(validate_labels(&r, 1).is_err());
    }

    #[test]
    fn zero_counter_number_rejected() {
        let r = result(r#"{"page_count":1,"pages":[{"counter_number":0}]}"#);
        assert!(validate_labels(&r, 1).is_err());
    }

    #[test]
    fn apply_keeps_heuristic_where_label_is_null() {
        let label = ValidatedLabel {
            role: Some(PageRole::Signatures),
            confidence: Some(91.0),
            ..Default::default()
        };
        let mut page = blank_page(4);
        label.apply_to(&mut page);
        assert_eq!(page.role, PageRole::Signatures);
        assert_eq!(page.confidence, 91.0);
        assert_eq!(page.title_snippet, "heuristic");
        assert_eq!(page.content_category, ContentCategory::Boilerplate);
    }

    #[test]
    fn apply_replaces_signature_lists() {
        let label = ValidatedLabel {
            buyer_signature_dates: Some(vec![NaiveDate::from_ymd_opt(2026, 2, 3).unwrap()]),
            ..Default::default()
        };
        let mut page = blank_page(1);
        label.apply_to(&mut page);
        assert_eq!(page.buyer_signature_dates.len(), 1);
        assert!(page.seller_signature_dates.is_empty());
    }
}

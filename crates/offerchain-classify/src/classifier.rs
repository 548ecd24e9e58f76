//! Page classification for purchase-contract packets.
//!
//! Every page gets a heuristic [`PageMetadata`] from the rule tables. When an
//! LLM page-labelling result is available it is validated as a whole and its
//! non-null fields override the heuristic field by field.

use chrono::NaiveDate;
use offerchain_core::config::ClassifierConfig;
use offerchain_core::dates::parse_date;
use offerchain_core::{ContentCategory, PageLabelResult, PageMetadata, ReconcileError};
use regex::Regex;
use tracing::{debug, info};

use crate::labels::validate_labels;
use crate::tables::{ClassifierTables, PageText, RoleSource};

pub const OCR_PROVIDER: &str = "ocr";

/// A page needs this many filled-field indicators before it counts as filled.
const FILLED_FIELD_MIN_HITS: usize = 4;
/// Dollar amounts that, together with a date, mark a page as transaction terms.
const TERMS_MIN_AMOUNTS: usize = 3;
const TITLE_MAX_CHARS: usize = 80;

const CONFIDENCE_FORM_MATCH: f64 = 85.0;
const CONFIDENCE_KEYWORD_ROLE: f64 = 70.0;
const CONFIDENCE_FALLBACK: f64 = 55.0;

/// Patterns for the filled-field and signature heuristics.
struct FieldPatterns {
    date: Regex,
    currency: Regex,
    checkbox: Regex,
    checked: Regex,
    counter_number: Regex,
    party: Regex,
}

impl FieldPatterns {
    fn new() -> Result<Self, ReconcileError> {
        Ok(Self {
            date: compile(
                r"(?i)\b\d{1,2}/\d{1,2}/\d{2,4}\b|\b\d{4}-\d{2}-\d{2}\b|\b(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+\d{1,2},?\s+\d{4}\b",
            )?,
            currency: compile(r"\$\s?\d[\d,]*(?:\.\d{2})?")?,
            // A yes/no option with its box counts once, marked or not.
            checkbox: compile(
                r"(?i)(?:\[\s*x?\s*\]|\(\s*x?\s*\)|[☐☒☑])\s*(?:yes|no)\b|\b(?:yes|no)\s*(?:\[\s*x?\s*\]|\(\s*x?\s*\)|[☐☒☑])|\[\s*x\s*\]|\(\s*x\s*\)|[☒☑✔]",
            )?,
            checked: compile(r"(?i)\bchecked\b")?,
            counter_number: compile(r"(?i)counter\s*offer\s*(?:no\.?|number|#)\s*(\d{1,3})")?,
            party: compile(r"(?i)\b(buyer|seller)s?\b")?,
        })
    }
}

fn compile(pattern: &str) -> Result<Regex, ReconcileError> {
    Regex::new(pattern).map_err(|e| ReconcileError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Party {
    Buyer,
    Seller,
}

/// Heuristic page classifier built from immutable rule tables.
pub struct PageClassifier {
    tables: ClassifierTables,
    patterns: FieldPatterns,
}

impl PageClassifier {
    pub fn new(config: &ClassifierConfig) -> Result<Self, ReconcileError> {
        Ok(Self {
            tables: ClassifierTables::compile(config)?,
            patterns: FieldPatterns::new()?,
        })
    }

    /// Classify every page of a document, in page order.
    ///
    /// When `labels` is present it must describe exactly `texts.len()` pages
    /// and validate completely; otherwise the whole call fails and no
    /// heuristic-only result is returned.
    pub fn classify_document(
        &self,
        texts: &[String],
        labels: Option<&PageLabelResult>,
    ) -> Result<Vec<PageMetadata>, ReconcileError> {
        let validated = match labels {
            Some(result) => Some(validate_labels(result, texts.len())?),
            None => None,
        };

        let mut pages = Vec::with_capacity(texts.len());
        for (i, text) in texts.iter().enumerate() {
            let page_number = i as u32 + 1;
            let mut meta = self.classify_page(page_number, text);
            if let Some(label) = validated.as_ref().and_then(|v| v[i].as_ref()) {
                label.apply_to(&mut meta);
            }
            debug!(
                page = page_number,
                form = %meta.form_code,
                role = %meta.role,
                category = %meta.content_category,
                confidence = meta.confidence,
                "classified page"
            );
            pages.push(meta);
        }

        info!(
            pages = pages.len(),
            labelled = validated.is_some(),
            "page classification complete"
        );
        Ok(pages)
    }

    /// Heuristic classification of a single page.
    pub fn classify_page(&self, page_number: u32, text: &str) -> PageMetadata {
        let page = self.tables.page_text(text);

        let form_code = self.tables.detect_form_code(&page);
        let (role, role_source) = self.tables.detect_role(&form_code, &page);
        let content_category = self.detect_category(&page);
        let (buyer_signature_dates, seller_signature_dates) = self.signature_dates(text);

        let confidence = if !form_code.is_unknown() {
            CONFIDENCE_FORM_MATCH
        } else if role_source == RoleSource::Keyword {
            CONFIDENCE_KEYWORD_ROLE
        } else {
            CONFIDENCE_FALLBACK
        };

        PageMetadata {
            page_number,
            form_code,
            role,
            content_category,
            has_filled_fields: self.has_filled_fields(text),
            confidence,
            buyer_signature_dates,
            seller_signature_dates,
            title_snippet: title_snippet(text),
            counter_number: self.counter_number(text),
        }
    }

    fn detect_category(&self, page: &PageText<'_>) -> ContentCategory {
        if page.is_blank() {
            return ContentCategory::Other;
        }
        if let Some(category) = self.tables.category_by_keyword(page) {
            return category;
        }
        let amounts = self.patterns.currency.find_iter(page.raw).count();
        if amounts >= TERMS_MIN_AMOUNTS && self.patterns.date.is_match(page.raw) {
            return ContentCategory::TransactionTerms;
        }
        if self.tables.mentions_signatures(page) {
            return ContentCategory::Signatures;
        }
        ContentCategory::Boilerplate
    }

    /// Count of date, currency, checkbox and "checked" hits; conservative so
    /// signature-only pages (a date or two) stay unfilled.
    pub fn has_filled_fields(&self, text: &str) -> bool {
        let p = &self.patterns;
        let hits = p.date.find_iter(text).count()
            + p.currency.find_iter(text).count()
            + p.checkbox.find_iter(text).count()
            + p.checked.find_iter(text).count();
        hits >= FILLED_FIELD_MIN_HITS
    }

    fn counter_number(&self, text: &str) -> Option<u32> {
        self.patterns
            .counter_number
            .captures(text)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
            .filter(|&n| n > 0)
    }

    /// Harvest signature dates from lines that name a party and carry a date.
    ///
    /// Forms lay signature blocks out as `Buyer ____ Date ____`, so each date
    /// belongs to the nearest party mentioned before it on the same line (or
    /// the first mention when the date leads the line).
    pub fn signature_dates(&self, text: &str) -> (Vec<NaiveDate>, Vec<NaiveDate>) {
        let mut buyer = Vec::new();
        let mut seller = Vec::new();

        for line in text.lines() {
            let parties: Vec<(usize, Party)> = self
                .patterns
                .party
                .captures_iter(line)
                .filter_map(|c| {
                    let m = c.get(1)?;
                    let party = if m.as_str().eq_ignore_ascii_case("buyer") {
                        Party::Buyer
                    } else {
                        Party::Seller
                    };
                    Some((m.start(), party))
                })
                .collect();
            if parties.is_empty() {
                continue;
            }

            for m in self.patterns.date.find_iter(line) {
                let Some(date) = parse_date(m.as_str()) else {
                    continue;
                };
                let party = parties
                    .iter()
                    .rev()
                    .find(|(pos, _)| *pos < m.start())
                    .unwrap_or(&parties[0])
                    .1;
                match party {
                    Party::Buyer => buyer.push(date),
                    Party::Seller => seller.push(date),
                }
            }
        }

        buyer.sort();
        buyer.dedup();
        seller.sort();
        seller.dedup();
        (buyer, seller)
    }
}

/// First non-empty line with markdown decoration removed.
fn title_snippet(text: &str) -> String {
    let line = text
        .lines()
        .map(|l| l.trim_start_matches(['#', '*', '>', '-', ' ', '\t']).trim())
        .find(|l| !l.is_empty())
        .unwrap_or("");
    line.trim_end_matches('*').chars().take(TITLE_MAX_CHARS).collect()
}

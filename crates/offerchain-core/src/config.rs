//! Reconciliation configuration.
//!
//! Every section has defaults, so an empty JSON object is a valid config. The
//! classifier tables are plain data here and get compiled by the classifier.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ReconcileError;
use crate::page::{ContentCategory, PageRole};
use crate::schema::{FieldSchema, FieldTier};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    pub review: ReviewThresholds,
    pub priority: PriorityConfig,
    pub calendar: CalendarConfig,
    pub classifier: ClassifierConfig,
    pub fields: FieldSchema,
}

impl ReconcileConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ReconcileError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconcileError> {
        self.review.validate()?;
        self.classifier.validate()?;
        FieldSchema::new(self.fields.iter().cloned().collect())?;
        Ok(())
    }
}

/// Confidence thresholds (0–100) per field tier, plus the overall floor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewThresholds {
    pub critical: f64,
    pub important: f64,
    pub optional: f64,
    pub overall: f64,
}

impl Default for ReviewThresholds {
    fn default() -> Self {
        Self {
            critical: 95.0,
            important: 85.0,
            optional: 75.0,
            overall: 80.0,
        }
    }
}

impl ReviewThresholds {
    pub fn for_tier(&self, tier: FieldTier) -> f64 {
        match tier {
            FieldTier::Critical => self.critical,
            FieldTier::Important => self.important,
            FieldTier::Optional => self.optional,
        }
    }

    fn validate(&self) -> Result<(), ReconcileError> {
        for (name, v) in [
            ("critical", self.critical),
            ("important", self.important),
            ("optional", self.optional),
            ("overall", self.overall),
        ] {
            if !(0.0..=100.0).contains(&v) {
                return Err(ReconcileError::Config(format!(
                    "{name} threshold {v} outside 0..=100"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityConfig {
    /// An addendum signed within this many calendar days of a counter offer
    /// is merged directly after that counter.
    pub addendum_window_days: u32,
    /// A counter whose page count differs from its form's usual layout is
    /// invalid. Turning this off keeps such counters with a warning, for
    /// providers that render compound pages differently.
    pub counter_page_count_strict: bool,
}

impl Default for PriorityConfig {
    fn default() -> Self {
        Self {
            addendum_window_days: 1,
            counter_page_count_strict: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    /// Move Saturday holidays to Friday and Sunday holidays to Monday.
    pub observe_weekend_holidays: bool,
    /// Additional non-business days (state or local holidays).
    pub extra_holidays: Vec<NaiveDate>,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            observe_weekend_holidays: true,
            extra_holidays: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormPattern {
    pub code: String,
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormRole {
    pub code: String,
    pub role: PageRole,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleKeywords {
    pub role: PageRole,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryKeywords {
    pub category: ContentCategory,
    pub keywords: Vec<String>,
}

/// Rule tables for the page classifier. All lists are evaluated in order and
/// the first match wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Non-empty lines at the top and bottom of a page that are searched
    /// before the full text. Form titles and footer codes live there.
    pub edge_lines: usize,
    pub form_patterns: Vec<FormPattern>,
    pub primary_contract_forms: Vec<String>,
    pub form_roles: Vec<FormRole>,
    pub role_keywords: Vec<RoleKeywords>,
    pub category_keywords: Vec<CategoryKeywords>,
    pub signature_keywords: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self::california()
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl ClassifierConfig {
    /// Tables for the California Association of Realtors form set.
    pub fn california() -> Self {
        let form = |code: &str, patterns: &[&str]| FormPattern {
            code: code.to_string(),
            patterns: strings(patterns),
        };
        let form_role = |code: &str, role: PageRole| FormRole {
            code: code.to_string(),
            role,
        };
        let role = |role: PageRole, keywords: &[&str]| RoleKeywords {
            role,
            keywords: strings(keywords),
        };
        let category = |category: ContentCategory, keywords: &[&str]| CategoryKeywords {
            category,
            keywords: strings(keywords),
        };

        Self {
            edge_lines: 6,
            // SMCO before SCO: "seller multiple counter offer" must not fall
            // through to the plain seller counter pattern.
            form_patterns: vec![
                form("SMCO", &[r"(?i)seller\s+multiple\s+counter\s*offer", r"\bSMCO\b"]),
                form("SCO", &[r"(?i)seller\s+counter\s*offer", r"\bSCO\b"]),
                form("BCO", &[r"(?i)buyer\s+counter\s*offer", r"\bBCO\b"]),
                form(
                    "RIPA",
                    &[r"(?i)residential\s+income\s+property\s+purchase\s+agreement", r"\bRIPA\b"],
                ),
                form("RPA", &[r"(?i)residential\s+purchase\s+agreement", r"\bRPA(?:-CA)?\b"]),
                form("ADM", &[r"(?im)^\W*addendum\b", r"\bADM\b"]),
                form(
                    "CR",
                    &[r"(?i)contingency\s+removal", r"\bCR\s+(?:REVISED|PAGE)\b"],
                ),
                form("TDS", &[r"(?i)transfer\s+disclosure\s+statement", r"\bTDS\b"]),
                form("SPQ", &[r"(?i)seller\s+property\s+questionnaire", r"\bSPQ\b"]),
                form("AVID", &[r"(?i)agent\s+visual\s+inspection\s+disclosure", r"\bAVID\b"]),
            ],
            primary_contract_forms: strings(&["RPA", "RIPA"]),
            form_roles: vec![
                form_role("SMCO", PageRole::CounterOffer),
                form_role("SCO", PageRole::CounterOffer),
                form_role("BCO", PageRole::CounterOffer),
                form_role("ADM", PageRole::Addendum),
                form_role("CR", PageRole::ContingencyRelease),
                form_role("TDS", PageRole::Disclosure),
                form_role("SPQ", PageRole::Disclosure),
                form_role("AVID", PageRole::Disclosure),
            ],
            role_keywords: vec![
                role(PageRole::CounterOffer, &["counter offer", "counteroffer"]),
                role(PageRole::LocalAddendum, &["local addendum", "regional addendum"]),
                role(PageRole::Addendum, &["addendum", "amendment to purchase agreement"]),
                role(
                    PageRole::ContingencyRelease,
                    &["contingency removal", "contingency release", "removal of contingencies"],
                ),
                role(
                    PageRole::Disclosure,
                    &["disclosure statement", "questionnaire", "advisory", "disclosure"],
                ),
                role(
                    PageRole::BrokerInfo,
                    &["real estate brokers", "broker compensation", "confirmation of agency"],
                ),
                role(
                    PageRole::TitlePage,
                    &["table of contents", "cover sheet", "transaction summary"],
                ),
                role(
                    PageRole::Signatures,
                    &["signature page", "acceptance of offer", "buyer's signature"],
                ),
            ],
            category_keywords: vec![
                category(
                    ContentCategory::TransactionTerms,
                    &["purchase price", "close of escrow", "initial deposit", "loan amount"],
                ),
                category(
                    ContentCategory::BrokerInfo,
                    &["real estate broker", "dre lic", "brokerage firm"],
                ),
                category(
                    ContentCategory::Disclosures,
                    &["lead-based paint", "natural hazard", "disclosure"],
                ),
            ],
            signature_keywords: strings(&[
                "signature",
                "date signed",
                "signed by",
                "acknowledges receipt",
            ]),
        }
    }

    fn validate(&self) -> Result<(), ReconcileError> {
        if self.edge_lines == 0 {
            return Err(ReconcileError::Config("classifier.edge_lines must be > 0".into()));
        }
        for fp in &self.form_patterns {
            if fp.patterns.is_empty() {
                return Err(ReconcileError::Config(format!(
                    "form {} has no patterns",
                    fp.code
                )));
            }
        }
        Ok(())
    }
}

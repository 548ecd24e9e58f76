//! Page-level classification types.
//!
//! A [`PageMetadata`] is produced once per physical page by the classifier and
//! is read-only for every later stage.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Identifier of a standard legal form (e.g. `RPA`, `SCO`), or `UNKNOWN`.
///
/// Codes are stored upper-case so table lookups are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct FormCode(String);

impl FormCode {
    pub const UNKNOWN: &'static str = "UNKNOWN";

    pub fn new(code: &str) -> Self {
        let code = code.trim();
        if code.is_empty() {
            return Self::unknown();
        }
        Self(code.to_ascii_uppercase())
    }

    pub fn unknown() -> Self {
        Self(Self::UNKNOWN.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == Self::UNKNOWN
    }
}

impl From<String> for FormCode {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

impl From<FormCode> for String {
    fn from(code: FormCode) -> Self {
        code.0
    }
}

impl fmt::Display for FormCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Structural role of a page within the packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageRole {
    MainContract,
    CounterOffer,
    Addendum,
    LocalAddendum,
    ContingencyRelease,
    Disclosure,
    BrokerInfo,
    TitlePage,
    Signatures,
    Other,
}

impl PageRole {
    pub const ALL: [PageRole; 10] = [
        Self::MainContract,
        Self::CounterOffer,
        Self::Addendum,
        Self::LocalAddendum,
        Self::ContingencyRelease,
        Self::Disclosure,
        Self::BrokerInfo,
        Self::TitlePage,
        Self::Signatures,
        Self::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MainContract => "main_contract",
            Self::CounterOffer => "counter_offer",
            Self::Addendum => "addendum",
            Self::LocalAddendum => "local_addendum",
            Self::ContingencyRelease => "contingency_release",
            Self::Disclosure => "disclosure",
            Self::BrokerInfo => "broker_info",
            Self::TitlePage => "title_page",
            Self::Signatures => "signatures",
            Self::Other => "other",
        }
    }

    /// Addendum-like roles that amend terms without being a counter offer.
    pub fn is_addendum(&self) -> bool {
        matches!(self, Self::Addendum | Self::LocalAddendum)
    }
}

impl FromStr for PageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| format!("unknown page role {s:?}"))
    }
}

impl fmt::Display for PageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of content a page carries, independent of its form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentCategory {
    TransactionTerms,
    Signatures,
    BrokerInfo,
    Disclosures,
    Boilerplate,
    Other,
}

impl ContentCategory {
    pub const ALL: [ContentCategory; 6] = [
        Self::TransactionTerms,
        Self::Signatures,
        Self::BrokerInfo,
        Self::Disclosures,
        Self::Boilerplate,
        Self::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TransactionTerms => "transaction_terms",
            Self::Signatures => "signatures",
            Self::BrokerInfo => "broker_info",
            Self::Disclosures => "disclosures",
            Self::Boilerplate => "boilerplate",
            Self::Other => "other",
        }
    }
}

impl FromStr for ContentCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown content category {s:?}"))
    }
}

impl fmt::Display for ContentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification result for one physical page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageMetadata {
    /// 1-based.
    pub page_number: u32,
    pub form_code: FormCode,
    pub role: PageRole,
    pub content_category: ContentCategory,
    pub has_filled_fields: bool,
    /// 0–100.
    pub confidence: f64,
    /// Ascending.
    pub buyer_signature_dates: Vec<NaiveDate>,
    /// Ascending.
    pub seller_signature_dates: Vec<NaiveDate>,
    pub title_snippet: String,
    /// Sequence number printed on counter-offer forms ("No. 2").
    pub counter_number: Option<u32>,
}

impl PageMetadata {
    pub fn latest_buyer_signature(&self) -> Option<NaiveDate> {
        self.buyer_signature_dates.iter().max().copied()
    }

    pub fn latest_seller_signature(&self) -> Option<NaiveDate> {
        self.seller_signature_dates.iter().max().copied()
    }

    /// Latest signature date by either party.
    pub fn latest_signature(&self) -> Option<NaiveDate> {
        self.latest_buyer_signature()
            .max(self.latest_seller_signature())
    }
}

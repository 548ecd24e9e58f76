//! Field schema for purchase-contract terms.
//!
//! Each named term has a value kind (used to type-check provider JSON) and an
//! optional review tier (used by the confidence gate). The schema is data, so
//! a jurisdiction with different forms can ship its own table in config.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::ReconcileError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Money,
    Integer,
    Boolean,
    Date,
}

/// Confidence tier. Thresholds live in [`ReviewThresholds`](crate::config::ReviewThresholds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldTier {
    Critical,
    Important,
    Optional,
}

impl FieldTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Important => "important",
            Self::Optional => "optional",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub tier: Option<FieldTier>,
    /// A required field with no value routes the transaction to review.
    #[serde(default)]
    pub required: bool,
}

impl FieldSpec {
    fn new(name: &str, kind: FieldKind, tier: Option<FieldTier>, required: bool) -> Self {
        Self {
            name: name.to_string(),
            kind,
            tier,
            required,
        }
    }
}

/// Names the pipeline writes itself after merge.
pub mod names {
    pub const ACCEPTANCE_DATE: &str = "acceptance_date";
    pub const CLOSING_DATE: &str = "closing_date";
    pub const PURCHASE_PRICE: &str = "purchase_price";
    pub const PROPERTY_ADDRESS: &str = "property_address";
}

/// Ordered table of known fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldSchema {
    fields: Vec<FieldSpec>,
}

impl Default for FieldSchema {
    fn default() -> Self {
        Self::standard()
    }
}

impl FieldSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Result<Self, ReconcileError> {
        let mut seen = HashSet::new();
        for f in &fields {
            if !seen.insert(f.name.as_str()) {
                return Err(ReconcileError::Config(format!(
                    "duplicate field {:?} in schema",
                    f.name
                )));
            }
        }
        Ok(Self { fields })
    }

    /// Standard residential purchase-contract field set.
    pub fn standard() -> Self {
        use FieldKind::*;
        use FieldTier::*;

        let fields = vec![
            // Parties and property
            FieldSpec::new("buyer_names", Text, Some(Important), true),
            FieldSpec::new("seller_names", Text, None, false),
            FieldSpec::new(names::PROPERTY_ADDRESS, Text, Some(Critical), true),
            FieldSpec::new("apn", Text, None, false),
            // Price and financing
            FieldSpec::new(names::PURCHASE_PRICE, Money, Some(Critical), true),
            FieldSpec::new("initial_deposit_amount", Money, Some(Important), true),
            FieldSpec::new("initial_deposit_days", Integer, Some(Important), true),
            FieldSpec::new("increased_deposit_amount", Money, None, false),
            FieldSpec::new("loan_type", Text, Some(Important), true),
            FieldSpec::new("loan_amount", Money, None, false),
            FieldSpec::new("down_payment_amount", Money, None, false),
            FieldSpec::new("all_cash", Boolean, None, false),
            FieldSpec::new("seller_credit_amount", Money, None, false),
            // Dates and contingencies
            FieldSpec::new(names::ACCEPTANCE_DATE, Date, Some(Critical), true),
            FieldSpec::new(names::CLOSING_DATE, Date, Some(Critical), true),
            FieldSpec::new("close_of_escrow_days", Integer, None, false),
            FieldSpec::new("inspection_contingency_days", Integer, Some(Critical), true),
            FieldSpec::new("appraisal_contingency_days", Integer, Some(Critical), true),
            FieldSpec::new("loan_contingency_days", Integer, Some(Critical), true),
            FieldSpec::new("seller_disclosure_days", Integer, None, false),
            FieldSpec::new("escrow_holder", Text, None, false),
            // Brokers
            FieldSpec::new("buyer_brokerage", Text, Some(Optional), false),
            FieldSpec::new("buyer_agent_name", Text, Some(Optional), false),
            FieldSpec::new("buyer_agent_email", Text, Some(Optional), false),
            FieldSpec::new("buyer_agent_phone", Text, Some(Optional), false),
            FieldSpec::new("seller_brokerage", Text, Some(Optional), false),
            FieldSpec::new("seller_agent_name", Text, Some(Optional), false),
            FieldSpec::new("seller_agent_email", Text, Some(Optional), false),
            FieldSpec::new("seller_agent_phone", Text, Some(Optional), false),
            // Home warranty
            FieldSpec::new("home_warranty", Boolean, Some(Optional), false),
            FieldSpec::new("home_warranty_cost", Money, Some(Optional), false),
            FieldSpec::new("home_warranty_paid_by", Text, Some(Optional), false),
        ];

        Self { fields }
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn required(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.required)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_schema_has_expected_fields() {
        let schema = FieldSchema::standard();
        assert!(schema.get("purchase_price").is_some());
        assert!(schema.get("home_warranty").is_some());
        assert!(schema.get("wire_instructions").is_none());
    }

    #[test]
    fn standard_critical_fields() {
        let schema = FieldSchema::standard();
        let critical: Vec<&str> = schema
            .iter()
            .filter(|f| f.tier == Some(FieldTier::Critical))
            .map(|f| f.name.as_str())
            .collect();
        assert!(critical.contains(&"purchase_price"));
        assert!(critical.contains(&"property_address"));
        assert!(critical.contains(&"acceptance_date"));
        assert!(critical.contains(&"inspection_contingency_days"));
        assert!(!critical.contains(&"buyer_agent_email"));
    }

    #[test]
    fn optional_fields_are_not_required() {
        let schema = FieldSchema::standard();
        assert!(
            schema
                .iter()
                .filter(|f| f.tier == Some(FieldTier::Optional))
                .all(|f| !f.required)
        );
    }

    #[test]
    fn duplicate_names_rejected() {
        let spec = FieldSpec::new("purchase_price", FieldKind::Money, None, false);
        let err = FieldSchema::new(vec![spec.clone(), spec]).unwrap_err();
        assert!(err.to_string().contains("duplicate field"));
    }

    #[test]
    fn schema_deserializes_from_config_table() {
        let json = r#"[
            {"name": "purchase_price", "kind": "money", "tier": "critical", "required": true},
            {"name": "notes", "kind": "text"}
        ]"#;
        let schema: FieldSchema = serde_json::from_str(json).unwrap();
        assert_eq!(schema.len(), 2);
        assert_eq!(schema.get("notes").unwrap().tier, None);
        assert!(!schema.get("notes").unwrap().required);
    }
}

//! Typed term values and the provider-JSON conversion rules for each kind.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dates::parse_date;
use crate::schema::FieldKind;

/// A currency amount in integer cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(pub i64);

impl Money {
    pub fn from_dollars(dollars: f64) -> Self {
        Self((dollars * 100.0).round() as i64)
    }

    pub fn cents(&self) -> i64 {
        self.0
    }

    /// Parse `"$510,000"`, `"510000.00"`, `"$ 1,250.5"`.
    pub fn parse(s: &str) -> Option<Self> {
        let cleaned: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '$' | ',' | ' '))
            .collect();
        if cleaned.is_empty() {
            return None;
        }
        let dollars: f64 = cleaned.parse().ok()?;
        dollars.is_finite().then(|| Self::from_dollars(dollars))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let dollars = (abs / 100).to_string();
        let cents = abs % 100;

        // Group thousands.
        let mut grouped = String::with_capacity(dollars.len() + dollars.len() / 3);
        for (i, ch) in dollars.chars().enumerate() {
            if i > 0 && (dollars.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }
        write!(f, "{sign}${grouped}.{cents:02}")
    }
}

/// Value of one named term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TermValue {
    Null,
    Text(String),
    Money(Money),
    Integer(i64),
    Boolean(bool),
    Date(NaiveDate),
}

impl TermValue {
    /// Convert a provider JSON scalar to the schema's kind.
    ///
    /// JSON `null` maps to [`TermValue::Null`], which callers treat as "not
    /// stated". Any other type mismatch is an error message for a schema
    /// violation.
    pub fn from_json(kind: FieldKind, value: &Value) -> Result<Self, String> {
        if value.is_null() {
            return Ok(Self::Null);
        }
        match (kind, value) {
            (FieldKind::Text, Value::String(s)) => {
                let s = s.trim();
                Ok(if s.is_empty() {
                    Self::Null
                } else {
                    Self::Text(s.to_string())
                })
            }
            (FieldKind::Money, Value::Number(n)) => n
                .as_f64()
                .map(|d| Self::Money(Money::from_dollars(d)))
                .ok_or_else(|| format!("money out of range: {n}")),
            (FieldKind::Money, Value::String(s)) => Money::parse(s)
                .map(Self::Money)
                .ok_or_else(|| format!("not a money amount: {s:?}")),
            (FieldKind::Integer, Value::Number(n)) => integer_from_number(n).map(Self::Integer),
            (FieldKind::Integer, Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(Self::Integer)
                .map_err(|_| format!("not an integer: {s:?}")),
            (FieldKind::Boolean, Value::Bool(b)) => Ok(Self::Boolean(*b)),
            (FieldKind::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str()
            {
                "yes" | "true" | "x" => Ok(Self::Boolean(true)),
                "no" | "false" => Ok(Self::Boolean(false)),
                other => Err(format!("not a boolean: {other:?}")),
            },
            (FieldKind::Date, Value::String(s)) => parse_date(s)
                .map(Self::Date)
                .ok_or_else(|| format!("not a date: {s:?}")),
            (kind, other) => Err(format!("expected {kind:?}, got {}", json_type(other))),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(d) => Some(*d),
            _ => None,
        }
    }
}

impl fmt::Display for TermValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("-"),
            Self::Text(s) => f.write_str(s),
            Self::Money(m) => write!(f, "{m}"),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Boolean(b) => f.write_str(if *b { "yes" } else { "no" }),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

fn integer_from_number(n: &serde_json::Number) -> Result<i64, String> {
    if let Some(i) = n.as_i64() {
        return Ok(i);
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(f as i64),
        _ => Err(format!("not an integer: {n}")),
    }
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn money_parses_formatted_strings() {
        assert_eq!(Money::parse("$510,000"), Some(Money(51_000_000)));
        assert_eq!(Money::parse("1250.5"), Some(Money(125_050)));
        assert_eq!(Money::parse("$"), None);
        assert_eq!(Money::parse("five hundred"), None);
    }

    #[test]
    fn money_display_groups_thousands() {
        assert_eq!(Money(50_000_000).to_string(), "$500,000.00");
        assert_eq!(Money(99).to_string(), "$0.99");
        assert_eq!(Money(-125_050).to_string(), "-$1,250.50");
    }

    #[test]
    fn from_json_money_accepts_number_and_string() {
        assert_eq!(
            TermValue::from_json(FieldKind::Money, &json!(500000)).unwrap(),
            TermValue::Money(Money(50_000_000))
        );
        assert_eq!(
            TermValue::from_json(FieldKind::Money, &json!("$510,000.00")).unwrap(),
            TermValue::Money(Money(51_000_000))
        );
    }

    #[test]
    fn from_json_null_is_not_stated() {
        assert!(
            TermValue::from_json(FieldKind::Date, &Value::Null)
                .unwrap()
                .is_null()
        );
        assert!(
            TermValue::from_json(FieldKind::Text, &json!("  "))
                .unwrap()
                .is_null()
        );
    }

    #[test]
    fn from_json_type_mismatch_is_error() {
        let err = TermValue::from_json(FieldKind::Integer, &json!(true)).unwrap_err();
        assert!(err.contains("boolean"), "{err}");
        assert!(TermValue::from_json(FieldKind::Integer, &json!(17.5)).is_err());
        assert!(TermValue::from_json(FieldKind::Date, &json!("soonish")).is_err());
    }

    #[test]
    fn from_json_integer_variants() {
        assert_eq!(
            TermValue::from_json(FieldKind::Integer, &json!(17)).unwrap(),
            TermValue::Integer(17)
        );
        assert_eq!(
            TermValue::from_json(FieldKind::Integer, &json!(21.0)).unwrap(),
            TermValue::Integer(21)
        );
        assert_eq!(
            TermValue::from_json(FieldKind::Integer, &json!(" 10 ")).unwrap(),
            TermValue::Integer(10)
        );
    }

    #[test]
    fn from_json_boolean_strings() {
        assert_eq!(
            TermValue::from_json(FieldKind::Boolean, &json!("Yes")).unwrap(),
            TermValue::Boolean(true)
        );
        assert!(TermValue::from_json(FieldKind::Boolean, &json!("maybe")).is_err());
    }

    #[test]
    fn serde_is_tagged() {
        let v = TermValue::Money(Money(100));
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, r#"{"kind":"money","value":100}"#);
        let back: TermValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }
}

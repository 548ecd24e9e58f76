use thiserror::Error;

/// Document-level failures. Every variant aborts reconciliation of the packet;
/// non-fatal anomalies travel in the result log instead.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("{provider}: declared {declared} pages but received {actual}")]
    StructuralMismatch {
        provider: &'static str,
        declared: usize,
        actual: usize,
    },

    #[error("{provider}: schema violation: {detail}")]
    SchemaViolation {
        provider: &'static str,
        detail: String,
    },

    #[error("invalid classifier pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ReconcileError {
    pub fn schema(provider: &'static str, detail: impl Into<String>) -> Self {
        Self::SchemaViolation {
            provider,
            detail: detail.into(),
        }
    }

    /// True for errors raised by a provider contract check rather than local
    /// configuration.
    pub fn is_provider_error(&self) -> bool {
        matches!(
            self,
            Self::StructuralMismatch { .. } | Self::SchemaViolation { .. } | Self::Json(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_mismatch_message_names_provider() {
        let err = ReconcileError::StructuralMismatch {
            provider: "ocr",
            declared: 12,
            actual: 11,
        };
        assert_eq!(err.to_string(), "ocr: declared 12 pages but received 11");
        assert!(err.is_provider_error());
    }

    #[test]
    fn config_errors_are_not_provider_errors() {
        let err = ReconcileError::Config("critical threshold 120 exceeds 100".into());
        assert!(!err.is_provider_error());
    }
}

//! Page classification: ordered rule tables for form codes, roles and content
//! categories, plus adoption of LLM page labels.

mod classifier;
pub mod labels;
pub mod tables;

pub use classifier::{OCR_PROVIDER, PageClassifier};
pub use labels::{LABEL_PROVIDER, ValidatedLabel, validate_labels};
pub use tables::ClassifierTables;

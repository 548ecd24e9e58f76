//! Shared types for purchase-contract reconciliation: page metadata, the field
//! schema, typed terms, timeline events, provider wire formats, configuration.

pub mod config;
pub mod dates;
pub mod error;
pub mod page;
pub mod provider;
pub mod schema;
pub mod terms;
pub mod timeline;

pub use config::ReconcileConfig;
pub use error::ReconcileError;
pub use page::{ContentCategory, FormCode, PageMetadata, PageRole};
pub use provider::{DocumentExtraction, PacketInput, PageLabel, PageLabelResult, ParsedExtraction};
pub use schema::{FieldKind, FieldSchema, FieldSpec, FieldTier};
pub use terms::{Money, TermValue};
pub use timeline::{DayType, Direction, EventTiming, RelativeTiming, TimelineEvent};

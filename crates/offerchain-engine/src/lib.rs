//! Reconciliation engine: document priority, counter-offer chains, field
//! merge, timeline resolution and the review gate, driven by [`Reconciler`].

pub mod calendar;
pub mod counter;
pub mod log;
pub mod merge;
mod pipeline;
pub mod priority;
pub mod review;
pub mod timeline;

pub use calendar::BusinessCalendar;
pub use counter::{AddendumUnit, BaseContract, CounterOfferUnit, CounterType, Party};
pub use log::{LogEntry, ReconcileLog, Stage};
pub use merge::{AcceptanceDecision, FieldChange, FinalTerms};
pub use pipeline::{ReconciledTransaction, Reconciler, reconcile};
pub use review::{ConfidenceReport, ReviewReason, ReviewStatus};
pub use timeline::{ResolvedEvent, Unresolved};

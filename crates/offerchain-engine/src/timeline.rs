//! Timeline resolution.
//!
//! Events form a graph in which each relative event points at its anchor.
//! Resolution is a depth-first walk from every event with memoised results;
//! the keys currently on the walk are tracked so that a cycle marks each of
//! its members unresolved instead of recursing forever. Events that depend on
//! an unresolved event are unresolved too, with their own reason.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use offerchain_core::schema::names;
use offerchain_core::timeline::ACCEPTANCE;
use offerchain_core::{DayType, Direction, EventTiming, RelativeTiming, TimelineEvent};
use serde::Serialize;

use crate::calendar::BusinessCalendar;
use crate::log::{ReconcileLog, Stage};
use crate::merge::FinalTerms;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Unresolved {
    /// Part of an anchor cycle; `path` starts and ends with the same key.
    Cycle { path: Vec<String> },
    /// Anchor key names no known event.
    MissingAnchor { anchor: String },
    /// Anchor exists but could not be resolved itself.
    AnchorUnresolved { anchor: String },
    /// Anchored on acceptance, which could not be determined.
    AcceptanceUnknown,
    /// Offset runs past the representable date range.
    OutOfRange,
}

impl fmt::Display for Unresolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cycle { path } => write!(f, "anchor cycle {}", path.join(" -> ")),
            Self::MissingAnchor { anchor } => write!(f, "unknown anchor {anchor:?}"),
            Self::AnchorUnresolved { anchor } => write!(f, "anchor {anchor:?} is unresolved"),
            Self::AcceptanceUnknown => f.write_str("acceptance date unknown"),
            Self::OutOfRange => f.write_str("date out of range"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedEvent {
    pub key: String,
    pub display_name: String,
    pub timing: EventTiming,
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unresolved: Option<Unresolved>,
}

impl ResolvedEvent {
    pub fn is_resolved(&self) -> bool {
        self.date.is_some()
    }
}

type Outcome = Result<NaiveDate, Unresolved>;

/// Walk state: finished results plus the keys on the current path.
#[derive(Default)]
struct Walk {
    resolved: BTreeMap<String, Outcome>,
    in_progress: Vec<String>,
}

struct Resolver<'a> {
    events: &'a BTreeMap<String, TimelineEvent>,
    acceptance: Option<NaiveDate>,
    calendar: &'a BusinessCalendar,
}

impl Resolver<'_> {
    fn resolve(&self, key: &str, walk: &mut Walk) -> Outcome {
        if let Some(done) = walk.resolved.get(key) {
            return done.clone();
        }
        if let Some(start) = walk.in_progress.iter().position(|k| k == key) {
            let mut path = walk.in_progress[start..].to_vec();
            path.push(key.to_string());
            return Err(Unresolved::Cycle { path });
        }
        let Some(event) = self.events.get(key) else {
            return Err(Unresolved::MissingAnchor {
                anchor: key.to_string(),
            });
        };

        walk.in_progress.push(key.to_string());
        let outcome = match &event.timing {
            EventTiming::Specified { date } => Ok(*date),
            EventTiming::Relative(timing) => self.resolve_relative(key, timing, walk),
        };
        walk.in_progress.pop();

        walk.resolved.insert(key.to_string(), outcome.clone());
        outcome
    }

    fn resolve_relative(&self, key: &str, timing: &RelativeTiming, walk: &mut Walk) -> Outcome {
        let anchor_date = if timing.anchor == ACCEPTANCE {
            self.acceptance.ok_or(Unresolved::AcceptanceUnknown)?
        } else if !self.events.contains_key(&timing.anchor) {
            return Err(Unresolved::MissingAnchor {
                anchor: timing.anchor.clone(),
            });
        } else {
            match self.resolve(&timing.anchor, walk) {
                Ok(date) => date,
                Err(Unresolved::Cycle { path }) if path.iter().any(|k| k == key) => {
                    return Err(Unresolved::Cycle { path });
                }
                Err(_) => {
                    return Err(Unresolved::AnchorUnresolved {
                        anchor: timing.anchor.clone(),
                    });
                }
            }
        };
        offset(self.calendar, anchor_date, timing).ok_or(Unresolved::OutOfRange)
    }
}

fn offset(calendar: &BusinessCalendar, anchor: NaiveDate, timing: &RelativeTiming) -> Option<NaiveDate> {
    match timing.day_type {
        DayType::Business => calendar.add_business_days(anchor, timing.days, timing.direction),
        DayType::Calendar => calendar.add_calendar_days(anchor, timing.days, timing.direction),
    }
}

/// Resolve every event to a date or an explicit reason it has none.
pub fn resolve_timeline(
    events: &BTreeMap<String, TimelineEvent>,
    acceptance: Option<NaiveDate>,
    calendar: &BusinessCalendar,
) -> BTreeMap<String, ResolvedEvent> {
    let resolver = Resolver {
        events,
        acceptance,
        calendar,
    };
    let mut walk = Walk::default();
    events
        .iter()
        .map(|(key, event)| {
            let outcome = resolver.resolve(key, &mut walk);
            let (date, unresolved) = match outcome {
                Ok(date) => (Some(date), None),
                Err(reason) => (None, Some(reason)),
            };
            (
                key.clone(),
                ResolvedEvent {
                    key: key.clone(),
                    display_name: event.display_name.clone(),
                    timing: event.timing.clone(),
                    date,
                    unresolved,
                },
            )
        })
        .collect()
}

// ── Standard events ──

pub const CLOSING: &str = "closing";

/// Events implied by day-count fields, all in calendar days after acceptance.
const STANDARD_EVENTS: &[(&str, &str, &str)] = &[
    ("initialDeposit", "Initial deposit due", "initial_deposit_days"),
    ("sellerDisclosures", "Seller disclosures due", "seller_disclosure_days"),
    ("inspectionContingency", "Inspection contingency removal", "inspection_contingency_days"),
    ("appraisalContingency", "Appraisal contingency removal", "appraisal_contingency_days"),
    ("loanContingency", "Loan contingency removal", "loan_contingency_days"),
    (CLOSING, "Close of escrow", "close_of_escrow_days"),
];

/// Events derived from merged fields that no document stated explicitly.
/// An explicit closing date beats a close-of-escrow day count. A negative
/// day count derives nothing and is logged.
pub fn derive_standard_events(terms: &FinalTerms, log: &mut ReconcileLog) -> Vec<TimelineEvent> {
    let stated = &terms.timeline_events_structured;
    let mut derived = Vec::new();

    if !stated.contains_key(CLOSING)
        && let Some(date) = terms.get(names::CLOSING_DATE).and_then(|v| v.as_date())
    {
        derived.push(TimelineEvent::specified(CLOSING, "Close of escrow", date));
    }

    for &(key, display_name, field) in STANDARD_EVENTS {
        if stated.contains_key(key) || derived.iter().any(|e| e.key == key) {
            continue;
        }
        let Some(days) = terms.get(field).and_then(|v| v.as_integer()) else {
            continue;
        };
        let Ok(days) = u32::try_from(days) else {
            log.warn(
                Stage::Timeline,
                format!("{key} not derived: {field} is {days}"),
            );
            continue;
        };
        derived.push(TimelineEvent::relative(
            key,
            display_name,
            days,
            ACCEPTANCE,
            Direction::After,
            DayType::Calendar,
        ));
    }
    derived
}

//! Document priority and merge order.
//!
//! Lower priority values are applied first, so later documents override
//! earlier ones. Within a tier, documents are ordered by their latest
//! signature date (undated last) and then by page number.
//!
//! An addendum signed within `addendum_window_days` of a counter-offer page
//! is attached to that counter: it sorts directly after it and reports a
//! priority of the counter's plus one half.

use std::cmp::Ordering;

use chrono::NaiveDate;
use offerchain_core::config::PriorityConfig;
use offerchain_core::{PageMetadata, PageRole};
use serde::Serialize;

/// Offset given to an addendum attached to a counter offer.
pub const ATTACHED_OFFSET: f64 = 0.5;

pub fn base_priority(role: PageRole) -> f64 {
    match role {
        PageRole::MainContract => 1.0,
        PageRole::CounterOffer | PageRole::Addendum | PageRole::LocalAddendum => 2.0,
        PageRole::Signatures => 3.0,
        PageRole::BrokerInfo => 4.0,
        PageRole::Disclosure
        | PageRole::ContingencyRelease
        | PageRole::TitlePage
        | PageRole::Other => 5.0,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PagePriority {
    pub page_number: u32,
    pub role: PageRole,
    pub priority: f64,
    pub latest_signature: Option<NaiveDate>,
    /// Counter-offer page this addendum page is attached to.
    pub attached_to: Option<u32>,
}

/// Total order used for merging: tier, then date (undated last), then page.
/// `follows` places an attached document right after the one it follows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderKey {
    pub tier: f64,
    pub date: Option<NaiveDate>,
    pub page: u32,
    pub follows: bool,
}

impl OrderKey {
    pub fn compare(&self, other: &Self) -> Ordering {
        self.tier
            .total_cmp(&other.tier)
            .then_with(|| compare_dates(self.date, other.date))
            .then_with(|| self.page.cmp(&other.page))
            .then_with(|| self.follows.cmp(&other.follows))
    }

    /// The key of something merged directly after `self`.
    pub fn followed(&self) -> Self {
        Self {
            follows: true,
            ..*self
        }
    }
}

fn compare_dates(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Assign a priority to every page.
pub fn compute_priorities(pages: &[PageMetadata], config: &PriorityConfig) -> Vec<PagePriority> {
    let counter_pages: Vec<(u32, NaiveDate)> = pages
        .iter()
        .filter(|p| p.role == PageRole::CounterOffer)
        .filter_map(|p| p.latest_signature().map(|d| (p.page_number, d)))
        .collect();

    pages
        .iter()
        .map(|page| {
            let latest_signature = page.latest_signature();
            let attached_to = if page.role.is_addendum() {
                latest_signature.and_then(|date| {
                    nearest_counter(&counter_pages, date, config.addendum_window_days)
                })
            } else {
                None
            };
            let mut priority = base_priority(page.role);
            if attached_to.is_some() {
                priority += ATTACHED_OFFSET;
            }
            PagePriority {
                page_number: page.page_number,
                role: page.role,
                priority,
                latest_signature,
                attached_to,
            }
        })
        .collect()
}

/// Closest counter page by signature date within the window; ties go to the
/// later page.
fn nearest_counter(counters: &[(u32, NaiveDate)], date: NaiveDate, window: u32) -> Option<u32> {
    counters
        .iter()
        .map(|&(page, signed)| (page, (date - signed).num_days().abs()))
        .filter(|&(_, gap)| gap <= i64::from(window))
        .min_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
        .map(|(page, _)| page)
}

impl PagePriority {
    fn order_key(&self) -> OrderKey {
        OrderKey {
            tier: self.priority,
            date: self.latest_signature,
            page: self.page_number,
            follows: false,
        }
    }
}

/// Page numbers in merge order.
pub fn merge_order(priorities: &[PagePriority]) -> Vec<u32> {
    let key = |p: &PagePriority| -> OrderKey {
        p.attached_to
            .and_then(|target| priorities.iter().find(|c| c.page_number == target))
            .map(|counter| counter.order_key().followed())
            .unwrap_or_else(|| p.order_key())
    };
    let mut order: Vec<&PagePriority> = priorities.iter().collect();
    order.sort_by(|a, b| key(a).compare(&key(b)));
    order.into_iter().map(|p| p.page_number).collect()
}

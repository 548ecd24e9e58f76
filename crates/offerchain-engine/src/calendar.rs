//! Business-day calendar for contract deadlines.
//!
//! A business day is a weekday that is neither a US federal holiday nor one
//! of the configured extra holidays.
//!
//! # Federal holidays
//!
//! - Fixed: New Year's Day, Juneteenth (from 2021), Independence Day,
//!   Veterans Day, Christmas
//! - Floating: MLK Day (3rd Mon Jan), Presidents' Day (3rd Mon Feb),
//!   Memorial Day (last Mon May), Labor Day (1st Mon Sep),
//!   Columbus Day (2nd Mon Oct), Thanksgiving (4th Thu Nov)
//!
//! With weekend observance, a fixed holiday on Saturday is observed the
//! Friday before and one on Sunday the Monday after.

use std::collections::BTreeSet;

use chrono::{Datelike, Days, NaiveDate, Weekday};
use offerchain_core::config::CalendarConfig;
use offerchain_core::timeline::Direction;

#[derive(Debug, Clone)]
pub struct BusinessCalendar {
    observe_weekend_holidays: bool,
    extra_holidays: BTreeSet<NaiveDate>,
}

impl Default for BusinessCalendar {
    fn default() -> Self {
        Self::new(&CalendarConfig::default())
    }
}

impl BusinessCalendar {
    pub fn new(config: &CalendarConfig) -> Self {
        Self {
            observe_weekend_holidays: config.observe_weekend_holidays,
            extra_holidays: config.extra_holidays.iter().copied().collect(),
        }
    }

    /// Federal holidays for `year`, as observed.
    pub fn federal_holidays(&self, year: i32) -> Vec<NaiveDate> {
        let mut fixed = vec![(1, 1), (7, 4), (11, 11), (12, 25)];
        if year >= 2021 {
            fixed.push((6, 19));
        }

        let mut days: Vec<NaiveDate> = fixed
            .into_iter()
            .filter_map(|(m, d)| NaiveDate::from_ymd_opt(year, m, d))
            .map(|d| {
                if self.observe_weekend_holidays {
                    observed(d)
                } else {
                    d
                }
            })
            .collect();

        let floating = [
            NaiveDate::from_weekday_of_month_opt(year, 1, Weekday::Mon, 3),
            NaiveDate::from_weekday_of_month_opt(year, 2, Weekday::Mon, 3),
            last_weekday_of_month(year, 5, Weekday::Mon),
            NaiveDate::from_weekday_of_month_opt(year, 9, Weekday::Mon, 1),
            NaiveDate::from_weekday_of_month_opt(year, 10, Weekday::Mon, 2),
            NaiveDate::from_weekday_of_month_opt(year, 11, Weekday::Thu, 4),
        ];
        days.extend(floating.into_iter().flatten());
        days.sort();
        days
    }

    /// Observed federal and extra holidays falling within `year`.
    pub fn holidays_in(&self, year: i32) -> BTreeSet<NaiveDate> {
        // New Year's Day on a Saturday is observed on Dec 31 of the prior year.
        let mut days: BTreeSet<NaiveDate> = self
            .federal_holidays(year)
            .into_iter()
            .chain(self.federal_holidays(year.saturating_add(1)))
            .filter(|d| d.year() == year)
            .collect();
        days.extend(
            self.extra_holidays
                .iter()
                .filter(|d| d.year() == year)
                .copied(),
        );
        days
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays_in(date.year()).contains(&date)
    }

    pub fn is_business_day(&self, date: NaiveDate) -> bool {
        is_weekday(date) && !self.is_holiday(date)
    }

    /// Step `days` business days away from `start`. The start date itself
    /// never counts. `None` only on date overflow.
    ///
    /// Whole years are skipped by counting their business days, so the walk
    /// is linear in years crossed rather than days.
    pub fn add_business_days(
        &self,
        start: NaiveDate,
        days: u32,
        direction: Direction,
    ) -> Option<NaiveDate> {
        if days == 0 {
            return Some(start);
        }
        // Five business days never span fewer than seven calendar days.
        let shortest = Days::new(u64::from(days / 5) * 7);
        let reachable = match direction {
            Direction::After => start.checked_add_days(shortest),
            Direction::Before => start.checked_sub_days(shortest),
        };
        reachable?;

        let mut remaining = u64::from(days);
        let mut cursor = step(start, direction)?;
        loop {
            let year = cursor.year();
            let holidays = self.holidays_in(year);
            let edge = match direction {
                Direction::After => NaiveDate::from_ymd_opt(year, 12, 31)?,
                Direction::Before => NaiveDate::from_ymd_opt(year, 1, 1)?,
            };
            let available = business_days_between(cursor, edge, &holidays);
            if available < remaining {
                remaining -= available;
                cursor = step(edge, direction)?;
                continue;
            }
            // Target falls within this year.
            loop {
                if is_weekday(cursor) && !holidays.contains(&cursor) {
                    remaining -= 1;
                    if remaining == 0 {
                        return Some(cursor);
                    }
                }
                cursor = step(cursor, direction)?;
            }
        }
    }

    /// Offset by calendar days, then roll forward off weekends and holidays.
    /// Rolling is always forward, whichever way the offset went.
    pub fn add_calendar_days(
        &self,
        start: NaiveDate,
        days: u32,
        direction: Direction,
    ) -> Option<NaiveDate> {
        let offset = Days::new(u64::from(days));
        let date = match direction {
            Direction::After => start.checked_add_days(offset)?,
            Direction::Before => start.checked_sub_days(offset)?,
        };
        self.roll_forward(date)
    }

    /// First business day on or after `date`.
    pub fn roll_forward(&self, mut date: NaiveDate) -> Option<NaiveDate> {
        while !self.is_business_day(date) {
            date = date.succ_opt()?;
        }
        Some(date)
    }
}

fn is_weekday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Business days in the inclusive range between `a` and `b`, in either order.
fn business_days_between(a: NaiveDate, b: NaiveDate, holidays: &BTreeSet<NaiveDate>) -> u64 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let total = (hi - lo).num_days().unsigned_abs() + 1;
    let weeks = total / 7;
    let tail = (weeks * 7..total)
        .filter_map(|i| lo.checked_add_days(Days::new(i)))
        .filter(|&d| is_weekday(d))
        .count() as u64;
    let closed = holidays
        .range(lo..=hi)
        .filter(|&&d| is_weekday(d))
        .count() as u64;
    weeks * 5 + tail - closed
}

fn step(date: NaiveDate, direction: Direction) -> Option<NaiveDate> {
    match direction {
        Direction::After => date.succ_opt(),
        Direction::Before => date.pred_opt(),
    }
}

fn observed(date: NaiveDate) -> NaiveDate {
    let moved = match date.weekday() {
        Weekday::Sat => date.pred_opt(),
        Weekday::Sun => date.succ_opt(),
        _ => Some(date),
    };
    moved.unwrap_or(date)
}

fn last_weekday_of_month(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    let mut date = first_of_next.pred_opt()?;
    while date.weekday() != weekday {
        date = date.pred_opt()?;
    }
    Some(date)
}

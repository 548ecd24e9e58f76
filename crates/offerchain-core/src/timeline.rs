//! Timeline events: named deadlines that are either a fixed date or an offset
//! from another event.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::dates::parse_date;

/// Reserved root event. Always a specified date, supplied by the acceptance rule.
pub const ACCEPTANCE: &str = "acceptance";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    After,
    Before,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayType {
    Calendar,
    Business,
}

/// Offset from an anchor event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelativeTiming {
    pub days: u32,
    pub anchor: String,
    pub direction: Direction,
    pub day_type: DayType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "date_type", rename_all = "snake_case")]
pub enum EventTiming {
    Specified { date: NaiveDate },
    Relative(RelativeTiming),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub key: String,
    pub display_name: String,
    pub timing: EventTiming,
}

impl TimelineEvent {
    pub fn specified(key: &str, display_name: &str, date: NaiveDate) -> Self {
        Self {
            key: key.to_string(),
            display_name: display_name.to_string(),
            timing: EventTiming::Specified { date },
        }
    }

    pub fn relative(
        key: &str,
        display_name: &str,
        days: u32,
        anchor: &str,
        direction: Direction,
        day_type: DayType,
    ) -> Self {
        Self {
            key: key.to_string(),
            display_name: display_name.to_string(),
            timing: EventTiming::Relative(RelativeTiming {
                days,
                anchor: anchor.to_string(),
                direction,
                day_type,
            }),
        }
    }

    /// Anchor key for relative events.
    pub fn anchor(&self) -> Option<&str> {
        match &self.timing {
            EventTiming::Relative(r) => Some(&r.anchor),
            EventTiming::Specified { .. } => None,
        }
    }
}

impl fmt::Display for EventTiming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Specified { date } => write!(f, "{}", date.format("%Y-%m-%d")),
            Self::Relative(r) => {
                let unit = match r.day_type {
                    DayType::Calendar => "days",
                    DayType::Business => "business days",
                };
                let dir = match r.direction {
                    Direction::After => "after",
                    Direction::Before => "before",
                };
                write!(f, "{} {unit} {dir} {}", r.days, r.anchor)
            }
        }
    }
}

/// Timeline event exactly as the extraction provider sends it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTimelineEvent {
    pub event_key: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub date_type: String,
    #[serde(default)]
    pub specified_date: Option<String>,
    #[serde(default)]
    pub relative_days: Option<i64>,
    #[serde(default)]
    pub anchor_point: Option<String>,
    #[serde(default)]
    pub direction: Option<Direction>,
    #[serde(default)]
    pub day_type: Option<DayType>,
}

impl TryFrom<RawTimelineEvent> for TimelineEvent {
    type Error = String;

    fn try_from(raw: RawTimelineEvent) -> Result<Self, Self::Error> {
        let key = raw.event_key.trim().to_string();
        if key.is_empty() {
            return Err("timeline event with empty event_key".into());
        }
        let display_name = raw
            .display_name
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| key.clone());

        let timing = match raw.date_type.as_str() {
            "specified" => {
                let s = raw
                    .specified_date
                    .ok_or_else(|| format!("{key}: specified event without specified_date"))?;
                let date =
                    parse_date(&s).ok_or_else(|| format!("{key}: unparseable date {s:?}"))?;
                EventTiming::Specified { date }
            }
            "relative" => {
                let days = raw
                    .relative_days
                    .ok_or_else(|| format!("{key}: relative event without relative_days"))?;
                let days = u32::try_from(days)
                    .map_err(|_| format!("{key}: relative_days must be non-negative, got {days}"))?;
                let anchor = raw
                    .anchor_point
                    .map(|a| a.trim().to_string())
                    .filter(|a| !a.is_empty())
                    .ok_or_else(|| format!("{key}: relative event without anchor_point"))?;
                EventTiming::Relative(RelativeTiming {
                    days,
                    anchor,
                    direction: raw.direction.unwrap_or(Direction::After),
                    day_type: raw.day_type.unwrap_or(DayType::Calendar),
                })
            }
            other => return Err(format!("{key}: unknown date_type {other:?}")),
        };

        Ok(Self {
            key,
            display_name,
            timing,
        })
    }
}

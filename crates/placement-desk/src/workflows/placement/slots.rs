use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::domain::{Candidate, ScheduledCandidate, SlotAssignment};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SlotError {
    #[error("slot calendar has no dates")]
    EmptyCalendar,
    #[error("slot calendar has no exam times")]
    EmptyTimes,
    #[error("{requested} candidates exceed the {distinct_slots} distinct exam slots")]
    CapacityExceeded {
        requested: usize,
        distinct_slots: usize,
    },
    #[error("calendar cannot be extended past {last}")]
    CalendarOverflow { last: NaiveDate },
}

/// How to behave once the union outgrows the distinct (date, time) pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Keep cycling; later candidates share slots with earlier ones.
    Wrap,
    /// Refuse to assign anything.
    Reject,
    /// Append consecutive days until every candidate gets its own date.
    ExpandCalendar,
}

impl FromStr for CollisionPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "wrap" | "overflow" => Ok(Self::Wrap),
            "reject" | "error" => Ok(Self::Reject),
            "expand" | "expand_calendar" | "expand-calendar" => Ok(Self::ExpandCalendar),
            other => Err(format!(
                "unknown collision policy '{other}' (expected wrap|reject|expand)"
            )),
        }
    }
}

/// Fixed, ordered exam dates and times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotCalendar {
    dates: Vec<NaiveDate>,
    times: Vec<String>,
}

impl SlotCalendar {
    pub fn new(dates: Vec<NaiveDate>, times: Vec<String>) -> Result<Self, SlotError> {
        if dates.is_empty() {
            return Err(SlotError::EmptyCalendar);
        }
        if times.is_empty() {
            return Err(SlotError::EmptyTimes);
        }
        Ok(Self { dates, times })
    }

    /// `days` consecutive dates starting at `start`.
    pub fn consecutive(start: NaiveDate, days: u32, times: Vec<String>) -> Result<Self, SlotError> {
        let dates: Vec<NaiveDate> = start.iter_days().take(days as usize).collect();
        Self::new(dates, times)
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn times(&self) -> &[String] {
        &self.times
    }

    /// Positions after which (date, time) pairs start repeating.
    pub fn period(&self) -> usize {
        lcm(self.dates.len(), self.times.len())
    }

    pub fn slot_at(&self, position: usize) -> SlotAssignment {
        SlotAssignment {
            date: self.dates[position % self.dates.len()],
            time: self.times[position % self.times.len()].clone(),
        }
    }

    fn extended_to(&self, date_count: usize) -> Result<Self, SlotError> {
        let mut dates = self.dates.clone();
        while dates.len() < date_count {
            let last = *dates.last().ok_or(SlotError::EmptyCalendar)?;
            let next = last.succ_opt().ok_or(SlotError::CalendarOverflow { last })?;
            dates.push(next);
        }
        Ok(Self {
            dates,
            times: self.times.clone(),
        })
    }
}

impl Default for SlotCalendar {
    /// April 2025, three sittings a day.
    fn default() -> Self {
        let start = NaiveDate::from_ymd_opt(2025, 4, 1).unwrap_or_default();
        Self {
            dates: start.iter_days().take(30).collect(),
            times: vec![
                "09:00 AM".to_string(),
                "01:00 PM".to_string(),
                "04:00 PM".to_string(),
            ],
        }
    }
}

/// Union members with their slots, in union order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SlotSchedule {
    pub entries: Vec<ScheduledCandidate>,
    /// Candidates placed on a pair already taken by an earlier position.
    pub collisions: usize,
}

impl SlotSchedule {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Position `i` gets `dates[i % C]` and `times[i % T]`; identity plays no part.
#[derive(Debug, Clone)]
pub struct SlotAssigner {
    calendar: SlotCalendar,
    policy: CollisionPolicy,
}

impl SlotAssigner {
    pub fn new(calendar: SlotCalendar, policy: CollisionPolicy) -> Self {
        Self { calendar, policy }
    }

    pub fn assign(&self, union: Vec<Candidate>) -> Result<SlotSchedule, SlotError> {
        let requested = union.len();
        let distinct_slots = self.calendar.period();

        let calendar = if requested > distinct_slots {
            match self.policy {
                CollisionPolicy::Wrap => {
                    warn!(
                        requested,
                        distinct_slots,
                        "exam slots wrap around; some candidates share a sitting"
                    );
                    self.calendar.clone()
                }
                CollisionPolicy::Reject => {
                    return Err(SlotError::CapacityExceeded {
                        requested,
                        distinct_slots,
                    })
                }
                CollisionPolicy::ExpandCalendar => self.calendar.extended_to(requested)?,
            }
        } else {
            self.calendar.clone()
        };

        let collisions = requested.saturating_sub(calendar.period());
        let entries = union
            .into_iter()
            .enumerate()
            .map(|(position, candidate)| ScheduledCandidate {
                slot: calendar.slot_at(position),
                candidate,
            })
            .collect();

        Ok(SlotSchedule {
            entries,
            collisions,
        })
    }
}

fn gcd(a: usize, b: usize) -> usize {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

fn lcm(a: usize, b: usize) -> usize {
    if a == 0 || b == 0 {
        return 0;
    }
    a / gcd(a, b) * b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_is_lcm_of_dates_and_times() {
        let start = NaiveDate::from_ymd_opt(2025, 4, 1).expect("valid date");
        let times = ["a", "b", "c", "d", "e", "f"].map(String::from).to_vec();
        let calendar = SlotCalendar::consecutive(start, 4, times).expect("calendar builds");
        assert_eq!(calendar.period(), 12);
        assert_eq!(SlotCalendar::default().period(), 30);
    }

    #[test]
    fn rejects_empty_calendar_parts() {
        let start = NaiveDate::from_ymd_opt(2025, 4, 1).expect("valid date");
        assert_eq!(
            SlotCalendar::consecutive(start, 0, vec!["09:00 AM".into()]),
            Err(SlotError::EmptyCalendar)
        );
        assert_eq!(
            SlotCalendar::consecutive(start, 3, Vec::new()),
            Err(SlotError::EmptyTimes)
        );
    }

    #[test]
    fn policy_parses_aliases() {
        assert_eq!("expand".parse(), Ok(CollisionPolicy::ExpandCalendar));
        assert_eq!(" Error ".parse(), Ok(CollisionPolicy::Reject));
        assert!("maybe".parse::<CollisionPolicy>().is_err());
    }
}

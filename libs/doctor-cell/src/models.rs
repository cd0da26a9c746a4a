use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

/// Format of each half of a slot label, `HH:MM`.
pub const SLOT_TIME_FORMAT: &str = "%H:%M";
const SLOT_SEPARATOR: &str = " - ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
        DayOfWeek::Sunday,
    ];

    pub fn of(date: NaiveDate) -> Self {
        date.weekday().into()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DayOfWeek::Monday => "Monday",
            DayOfWeek::Tuesday => "Tuesday",
            DayOfWeek::Wednesday => "Wednesday",
            DayOfWeek::Thursday => "Thursday",
            DayOfWeek::Friday => "Friday",
            DayOfWeek::Saturday => "Saturday",
            DayOfWeek::Sunday => "Sunday",
        }
    }
}

impl From<Weekday> for DayOfWeek {
    fn from(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
            Weekday::Sun => DayOfWeek::Sunday,
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DayOfWeek {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let lowered = value.trim().to_ascii_lowercase();
        DayOfWeek::ALL
            .into_iter()
            .find(|day| {
                let name = day.as_str().to_ascii_lowercase();
                name == lowered || (lowered.len() == 3 && name.starts_with(&lowered))
            })
            .ok_or_else(|| format!("unknown day of week: {}", value))
    }
}

/// One recurring weekly window during which a doctor takes bookings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub availability_id: i64,
    pub doctor_id: i64,
    pub day_of_week: DayOfWeek,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl AvailabilityWindow {
    /// Left-closed tiling of the window into `duration` slots. A trailing
    /// remainder shorter than `duration` is dropped.
    pub fn tile(&self, duration: Duration) -> Vec<Slot> {
        let mut slots = Vec::new();
        if duration <= Duration::zero() {
            return slots;
        }

        let mut current = self.start_time;
        loop {
            let (slot_end, wrapped) = current.overflowing_add_signed(duration);
            if wrapped != 0 || slot_end > self.end_time {
                break;
            }
            slots.push(Slot::new(current, slot_end));
            current = slot_end;
        }

        slots
    }
}

/// A bookable interval. Never persisted; the label is what appointments store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub label: String,
}

impl Slot {
    pub fn new(start_time: NaiveTime, end_time: NaiveTime) -> Self {
        let label = format!(
            "{}{}{}",
            start_time.format(SLOT_TIME_FORMAT),
            SLOT_SEPARATOR,
            end_time.format(SLOT_TIME_FORMAT)
        );
        Self { start_time, end_time, label }
    }

    /// Parses `"HH:MM - HH:MM"`. Only the canonical rendering is accepted, so a
    /// parsed label always round-trips to the same string.
    pub fn parse_label(label: &str) -> Option<Slot> {
        let (start, end) = label.split_once(SLOT_SEPARATOR)?;
        let start_time = NaiveTime::parse_from_str(start, SLOT_TIME_FORMAT).ok()?;
        let end_time = NaiveTime::parse_from_str(end, SLOT_TIME_FORMAT).ok()?;
        if start_time >= end_time {
            return None;
        }

        let slot = Slot::new(start_time, end_time);
        (slot.label == label).then_some(slot)
    }

    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }
}

/// Body for adding or replacing availability: one window per listed day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityRequest {
    pub days: Vec<DayOfWeek>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteAvailabilityRequest {
    pub availability_ids: Vec<i64>,
}

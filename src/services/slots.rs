//! Appointment slot generation.
//!
//! Slots are a static schedule, not rows: the morning session runs from
//! 06:30 to 08:00 and the evening session from 16:30 to 21:00, one slot per
//! ten minutes. A slot is identified by `<Session>-<number>`; the booked set
//! for a day is the set of those keys present in `appointments`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::macros::time;
use time::{Date, Duration, OffsetDateTime, Time};

use crate::services::holiday::{Closure, Holiday, HolidayKind};

const SLOT_MINUTES: i64 = 10;

/// After this hour the morning session of the current day is closed.
const MORNING_CUTOFF_HOUR: u8 = 8;

/// After this hour the current day can no longer be booked.
const SAME_DAY_CUTOFF_HOUR: u8 = 21;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Session {
    #[default]
    Morning,
    Evening,
}

impl Session {
    pub const ALL: [Session; 2] = [Session::Morning, Session::Evening];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Morning => "Morning",
            Self::Evening => "Evening",
        }
    }

    /// Opening and closing time (exclusive) of the session.
    #[must_use]
    pub fn hours(self) -> (Time, Time) {
        match self {
            Self::Morning => (time!(6:30), time!(8:00)),
            Self::Evening => (time!(16:30), time!(21:00)),
        }
    }

    fn closed_by(self, closure: Closure) -> bool {
        match closure {
            Closure::Full => true,
            Closure::Morning => self == Self::Morning,
            Closure::Evening => self == Self::Evening,
        }
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown session: {0}")]
pub struct UnknownSession(pub String);

impl FromStr for Session {
    type Err = UnknownSession;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Morning" | "morning" => Ok(Self::Morning),
            "Evening" | "evening" => Ok(Self::Evening),
            other => Err(UnknownSession(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Slot {
    pub session: Session,
    pub number: i32,
    /// `HH:MM`, 24-hour.
    pub time: String,
}

impl Slot {
    #[must_use]
    pub fn key(&self) -> String {
        slot_key(self.session, self.number)
    }
}

#[must_use]
pub fn slot_key(session: Session, number: i32) -> String {
    format!("{session}-{number}")
}

// =============================================================================
// GENERATION
// =============================================================================

/// Every slot of one session, numbered from 1.
#[must_use]
pub fn session_slots(session: Session) -> Vec<Slot> {
    let (start, end) = session.hours();
    let mut slots = Vec::new();
    let mut at = start;
    let mut number = 1;
    while at < end {
        slots.push(Slot { session, number, time: format!("{:02}:{:02}", at.hour(), at.minute()) });
        at += Duration::minutes(SLOT_MINUTES);
        number += 1;
    }
    slots
}

/// Morning slots followed by evening slots.
#[must_use]
pub fn all_slots() -> Vec<Slot> {
    Session::ALL.into_iter().flat_map(session_slots).collect()
}

#[must_use]
pub fn find_slot(session: Session, number: i32) -> Option<Slot> {
    session_slots(session).into_iter().find(|s| s.number == number)
}

// =============================================================================
// VISIBILITY
// =============================================================================

/// Slots a patient may pick for `date`, given the clinic-local `now` and any
/// holiday on that date.
#[must_use]
pub fn visible_slots(date: Date, now: OffsetDateTime, holiday: Option<&Holiday>) -> Vec<Slot> {
    let morning_passed = date == now.date() && now.hour() >= MORNING_CUTOFF_HOUR;
    all_slots()
        .into_iter()
        .filter(|slot| !(morning_passed && slot.session == Session::Morning))
        .filter(|slot| holiday.is_none_or(|h| !slot.session.closed_by(h.session)))
        .collect()
}

/// Dates offered by the booking form. Today disappears at 21:00.
#[must_use]
pub fn bookable_dates(now: OffsetDateTime) -> Vec<Date> {
    let today = now.date();
    let tomorrow = today.next_day().unwrap_or(today);
    if now.hour() < SAME_DAY_CUTOFF_HOUR { vec![today, tomorrow] } else { vec![tomorrow] }
}

/// The date selected when the booking form opens.
#[must_use]
pub fn default_date(now: OffsetDateTime) -> Date {
    bookable_dates(now)
        .first()
        .copied()
        .unwrap_or_else(|| now.date())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HolidayNotice {
    pub kind: HolidayKind,
    pub session: Closure,
    pub message: String,
}

/// Banner shown when the selected date has a holiday.
#[must_use]
pub fn holiday_notice(holiday: &Holiday, today: Date) -> HolidayNotice {
    let prefix = if holiday.date == today { "Today" } else { "Tomorrow" };
    let reason = match holiday.kind {
        HolidayKind::Poya => "Poya holiday",
        HolidayKind::Other => "clinic closed",
    };
    HolidayNotice { kind: holiday.kind, session: holiday.session, message: format!("{prefix}: {reason}") }
}

// =============================================================================
// BOARD
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct SlotView {
    #[serde(flatten)]
    pub slot: Slot,
    pub key: String,
    pub booked: bool,
}

/// Everything the booking form needs for one date.
#[derive(Debug, Clone, Serialize)]
pub struct SlotBoard {
    pub date: Date,
    pub dates: Vec<Date>,
    pub holiday: Option<HolidayNotice>,
    pub slots: Vec<SlotView>,
}

#[must_use]
pub fn slot_board(date: Date, now: OffsetDateTime, holiday: Option<&Holiday>, booked_keys: &[String]) -> SlotBoard {
    let slots = visible_slots(date, now, holiday)
        .into_iter()
        .map(|slot| {
            let key = slot.key();
            let booked = booked_keys.contains(&key);
            SlotView { slot, key, booked }
        })
        .collect();
    SlotBoard {
        date,
        dates: bookable_dates(now),
        holiday: holiday.map(|h| holiday_notice(h, now.date())),
        slots,
    }
}

#[cfg(test)]
#[path = "slots_test.rs"]
mod tests;

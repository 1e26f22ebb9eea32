use super::*;
use time::macros::{date, datetime};
use uuid::Uuid;

fn holiday(date: Date, kind: HolidayKind, session: Closure) -> Holiday {
    Holiday { id: Uuid::new_v4(), date, kind, session }
}

// =============================================================================
// generation
// =============================================================================

#[test]
fn morning_has_nine_slots() {
    let slots = session_slots(Session::Morning);
    assert_eq!(slots.len(), 9);
    assert_eq!(slots[0].time, "06:30");
    assert_eq!(slots[0].number, 1);
    assert_eq!(slots[8].time, "07:50");
    assert_eq!(slots[8].number, 9);
}

#[test]
fn evening_has_twenty_seven_slots() {
    let slots = session_slots(Session::Evening);
    assert_eq!(slots.len(), 27);
    assert_eq!(slots[0].time, "16:30");
    assert_eq!(slots[26].time, "20:50");
}

#[test]
fn numbering_restarts_per_session() {
    let all = all_slots();
    assert_eq!(all.len(), 36);
    assert_eq!(all[9].session, Session::Evening);
    assert_eq!(all[9].number, 1);
}

#[test]
fn slot_key_format() {
    assert_eq!(slot_key(Session::Evening, 12), "Evening-12");
    let slot = find_slot(Session::Morning, 3).expect("slot");
    assert_eq!(slot.key(), "Morning-3");
    assert_eq!(slot.time, "06:50");
    assert!(find_slot(Session::Morning, 10).is_none());
}

#[test]
fn session_parses_either_case() {
    assert_eq!("Morning".parse::<Session>(), Ok(Session::Morning));
    assert_eq!("evening".parse::<Session>(), Ok(Session::Evening));
    assert!("Night".parse::<Session>().is_err());
}

// =============================================================================
// visibility
// =============================================================================

#[test]
fn morning_hidden_for_today_after_eight() {
    let now = datetime!(2026-10-18 08:05 +05:30);
    let slots = visible_slots(now.date(), now, None);
    assert!(slots.iter().all(|s| s.session == Session::Evening));
    assert_eq!(slots.len(), 27);
}

#[test]
fn morning_visible_for_today_before_eight() {
    let now = datetime!(2026-10-18 07:59 +05:30);
    assert_eq!(visible_slots(now.date(), now, None).len(), 36);
}

#[test]
fn morning_visible_for_tomorrow_even_late() {
    let now = datetime!(2026-10-18 20:00 +05:30);
    assert_eq!(visible_slots(date!(2026 - 10 - 19), now, None).len(), 36);
}

#[test]
fn full_holiday_hides_everything() {
    let now = datetime!(2026-10-18 06:00 +05:30);
    let day = date!(2026 - 10 - 19);
    let h = holiday(day, HolidayKind::Poya, Closure::Full);
    assert!(visible_slots(day, now, Some(&h)).is_empty());
}

#[test]
fn partial_holiday_hides_one_session() {
    let now = datetime!(2026-10-18 06:00 +05:30);
    let day = date!(2026 - 10 - 19);

    let morning_off = holiday(day, HolidayKind::Other, Closure::Morning);
    let slots = visible_slots(day, now, Some(&morning_off));
    assert!(slots.iter().all(|s| s.session == Session::Evening));

    let evening_off = holiday(day, HolidayKind::Other, Closure::Evening);
    let slots = visible_slots(day, now, Some(&evening_off));
    assert_eq!(slots.len(), 9);
    assert!(slots.iter().all(|s| s.session == Session::Morning));
}

// =============================================================================
// dates & notices
// =============================================================================

#[test]
fn today_bookable_before_nine_pm() {
    let now = datetime!(2026-10-18 20:59 +05:30);
    assert_eq!(bookable_dates(now), vec![date!(2026 - 10 - 18), date!(2026 - 10 - 19)]);
    assert_eq!(default_date(now), date!(2026 - 10 - 18));
}

#[test]
fn only_tomorrow_after_nine_pm() {
    let now = datetime!(2026-10-18 21:00 +05:30);
    assert_eq!(bookable_dates(now), vec![date!(2026 - 10 - 19)]);
    assert_eq!(default_date(now), date!(2026 - 10 - 19));
}

#[test]
fn holiday_notice_wording() {
    let today = date!(2026 - 10 - 18);
    let poya = holiday(today, HolidayKind::Poya, Closure::Full);
    assert_eq!(holiday_notice(&poya, today).message, "Today: Poya holiday");

    let closed = holiday(date!(2026 - 10 - 19), HolidayKind::Other, Closure::Evening);
    let notice = holiday_notice(&closed, today);
    assert_eq!(notice.message, "Tomorrow: clinic closed");
    assert_eq!(notice.session, Closure::Evening);
}

#[test]
fn slot_board_marks_booked_keys() {
    let now = datetime!(2026-10-18 06:00 +05:30);
    let booked = vec!["Morning-1".to_owned(), "Evening-27".to_owned()];
    let board = slot_board(now.date(), now, None, &booked);

    assert_eq!(board.slots.len(), 36);
    assert!(board.slots[0].booked);
    assert!(!board.slots[1].booked);
    assert!(board.slots.last().is_some_and(|s| s.booked));
    assert!(board.holiday.is_none());
}

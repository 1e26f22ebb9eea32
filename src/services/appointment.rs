//! Appointment service: public booking and the doctor's daily queue.
//!
//! DESIGN
//! ======
//! Slot uniqueness is owned by the `(date, session, number)` constraint. The
//! service validates the request against the visible slot list, then lets
//! the insert race; the loser of a concurrent booking gets `E_SLOT_TAKEN`
//! from the unique violation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use time::{Date, OffsetDateTime};
use tracing::info;
use uuid::Uuid;

use crate::frame::{Data, ErrorCode};
use crate::services::holiday::{self, Holiday, HolidayError};
use crate::services::hub::{self, Topic};
use crate::services::slots::{self, Session, Slot};
use crate::state::AppState;

#[derive(Debug, thiserror::Error)]
pub enum AppointmentError {
    #[error("{0}")]
    Invalid(&'static str),
    #[error("date is not open for booking: {0}")]
    DateNotBookable(Date),
    #[error("slot is not available: {session} #{number}")]
    SlotUnavailable { session: Session, number: i32 },
    #[error("slot already booked: {0}")]
    SlotTaken(String),
    #[error("appointment not found: {0}")]
    NotFound(Uuid),
    #[error(transparent)]
    Holiday(#[from] HolidayError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for AppointmentError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Invalid(_) => "E_INVALID_INPUT",
            Self::DateNotBookable(_) => "E_DATE_NOT_BOOKABLE",
            Self::SlotUnavailable { .. } => "E_SLOT_UNAVAILABLE",
            Self::SlotTaken(_) => "E_SLOT_TAKEN",
            Self::NotFound(_) => "E_NOT_FOUND",
            Self::Holiday(e) => e.error_code(),
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Holiday(e) => e.retryable(),
            _ => matches!(self, Self::Database(_)),
        }
    }
}

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AppointmentKind {
    #[default]
    Regular,
    WalkIn,
    Emergency,
}

impl AppointmentKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::WalkIn => "walk-in",
            Self::Emergency => "emergency",
        }
    }

    /// Walk-ins are counted with emergencies on the queue header.
    #[must_use]
    pub fn is_urgent(self) -> bool {
        matches!(self, Self::WalkIn | Self::Emergency)
    }
}

impl FromStr for AppointmentKind {
    type Err = AppointmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "regular" => Ok(Self::Regular),
            "walk-in" => Ok(Self::WalkIn),
            "emergency" => Ok(Self::Emergency),
            _ => Err(AppointmentError::Invalid("unknown appointment kind")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    #[default]
    Pending,
    Completed,
}

impl AppointmentStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_name: String,
    pub phone: String,
    pub age: String,
    pub date: Date,
    pub session: Session,
    pub number: i32,
    pub time_label: String,
    pub kind: AppointmentKind,
    pub status: AppointmentStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

const APPOINTMENT_COLUMNS: &str =
    "id, patient_name, phone, age, date, session, number, time_label, kind, status, created_at";

fn appointment_from_row(row: &PgRow) -> Result<Appointment, sqlx::Error> {
    let session: String = row.try_get("session")?;
    let kind: String = row.try_get("kind")?;
    let status: String = row.try_get("status")?;
    Ok(Appointment {
        id: row.try_get("id")?,
        patient_name: row.try_get("patient_name")?,
        phone: row.try_get("phone")?,
        age: row.try_get("age")?,
        date: row.try_get("date")?,
        // Rows without a usable session are queued with the morning list.
        session: session.parse().unwrap_or_default(),
        number: row.try_get("number")?,
        time_label: row.try_get("time_label")?,
        kind: kind.parse().unwrap_or_default(),
        status: if status == AppointmentStatus::Completed.as_str() {
            AppointmentStatus::Completed
        } else {
            AppointmentStatus::Pending
        },
        created_at: row.try_get("created_at")?,
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookingRequest {
    pub patient_name: String,
    pub phone: String,
    pub age: String,
    pub date: Date,
    pub session: Session,
    pub number: i32,
}

/// Confirmation returned to the patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Booking {
    pub id: Uuid,
    pub date: Date,
    pub session: Session,
    pub number: i32,
    pub time: String,
}

// =============================================================================
// BOOKING
// =============================================================================

/// Check a booking request against the clinic clock and holiday calendar.
/// Returns the slot to book.
///
/// # Errors
///
/// `Invalid` for blank fields, `DateNotBookable` outside the booking window,
/// `SlotUnavailable` for a slot that does not exist or is hidden.
pub fn validate_booking(
    request: &BookingRequest,
    now: OffsetDateTime,
    holiday: Option<&Holiday>,
) -> Result<Slot, AppointmentError> {
    if request.patient_name.trim().is_empty() {
        return Err(AppointmentError::Invalid("patient name is required"));
    }
    if request.phone.trim().is_empty() {
        return Err(AppointmentError::Invalid("phone is required"));
    }
    if request.age.trim().is_empty() {
        return Err(AppointmentError::Invalid("age is required"));
    }
    if !slots::bookable_dates(now).contains(&request.date) {
        return Err(AppointmentError::DateNotBookable(request.date));
    }
    slots::visible_slots(request.date, now, holiday)
        .into_iter()
        .find(|s| s.session == request.session && s.number == request.number)
        .ok_or(AppointmentError::SlotUnavailable { session: request.session, number: request.number })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Book a slot for a patient.
///
/// # Errors
///
/// Validation errors from [`validate_booking`], `SlotTaken` when the slot was
/// booked first by someone else.
pub async fn book(state: &AppState, request: &BookingRequest, now: OffsetDateTime) -> Result<Booking, AppointmentError> {
    let holiday = holiday::holiday_on(&state.pool, request.date).await?;
    let slot = validate_booking(request, now, holiday.as_ref())?;

    let inserted = sqlx::query_scalar::<_, Uuid>(
        "INSERT INTO appointments (patient_name, phone, age, date, session, number, time_label, kind, status)
         VALUES ($1, $2, $3, $4, $5, $6, $7, 'regular', 'pending')
         RETURNING id",
    )
    .bind(request.patient_name.trim())
    .bind(request.phone.trim())
    .bind(request.age.trim())
    .bind(request.date)
    .bind(slot.session.as_str())
    .bind(slot.number)
    .bind(&slot.time)
    .fetch_one(&state.pool)
    .await;

    let id = match inserted {
        Ok(id) => id,
        Err(err) if is_unique_violation(&err) => return Err(AppointmentError::SlotTaken(slot.key())),
        Err(err) => return Err(err.into()),
    };

    info!(%id, date = %request.date, key = %slot.key(), "appointment booked");
    hub::notify(state, &Topic::Appointments(request.date), "appointments:changed", Data::new()).await;
    Ok(Booking { id, date: request.date, session: slot.session, number: slot.number, time: slot.time })
}

// =============================================================================
// QUEUE
// =============================================================================

/// Taken slot keys (`Morning-3`) for a date.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn booked_keys(pool: &PgPool, date: Date) -> Result<Vec<String>, AppointmentError> {
    let rows = sqlx::query_as::<_, (String, i32)>("SELECT session, number FROM appointments WHERE date = $1")
        .bind(date)
        .fetch_all(pool)
        .await?;
    Ok(rows
        .into_iter()
        .map(|(session, number)| slots::slot_key(session.parse().unwrap_or_default(), number))
        .collect())
}

/// One day of the doctor's queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueDay {
    pub date: Date,
    pub morning: Vec<Appointment>,
    pub evening: Vec<Appointment>,
    pub emergency_count: usize,
    pub regular_count: usize,
}

/// Split appointments (already ordered by number) into the two sessions.
#[must_use]
pub fn build_queue(date: Date, appointments: Vec<Appointment>) -> QueueDay {
    let emergency_count = appointments.iter().filter(|a| a.kind.is_urgent()).count();
    let regular_count = appointments.len() - emergency_count;
    let (morning, evening) = appointments.into_iter().partition(|a| a.session == Session::Morning);
    QueueDay { date, morning, evening, emergency_count, regular_count }
}

/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_for_date(pool: &PgPool, date: Date) -> Result<QueueDay, AppointmentError> {
    let rows = sqlx::query(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE date = $1 ORDER BY number ASC"
    ))
    .bind(date)
    .fetch_all(pool)
    .await?;
    let appointments = rows.iter().map(appointment_from_row).collect::<Result<Vec<_>, _>>()?;
    Ok(build_queue(date, appointments))
}

/// # Errors
///
/// Returns `NotFound` if the id is unknown.
pub async fn get_appointment(pool: &PgPool, id: Uuid) -> Result<Appointment, AppointmentError> {
    let row = sqlx::query(&format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppointmentError::NotFound(id))?;
    Ok(appointment_from_row(&row)?)
}

/// Cancel (delete) an appointment.
///
/// # Errors
///
/// Returns `NotFound` if the id is unknown.
pub async fn cancel(state: &AppState, id: Uuid) -> Result<(), AppointmentError> {
    let date: Option<Date> = sqlx::query_scalar("DELETE FROM appointments WHERE id = $1 RETURNING date")
        .bind(id)
        .fetch_optional(&state.pool)
        .await?;
    let date = date.ok_or(AppointmentError::NotFound(id))?;
    info!(%id, %date, "appointment cancelled");
    hub::notify(state, &Topic::Appointments(date), "appointments:changed", Data::new()).await;
    Ok(())
}

/// Mark an appointment completed on an open transaction. Returns its date
/// so the caller can notify after commit.
///
/// # Errors
///
/// Returns `NotFound` if the id is unknown.
pub async fn mark_completed_in(conn: &mut PgConnection, id: Uuid) -> Result<Date, AppointmentError> {
    let date: Option<Date> =
        sqlx::query_scalar("UPDATE appointments SET status = 'completed' WHERE id = $1 RETURNING date")
            .bind(id)
            .fetch_optional(conn)
            .await?;
    date.ok_or(AppointmentError::NotFound(id))
}

/// # Errors
///
/// Returns `NotFound` if the id is unknown.
pub async fn mark_completed(state: &AppState, id: Uuid) -> Result<(), AppointmentError> {
    let mut conn = state.pool.acquire().await?;
    let date = mark_completed_in(&mut conn, id).await?;
    drop(conn);
    hub::notify(state, &Topic::Appointments(date), "appointments:changed", Data::new()).await;
    Ok(())
}

/// Most recent appointment booked with `phone`.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn find_latest_by_phone(pool: &PgPool, phone: &str) -> Result<Option<Appointment>, AppointmentError> {
    let row = sqlx::query(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE phone = $1 ORDER BY created_at DESC LIMIT 1"
    ))
    .bind(phone.trim())
    .fetch_optional(pool)
    .await?;
    Ok(row.as_ref().map(appointment_from_row).transpose()?)
}

/// Pending appointments for `date` (dashboard counter).
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn pending_count(pool: &PgPool, date: Date) -> Result<i64, AppointmentError> {
    let count: i64 = sqlx::query_scalar("SELECT count(*) FROM appointments WHERE date = $1 AND status = 'pending'")
        .bind(date)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

#[cfg(test)]
#[path = "appointment_test.rs"]
mod tests;

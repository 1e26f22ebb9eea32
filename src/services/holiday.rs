//! Holiday service: closed days and half-day closures.
//!
//! A holiday hides booking slots for its date. `full` closes the whole day,
//! `morning` / `evening` close one session only.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use time::Date;
use tracing::info;
use uuid::Uuid;

use crate::frame::{Data, ErrorCode};
use crate::services::hub::{self, Topic};
use crate::state::AppState;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum HolidayError {
    #[error("holiday not found: {0}")]
    NotFound(Uuid),
    #[error("invalid holiday {field}: {value}")]
    Invalid { field: &'static str, value: String },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for HolidayError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_NOT_FOUND",
            Self::Invalid { .. } => "E_INVALID_INPUT",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HolidayKind {
    Poya,
    Other,
}

impl HolidayKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Poya => "poya",
            Self::Other => "other",
        }
    }
}

impl FromStr for HolidayKind {
    type Err = HolidayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "poya" => Ok(Self::Poya),
            "other" => Ok(Self::Other),
            _ => Err(HolidayError::Invalid { field: "kind", value: s.to_owned() }),
        }
    }
}

/// Which part of the day a holiday closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Closure {
    #[default]
    Full,
    Morning,
    Evening,
}

impl Closure {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Morning => "morning",
            Self::Evening => "evening",
        }
    }
}

impl FromStr for Closure {
    type Err = HolidayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(Self::Full),
            "morning" => Ok(Self::Morning),
            "evening" => Ok(Self::Evening),
            _ => Err(HolidayError::Invalid { field: "session", value: s.to_owned() }),
        }
    }
}

impl fmt::Display for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Holiday {
    pub id: Uuid,
    pub date: Date,
    pub kind: HolidayKind,
    pub session: Closure,
}

fn holiday_from_row(row: &PgRow) -> Result<Holiday, HolidayError> {
    let kind: String = row.try_get("kind")?;
    let session: String = row.try_get("session")?;
    Ok(Holiday { id: row.try_get("id")?, date: row.try_get("date")?, kind: kind.parse()?, session: session.parse()? })
}

// =============================================================================
// OPERATIONS
// =============================================================================

/// Mark a date (or one session of it) as closed.
///
/// # Errors
///
/// Returns a database error if the insert fails.
pub async fn add_holiday(state: &AppState, date: Date, kind: HolidayKind, session: Closure) -> Result<Holiday, HolidayError> {
    let id: Uuid = sqlx::query_scalar("INSERT INTO holidays (date, kind, session) VALUES ($1, $2, $3) RETURNING id")
        .bind(date)
        .bind(kind.as_str())
        .bind(session.as_str())
        .fetch_one(&state.pool)
        .await?;

    info!(%id, %date, kind = kind.as_str(), %session, "holiday added");
    hub::notify(state, &Topic::Holidays, "holidays:changed", Data::new()).await;
    Ok(Holiday { id, date, kind, session })
}

/// All holidays, earliest first.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_holidays(pool: &PgPool) -> Result<Vec<Holiday>, HolidayError> {
    let rows = sqlx::query("SELECT id, date, kind, session FROM holidays ORDER BY date ASC")
        .fetch_all(pool)
        .await?;
    rows.iter().map(holiday_from_row).collect()
}

/// Remove a holiday.
///
/// # Errors
///
/// Returns `NotFound` if no holiday has this id.
pub async fn delete_holiday(state: &AppState, id: Uuid) -> Result<(), HolidayError> {
    let result = sqlx::query("DELETE FROM holidays WHERE id = $1")
        .bind(id)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(HolidayError::NotFound(id));
    }

    info!(%id, "holiday deleted");
    hub::notify(state, &Topic::Holidays, "holidays:changed", Data::new()).await;
    Ok(())
}

/// The holiday covering `date`, if any. First match wins.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn holiday_on(pool: &PgPool, date: Date) -> Result<Option<Holiday>, HolidayError> {
    let row = sqlx::query("SELECT id, date, kind, session FROM holidays WHERE date = $1 LIMIT 1")
        .bind(date)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(holiday_from_row).transpose()
}

#[cfg(test)]
#[path = "holiday_test.rs"]
mod tests;

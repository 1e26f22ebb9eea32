//! Staff access slots.
//!
//! The clinic has exactly three staff logins, `S0001` to `S0003`. A slot is
//! either empty or assigned to a named person with an access code; staff
//! sign in with that name and code. Codes are stored salted and hashed.

use serde::Serialize;
use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::info;

use crate::frame::{Data, ErrorCode};
use crate::services::hub::{self, Topic};
use crate::services::session::{self, Principal, Role};
use crate::state::AppState;

pub const STAFF_CODES: [&str; 3] = ["S0001", "S0002", "S0003"];

#[derive(Debug, thiserror::Error)]
pub enum StaffError {
    #[error("{0}")]
    Invalid(&'static str),
    #[error("unknown staff code: {0}")]
    UnknownCode(String),
    #[error("staff slot {0} is empty")]
    NotAssigned(String),
    #[error("invalid staff name or access code")]
    InvalidCredentials,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for StaffError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Invalid(_) => "E_INVALID_INPUT",
            Self::UnknownCode(_) => "E_UNKNOWN_STAFF_CODE",
            Self::NotAssigned(_) => "E_NOT_FOUND",
            Self::InvalidCredentials => "E_UNAUTHORIZED",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaffSlot {
    pub code: &'static str,
    pub assignee: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub assigned_at: Option<OffsetDateTime>,
}

/// Canonical form of a slot code, or `None` if it is not one of the three.
#[must_use]
pub fn canonical_code(raw: &str) -> Option<&'static str> {
    let upper = raw.trim().to_ascii_uppercase();
    STAFF_CODES.into_iter().find(|c| *c == upper)
}

/// Assign (or reassign) a slot.
///
/// # Errors
///
/// `Invalid` for a blank field, `UnknownCode` outside `S0001..S0003`.
pub async fn assign(state: &AppState, code: &str, name: &str, password: &str) -> Result<StaffSlot, StaffError> {
    let name = name.trim();
    if code.trim().is_empty() || name.is_empty() || password.is_empty() {
        return Err(StaffError::Invalid("code, name and access code are required"));
    }
    let code = canonical_code(code).ok_or_else(|| StaffError::UnknownCode(code.trim().to_owned()))?;

    let salt = session::generate_salt();
    let hash = session::hash_secret(&salt, password);
    let assigned_at: OffsetDateTime = sqlx::query_scalar(
        "INSERT INTO staff_access (code, name, password_hash, password_salt)
         VALUES ($1, $2, $3, $4)
         ON CONFLICT (code) DO UPDATE
             SET name = EXCLUDED.name, password_hash = EXCLUDED.password_hash,
                 password_salt = EXCLUDED.password_salt, created_at = now()
         RETURNING created_at",
    )
    .bind(code)
    .bind(name)
    .bind(&hash)
    .bind(&salt)
    .fetch_one(&state.pool)
    .await?;

    // A reassigned slot must not keep the previous holder signed in.
    session::delete_sessions_for(&state.pool, Role::Staff, code).await?;
    info!(%code, %name, "staff slot assigned");
    hub::notify(state, &Topic::Staff, "staff:changed", Data::new()).await;
    Ok(StaffSlot { code, assignee: Some(name.to_owned()), assigned_at: Some(assigned_at) })
}

/// Every slot in code order, empty ones included.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list(pool: &PgPool) -> Result<Vec<StaffSlot>, StaffError> {
    let rows = sqlx::query_as::<_, (String, String, OffsetDateTime)>("SELECT code, name, created_at FROM staff_access")
        .fetch_all(pool)
        .await?;
    Ok(STAFF_CODES
        .into_iter()
        .map(|code| {
            let assigned = rows.iter().find(|(c, _, _)| c == code);
            StaffSlot {
                code,
                assignee: assigned.map(|(_, name, _)| name.clone()),
                assigned_at: assigned.map(|(_, _, at)| *at),
            }
        })
        .collect())
}

/// Clear a slot and sign its holder out.
///
/// # Errors
///
/// `UnknownCode` for a bad code, `NotAssigned` for an empty slot.
pub async fn remove(state: &AppState, code: &str) -> Result<(), StaffError> {
    let code = canonical_code(code).ok_or_else(|| StaffError::UnknownCode(code.trim().to_owned()))?;
    let result = sqlx::query("DELETE FROM staff_access WHERE code = $1")
        .bind(code)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StaffError::NotAssigned(code.to_owned()));
    }
    session::delete_sessions_for(&state.pool, Role::Staff, code).await?;
    info!(%code, "staff slot cleared");
    hub::notify(state, &Topic::Staff, "staff:changed", Data::new()).await;
    Ok(())
}

/// Staff sign-in: the name (case-insensitive) and access code must match
/// one assigned slot.
///
/// # Errors
///
/// `InvalidCredentials` when no slot matches.
pub async fn verify(pool: &PgPool, name: &str, password: &str) -> Result<Principal, StaffError> {
    let name = name.trim();
    if name.is_empty() || password.is_empty() {
        return Err(StaffError::InvalidCredentials);
    }
    let rows = sqlx::query_as::<_, (String, String, String, String)>(
        "SELECT code, name, password_hash, password_salt FROM staff_access
         WHERE lower(name) = lower($1) ORDER BY code",
    )
    .bind(name)
    .fetch_all(pool)
    .await?;
    rows.into_iter()
        .find(|(_, _, hash, salt)| session::verify_secret(salt, password, hash))
        .map(|(code, name, _, _)| Principal { role: Role::Staff, subject: code, name })
        .ok_or(StaffError::InvalidCredentials)
}

#[cfg(test)]
#[path = "staff_test.rs"]
mod tests;

//! Session and WS-ticket management.
//!
//! ARCHITECTURE
//! ============
//! HTTP auth uses session tokens in an HttpOnly cookie; websocket upgrades
//! use one-time short-lived tickets so the cookie never travels in a query
//! string. Both carry the same principal: a role, a subject (account id,
//! staff code or patient phone) and a display name.
//!
//! TRADE-OFFS
//! ==========
//! Ticket consumption is destructive (`DELETE ... RETURNING`) to guarantee
//! single use; this favors replay safety over reconnect convenience.

use std::fmt::Write;

use rand::Rng;
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::{PgExecutor, PgPool, Row};
use time::{Duration, OffsetDateTime};

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Generate a cryptographically random 32-byte hex token.
#[must_use]
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    bytes_to_hex(&bytes)
}

/// Generate a short-lived 16-byte hex WS ticket.
#[must_use]
pub(crate) fn generate_ws_ticket() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes_to_hex(&bytes)
}

// =============================================================================
// SECRETS
// =============================================================================

/// Random 16-byte hex salt for a stored secret.
#[must_use]
pub fn generate_salt() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes_to_hex(&bytes)
}

/// Salted SHA-256 of a password or staff access code, hex encoded.
#[must_use]
pub fn hash_secret(salt: &str, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(secret.as_bytes());
    bytes_to_hex(&hasher.finalize())
}

#[must_use]
pub fn verify_secret(salt: &str, secret: &str, expected_hash: &str) -> bool {
    let actual = hash_secret(salt, secret);
    // Length is fixed; fold every byte so timing does not depend on the
    // first mismatch.
    actual.len() == expected_hash.len()
        && actual
            .bytes()
            .zip(expected_hash.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

// =============================================================================
// PRINCIPALS
// =============================================================================

/// Who is calling. Ordered by privilege: doctor > staff > patient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Staff,
    Doctor,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Patient => "patient",
            Self::Staff => "staff",
            Self::Doctor => "doctor",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "patient" => Some(Self::Patient),
            "staff" => Some(Self::Staff),
            "doctor" => Some(Self::Doctor),
            _ => None,
        }
    }

    /// True when this role may act with `required` privileges.
    #[must_use]
    pub fn satisfies(self, required: Role) -> bool {
        self >= required
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub role: Role,
    /// Account id for the doctor, staff code for staff, phone for patients.
    pub subject: String,
    pub name: String,
}

fn principal_from_parts(role: &str, subject: String, name: String) -> Option<Principal> {
    Some(Principal { role: Role::parse(role)?, subject, name })
}

// =============================================================================
// SESSIONS
// =============================================================================

/// Create a session for the principal, returning the token.
///
/// # Errors
///
/// Returns a database error if the insert fails.
pub async fn create_session(
    pool: &PgPool,
    principal: &Principal,
    ttl_hours: i64,
    now: OffsetDateTime,
) -> Result<String, sqlx::Error> {
    let token = generate_token();
    sqlx::query("INSERT INTO sessions (token, role, subject, name, expires_at) VALUES ($1, $2, $3, $4, $5)")
        .bind(&token)
        .bind(principal.role.as_str())
        .bind(&principal.subject)
        .bind(&principal.name)
        .bind(now + Duration::hours(ttl_hours))
        .execute(pool)
        .await?;
    Ok(token)
}

/// Validate a session token and return its principal.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn validate_session(pool: &PgPool, token: &str) -> Result<Option<Principal>, sqlx::Error> {
    let row = sqlx::query("SELECT role, subject, name FROM sessions WHERE token = $1 AND expires_at > now()")
        .bind(token)
        .fetch_optional(pool)
        .await?;
    Ok(row.and_then(|r| principal_from_parts(r.get::<&str, _>("role"), r.get("subject"), r.get("name"))))
}

/// Delete a session by token.
///
/// # Errors
///
/// Returns a database error if the delete fails.
pub async fn delete_session(pool: &PgPool, token: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM sessions WHERE token = $1")
        .bind(token)
        .execute(pool)
        .await?;
    Ok(())
}

/// Drop every session of a subject (staff slot removed, password reset).
///
/// # Errors
///
/// Returns a database error if the delete fails.
pub async fn delete_sessions_for<'e>(
    executor: impl PgExecutor<'e>,
    role: Role,
    subject: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM sessions WHERE role = $1 AND subject = $2")
        .bind(role.as_str())
        .bind(subject)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

// =============================================================================
// WS TICKETS
// =============================================================================

/// Create a short-lived WS ticket for the principal.
///
/// # Errors
///
/// Returns a database error if the insert fails.
pub async fn create_ws_ticket(pool: &PgPool, principal: &Principal) -> Result<String, sqlx::Error> {
    let ticket = generate_ws_ticket();
    sqlx::query("INSERT INTO ws_tickets (ticket, role, subject, name) VALUES ($1, $2, $3, $4)")
        .bind(&ticket)
        .bind(principal.role.as_str())
        .bind(&principal.subject)
        .bind(&principal.name)
        .execute(pool)
        .await?;
    Ok(ticket)
}

/// Consume a WS ticket atomically, returning the principal if valid.
///
/// # Errors
///
/// Returns a database error if the delete fails.
pub async fn consume_ws_ticket(pool: &PgPool, ticket: &str) -> Result<Option<Principal>, sqlx::Error> {
    let row = sqlx::query(
        "DELETE FROM ws_tickets WHERE ticket = $1 AND expires_at > now() RETURNING role, subject, name",
    )
    .bind(ticket)
    .fetch_optional(pool)
    .await?;
    Ok(row.and_then(|r| principal_from_parts(r.get::<&str, _>("role"), r.get("subject"), r.get("name"))))
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;

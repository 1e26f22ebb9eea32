//! Account auth: registration, doctor and patient sign-in, password reset.
//!
//! DESIGN
//! ======
//! Passwords are salted SHA-256 (`session::hash_secret`). Only the account
//! whose email equals `DOCTOR_EMAIL` may open a doctor session, whatever its
//! stored role. Reset codes follow the single-use code flow: the newest
//! unconsumed code for an email is checked, every miss bumps its attempt
//! counter, and the fifth miss burns it.

use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::frame::ErrorCode;
use crate::services::mail;
use crate::services::patient;
use crate::services::session::{self, Principal, Role};
use crate::state::AppState;

pub const MIN_PASSWORD_LEN: usize = 6;
const CODE_LEN: usize = 6;
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const MAX_FAILED_ATTEMPTS: i32 = 5;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid email")]
    InvalidEmail,
    #[error("password must be at least {MIN_PASSWORD_LEN} characters")]
    WeakPassword,
    #[error("{0}")]
    Invalid(&'static str),
    #[error("an account with this email already exists")]
    EmailTaken,
    #[error("invalid admin registration key")]
    RegistrationKey,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("access denied")]
    AccessDenied,
    #[error("invalid code")]
    InvalidCode,
    #[error("expired or incorrect code")]
    VerificationFailed,
    #[error("password reset email is not configured")]
    MailUnavailable,
    #[error(transparent)]
    Mail(#[from] mail::MailError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for AuthError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidEmail | Self::WeakPassword | Self::Invalid(_) | Self::InvalidCode => "E_INVALID_INPUT",
            Self::EmailTaken => "E_DUPLICATE",
            Self::RegistrationKey | Self::AccessDenied => "E_FORBIDDEN",
            Self::InvalidCredentials | Self::VerificationFailed => "E_UNAUTHORIZED",
            Self::MailUnavailable => "E_MAIL_DISABLED",
            Self::Mail(_) => "E_MAIL_DELIVERY",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Mail(_))
    }
}

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountRole {
    Admin,
    #[default]
    Staff,
    Patient,
}

impl AccountRole {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Staff => "staff",
            Self::Patient => "patient",
        }
    }

    fn parse(raw: &str) -> Self {
        match raw {
            "admin" => Self::Admin,
            "patient" => Self::Patient,
            _ => Self::Staff,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: AccountRole,
    pub phone: Option<String>,
    pub age: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

const ACCOUNT_COLUMNS: &str = "id, email, name, role, phone, age, created_at";

fn account_from_row(row: &PgRow) -> Result<Account, sqlx::Error> {
    let role: String = row.try_get("role")?;
    Ok(Account {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        role: AccountRole::parse(&role),
        phone: row.try_get("phone")?,
        age: row.try_get("age")?,
        created_at: row.try_get("created_at")?,
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: AccountRole,
    /// Required for `admin`; must equal `ADMIN_REGISTRATION_KEY`.
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub age: Option<String>,
}

// =============================================================================
// NORMALIZATION
// =============================================================================

#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    let normalized = email.trim().to_ascii_lowercase();
    let (local, domain) = normalized.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return None;
    }
    Some(normalized)
}

#[must_use]
pub fn normalize_code(code: &str) -> Option<String> {
    let normalized = code.trim().to_ascii_uppercase();
    if normalized.len() != CODE_LEN || !normalized.bytes().all(|c| CODE_ALPHABET.contains(&c)) {
        return None;
    }
    Some(normalized)
}

#[must_use]
pub fn generate_reset_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LEN)
        .map(|_| char::from(CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())]))
        .collect()
}

fn hash_reset_code(email: &str, code: &str) -> String {
    session::hash_secret(email, code)
}

fn check_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::WeakPassword);
    }
    Ok(())
}

fn name_from_email(email: &str) -> String {
    email.split('@').next().filter(|v| !v.is_empty()).unwrap_or("user").to_owned()
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

// =============================================================================
// REGISTRATION & LOGIN
// =============================================================================

/// Create an account. Patient accounts also create (or link) the patient
/// record for their phone.
///
/// # Errors
///
/// Input errors, `RegistrationKey` for an admin without the right key,
/// `EmailTaken`, or a database error.
pub async fn register(state: &AppState, request: &RegisterRequest) -> Result<Account, AuthError> {
    let email = normalize_email(&request.email).ok_or(AuthError::InvalidEmail)?;
    check_password(&request.password)?;

    if request.role == AccountRole::Admin {
        let expected = state.config.admin_registration_key.as_deref().filter(|k| !k.is_empty());
        let given = request.secret.as_deref().map(str::trim);
        if expected.is_none() || expected != given {
            warn!(%email, "admin registration rejected");
            return Err(AuthError::RegistrationKey);
        }
    }

    let phone = request.phone.as_deref().map(str::trim).filter(|p| !p.is_empty());
    let age = request.age.as_deref().map(str::trim).filter(|a| !a.is_empty());
    let name = match request.name.trim() {
        "" => name_from_email(&email),
        n => n.to_owned(),
    };
    if request.role == AccountRole::Patient && (request.name.trim().is_empty() || phone.is_none() || age.is_none()) {
        return Err(AuthError::Invalid("name, phone and age are required"));
    }

    let salt = session::generate_salt();
    let hash = session::hash_secret(&salt, &request.password);

    let mut tx = state.pool.begin().await?;
    let inserted = sqlx::query(&format!(
        "INSERT INTO accounts (email, name, password_hash, password_salt, role, phone, age)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING {ACCOUNT_COLUMNS}"
    ))
    .bind(&email)
    .bind(&name)
    .bind(&hash)
    .bind(&salt)
    .bind(request.role.as_str())
    .bind(phone)
    .bind(age)
    .fetch_one(tx.as_mut())
    .await;
    let row = match inserted {
        Ok(row) => row,
        Err(err) if is_unique_violation(&err) => return Err(AuthError::EmailTaken),
        Err(err) => return Err(err.into()),
    };
    let account = account_from_row(&row)?;

    if let (AccountRole::Patient, Some(phone), Some(age)) = (account.role, phone, age) {
        patient::upsert_for_account(tx.as_mut(), &name, phone, age, &email).await?;
    }
    tx.commit().await?;

    info!(id = %account.id, %email, role = account.role.as_str(), "account registered");
    Ok(account)
}

async fn check_credentials(pool: &PgPool, email: &str, password: &str) -> Result<Account, AuthError> {
    let email = normalize_email(email).ok_or(AuthError::InvalidCredentials)?;
    let row = sqlx::query(&format!(
        "SELECT {ACCOUNT_COLUMNS}, password_hash, password_salt FROM accounts WHERE email = $1"
    ))
    .bind(&email)
    .fetch_optional(pool)
    .await?
    .ok_or(AuthError::InvalidCredentials)?;

    let hash: String = row.try_get("password_hash")?;
    let salt: String = row.try_get("password_salt")?;
    if !session::verify_secret(&salt, password, &hash) {
        return Err(AuthError::InvalidCredentials);
    }
    Ok(account_from_row(&row)?)
}

/// Doctor sign-in. The credentials must be valid and the email must be the
/// configured doctor email.
///
/// # Errors
///
/// `InvalidCredentials` for a wrong password, `AccessDenied` for any other
/// account.
pub async fn login_doctor(state: &AppState, email: &str, password: &str) -> Result<Principal, AuthError> {
    let account = check_credentials(&state.pool, email, password).await?;
    if state.config.doctor_email.as_deref() != Some(account.email.as_str()) {
        warn!(email = %account.email, "non-doctor account tried the doctor login");
        return Err(AuthError::AccessDenied);
    }
    Ok(Principal { role: Role::Doctor, subject: account.id.to_string(), name: account.name })
}

/// Patient sign-in. The session subject is the patient's phone, which
/// scopes their chat access.
///
/// # Errors
///
/// `InvalidCredentials` for a wrong password, `AccessDenied` for
/// non-patient accounts.
pub async fn login_patient(state: &AppState, email: &str, password: &str) -> Result<Principal, AuthError> {
    let account = check_credentials(&state.pool, email, password).await?;
    if account.role != AccountRole::Patient {
        return Err(AuthError::AccessDenied);
    }
    let subject = account.phone.unwrap_or(account.email);
    Ok(Principal { role: Role::Patient, subject, name: account.name })
}

// =============================================================================
// PASSWORD RESET
// =============================================================================

/// Issue a reset code and email it. Unknown emails succeed silently so the
/// endpoint cannot be used to probe for accounts.
///
/// # Errors
///
/// `MailUnavailable` when email delivery is not configured, delivery or
/// database errors otherwise.
pub async fn request_reset(state: &AppState, email: &str) -> Result<(), AuthError> {
    let mailer = state.mailer.as_ref().ok_or(AuthError::MailUnavailable)?;
    let email = normalize_email(email).ok_or(AuthError::InvalidEmail)?;

    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM accounts WHERE email = $1)")
        .bind(&email)
        .fetch_one(&state.pool)
        .await?;
    if !exists {
        info!(%email, "password reset requested for unknown email");
        return Ok(());
    }

    sqlx::query("DELETE FROM password_reset_codes WHERE email = $1 AND consumed_at IS NULL")
        .bind(&email)
        .execute(&state.pool)
        .await?;
    let code = generate_reset_code();
    sqlx::query("INSERT INTO password_reset_codes (email, code_hash) VALUES ($1, $2)")
        .bind(&email)
        .bind(hash_reset_code(&email, &code))
        .execute(&state.pool)
        .await?;

    let html = mail::render_password_reset(&state.config.clinic.name, &email, &code);
    let subject = format!("{} password reset code", state.config.clinic.name);
    mailer.send_html(&email, &subject, &html).await?;
    info!(%email, "password reset code sent");
    Ok(())
}

/// Consume a reset code and set a new password. Existing sessions for the
/// account are revoked. The code is only spent if the password change
/// commits with it.
///
/// # Errors
///
/// Input errors, `VerificationFailed` for a wrong, expired or burnt code.
pub async fn confirm_reset(state: &AppState, email: &str, code: &str, new_password: &str) -> Result<(), AuthError> {
    let email = normalize_email(email).ok_or(AuthError::InvalidEmail)?;
    let code = normalize_code(code).ok_or(AuthError::InvalidCode)?;
    check_password(new_password)?;

    let mut tx = state.pool.begin().await?;
    let consumed: Option<Uuid> = sqlx::query_scalar(
        "UPDATE password_reset_codes
         SET consumed_at = now()
         WHERE id = (
             SELECT id FROM password_reset_codes
             WHERE email = $1 AND consumed_at IS NULL AND expires_at > now()
             ORDER BY created_at DESC
             LIMIT 1
         )
         AND code_hash = $2
         RETURNING id",
    )
    .bind(&email)
    .bind(hash_reset_code(&email, &code))
    .fetch_optional(tx.as_mut())
    .await?;

    if consumed.is_none() {
        sqlx::query(
            "UPDATE password_reset_codes
             SET attempts = attempts + 1,
                 consumed_at = CASE WHEN attempts + 1 >= $2 THEN now() ELSE consumed_at END
             WHERE id = (
                 SELECT id FROM password_reset_codes
                 WHERE email = $1 AND consumed_at IS NULL AND expires_at > now()
                 ORDER BY created_at DESC
                 LIMIT 1
             )",
        )
        .bind(&email)
        .bind(MAX_FAILED_ATTEMPTS)
        .execute(tx.as_mut())
        .await?;
        tx.commit().await?;
        return Err(AuthError::VerificationFailed);
    }

    let salt = session::generate_salt();
    let hash = session::hash_secret(&salt, new_password);
    let row = sqlx::query_as::<_, (Uuid, Option<String>)>(
        "UPDATE accounts SET password_hash = $2, password_salt = $3 WHERE email = $1 RETURNING id, phone",
    )
    .bind(&email)
    .bind(&hash)
    .bind(&salt)
    .fetch_optional(tx.as_mut())
    .await?;
    // Dropping the transaction rolls the consumed code back.
    let Some((id, phone)) = row else {
        return Err(AuthError::VerificationFailed);
    };

    session::delete_sessions_for(tx.as_mut(), Role::Doctor, &id.to_string()).await?;
    if let Some(phone) = phone {
        session::delete_sessions_for(tx.as_mut(), Role::Patient, &phone).await?;
    }
    tx.commit().await?;
    info!(%email, "password reset completed");
    Ok(())
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;

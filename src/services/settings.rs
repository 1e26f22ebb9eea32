//! Clinic-wide settings stored as JSON documents in the `settings` table.
//!
//! The only setting today is the doctor's profile image, kept inline as a
//! `data:image/...;base64,` URL so the public pages can render it directly.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use sqlx::types::Json;
use tracing::info;

use crate::frame::ErrorCode;

const DOCTOR_PROFILE_KEY: &str = "doctor_profile";

/// Largest accepted image, measured on the decoded bytes.
pub const MAX_DOCTOR_IMAGE_BYTES: usize = 800 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("{0}")]
    Invalid(&'static str),
    #[error("image is {0} bytes; the limit is 800 KiB")]
    TooLarge(usize),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for SettingsError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Invalid(_) => "E_INVALID_INPUT",
            Self::TooLarge(_) => "E_TOO_LARGE",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorProfile {
    pub image: Option<String>,
}

/// Decoded size of a base64 image data URL.
///
/// # Errors
///
/// `Invalid` unless the value looks like `data:image/<type>;base64,<payload>`.
pub fn image_size(data_url: &str) -> Result<usize, SettingsError> {
    let rest = data_url
        .strip_prefix("data:image/")
        .ok_or(SettingsError::Invalid("expected a data:image/ URL"))?;
    let (_, payload) = rest
        .split_once(";base64,")
        .ok_or(SettingsError::Invalid("image must be base64 encoded"))?;
    let payload = payload.trim_end();
    if payload.is_empty()
        || payload.len() % 4 != 0
        || !payload.bytes().all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'='))
    {
        return Err(SettingsError::Invalid("malformed base64 payload"));
    }
    let padding = payload.bytes().rev().take_while(|b| *b == b'=').count();
    Ok(payload.len() / 4 * 3 - padding.min(2))
}

/// # Errors
///
/// Returns a database error if the query fails.
pub async fn doctor_profile(pool: &PgPool) -> Result<DoctorProfile, SettingsError> {
    let value: Option<Json<DoctorProfile>> = sqlx::query_scalar("SELECT value FROM settings WHERE key = $1")
        .bind(DOCTOR_PROFILE_KEY)
        .fetch_optional(pool)
        .await?;
    Ok(value.map(|Json(profile)| profile).unwrap_or_default())
}

/// Replace the doctor's profile image.
///
/// # Errors
///
/// `Invalid` for anything but a base64 image data URL, `TooLarge` above
/// [`MAX_DOCTOR_IMAGE_BYTES`].
pub async fn set_doctor_image(pool: &PgPool, data_url: &str) -> Result<DoctorProfile, SettingsError> {
    let data_url = data_url.trim();
    let size = image_size(data_url)?;
    if size > MAX_DOCTOR_IMAGE_BYTES {
        return Err(SettingsError::TooLarge(size));
    }
    let profile = DoctorProfile { image: Some(data_url.to_owned()) };
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES ($1, $2)
         ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
    )
    .bind(DOCTOR_PROFILE_KEY)
    .bind(Json(&profile))
    .execute(pool)
    .await?;
    info!(size, "doctor image updated");
    Ok(profile)
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod tests;

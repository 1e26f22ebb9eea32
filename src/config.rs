//! Server configuration parsed from environment variables.
//!
//! Required:
//! - `DATABASE_URL`
//!
//! Optional:
//! - `PORT`: default 3000
//! - `DB_MAX_CONNECTIONS`: default 5
//! - `CLINIC_UTC_OFFSET`: clinic wall-clock offset, default `+05:30`
//! - `CLINIC_NAME` / `CLINIC_ADDRESS`: invoice and report headers
//! - `DOCTOR_EMAIL`: the only account allowed to sign in as doctor
//! - `ADMIN_REGISTRATION_KEY`: secret required to register an admin account
//! - `SESSION_TTL_HOURS`: default 72
//! - `COOKIE_SECURE`: mark session cookies `Secure`, default false
//! - `LOW_STOCK_THRESHOLD`: default 10
//! - `STATIC_DIR`: directory served for non-API paths
//! - `RESEND_API_KEY` / `RESEND_FROM`: password-reset email delivery

use time::UtcOffset;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_UTC_OFFSET: &str = "+05:30";
pub const DEFAULT_CLINIC_NAME: &str = "Dighayu Medical Center";
pub const DEFAULT_CLINIC_ADDRESS: &str = "Embilipitiya Road, Padhalangala. | Tel: 074 387 7234";
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 72;
pub const DEFAULT_LOW_STOCK_THRESHOLD: i32 = 10;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

/// Clinic identity printed on invoices and reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClinicInfo {
    pub name: String,
    pub address: String,
}

impl Default for ClinicInfo {
    fn default() -> Self {
        Self { name: DEFAULT_CLINIC_NAME.to_owned(), address: DEFAULT_CLINIC_ADDRESS.to_owned() }
    }
}

/// Resend credentials. Absent when password-reset email is disabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailConfig {
    pub api_key: String,
    pub from: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub db_max_connections: u32,
    pub utc_offset: UtcOffset,
    pub clinic: ClinicInfo,
    pub doctor_email: Option<String>,
    pub admin_registration_key: Option<String>,
    pub session_ttl_hours: i64,
    pub cookie_secure: bool,
    pub low_stock_threshold: i32,
    pub static_dir: Option<String>,
    pub mail: Option<MailConfig>,
}

impl Config {
    /// Build typed config from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `DATABASE_URL` is missing or a value fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let port = match std::env::var("PORT") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| ConfigError::Invalid { var: "PORT", value: raw })?,
            Err(_) => DEFAULT_PORT,
        };

        let offset_raw = std::env::var("CLINIC_UTC_OFFSET").unwrap_or_else(|_| DEFAULT_UTC_OFFSET.to_owned());
        let utc_offset =
            parse_utc_offset(&offset_raw).ok_or(ConfigError::Invalid { var: "CLINIC_UTC_OFFSET", value: offset_raw })?;

        let mail = match (non_empty_var("RESEND_API_KEY"), non_empty_var("RESEND_FROM")) {
            (Some(api_key), Some(from)) => Some(MailConfig { api_key, from }),
            _ => None,
        };

        Ok(Self {
            database_url,
            port,
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS),
            utc_offset,
            clinic: ClinicInfo {
                name: non_empty_var("CLINIC_NAME").unwrap_or_else(|| DEFAULT_CLINIC_NAME.to_owned()),
                address: non_empty_var("CLINIC_ADDRESS").unwrap_or_else(|| DEFAULT_CLINIC_ADDRESS.to_owned()),
            },
            doctor_email: non_empty_var("DOCTOR_EMAIL").map(|e| e.trim().to_ascii_lowercase()),
            admin_registration_key: non_empty_var("ADMIN_REGISTRATION_KEY"),
            session_ttl_hours: env_parse("SESSION_TTL_HOURS", DEFAULT_SESSION_TTL_HOURS),
            cookie_secure: env_bool("COOKIE_SECURE").unwrap_or(false),
            low_stock_threshold: env_parse("LOW_STOCK_THRESHOLD", DEFAULT_LOW_STOCK_THRESHOLD),
            static_dir: non_empty_var("STATIC_DIR"),
            mail,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            port: DEFAULT_PORT,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            utc_offset: parse_utc_offset(DEFAULT_UTC_OFFSET).unwrap_or(UtcOffset::UTC),
            clinic: ClinicInfo::default(),
            doctor_email: None,
            admin_registration_key: None,
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
            cookie_secure: false,
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
            static_dir: None,
            mail: None,
        }
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .and_then(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse `+HH:MM` / `-HH:MM` / `Z` into an offset.
#[must_use]
pub fn parse_utc_offset(raw: &str) -> Option<UtcOffset> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return Some(UtcOffset::UTC);
    }
    let (sign, rest) = match raw.as_bytes().first()? {
        b'+' => (1, &raw[1..]),
        b'-' => (-1, &raw[1..]),
        _ => (1, raw),
    };
    let (hours, minutes) = rest.split_once(':').unwrap_or((rest, "0"));
    let hours: i8 = hours.parse().ok()?;
    let minutes: i8 = minutes.parse().ok()?;
    if !(0..=23).contains(&hours) || !(0..=59).contains(&minutes) {
        return None;
    }
    UtcOffset::from_hms(sign * hours, sign * minutes, 0).ok()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

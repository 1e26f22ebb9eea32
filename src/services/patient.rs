//! Patient service: registration, phone lookup and medical records.
//!
//! DESIGN
//! ======
//! Patients are keyed by phone. Saving a record is one transaction: the
//! record row, the visit counter, the pending prescription order, and the
//! completion of today's pending appointment for the same phone.

use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Row};
use time::{Date, OffsetDateTime};
use tracing::info;
use uuid::Uuid;

use crate::frame::{Data, ErrorCode};
use crate::services::appointment::{self, AppointmentError};
use crate::services::consultation::{self, ConsultationError, PrescriptionInput};
use crate::services::dosage::format_amount;
use crate::services::hub::{self, Topic};
use crate::services::inventory;
use crate::services::orders::{self, NewPendingOrder, OrderItem, OrderKind};
use crate::state::AppState;

/// Suggestions start after this many typed digits.
const SUGGEST_MIN_PREFIX: usize = 3;
const SUGGEST_LIMIT: i64 = 5;

#[derive(Debug, thiserror::Error)]
pub enum PatientError {
    #[error("{0}")]
    Invalid(&'static str),
    #[error("a patient with phone {0} already exists")]
    DuplicatePhone(String),
    #[error("patient not found: {0}")]
    NotFound(Uuid),
    #[error(transparent)]
    Prescription(#[from] ConsultationError),
    #[error(transparent)]
    Appointment(#[from] AppointmentError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for PatientError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Invalid(_) => "E_INVALID_INPUT",
            Self::DuplicatePhone(_) => "E_DUPLICATE",
            Self::NotFound(_) => "E_NOT_FOUND",
            Self::Prescription(e) => e.error_code(),
            Self::Appointment(e) => e.error_code(),
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

impl From<inventory::InventoryError> for PatientError {
    fn from(err: inventory::InventoryError) -> Self {
        Self::Prescription(err.into())
    }
}

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Patient {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub age: String,
    pub email: Option<String>,
    pub visit_count: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

const PATIENT_COLUMNS: &str = "id, name, phone, age, email, visit_count, created_at";

fn patient_from_row(row: &PgRow) -> Result<Patient, sqlx::Error> {
    Ok(Patient {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        phone: row.try_get("phone")?,
        age: row.try_get("age")?,
        email: row.try_get("email")?,
        visit_count: row.try_get("visit_count")?,
        created_at: row.try_get("created_at")?,
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPatient {
    pub name: String,
    pub phone: String,
    pub age: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl NewPatient {
    /// Trimmed name, phone, age and optional lowercased email.
    ///
    /// # Errors
    ///
    /// `Invalid` when a required field is blank.
    pub fn normalized(&self) -> Result<(String, String, String, Option<String>), PatientError> {
        let name = self.name.trim();
        let phone = self.phone.trim();
        let age = self.age.trim();
        if name.is_empty() || phone.is_empty() || age.is_empty() {
            return Err(PatientError::Invalid("name, phone and age are required"));
        }
        let email = self
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_lowercase);
        Ok((name.to_owned(), phone.to_owned(), age.to_owned(), email))
    }
}

/// Result of a phone lookup on the records screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PatientLookup {
    Found { patient: Patient },
    /// Not registered yet, but booked before: prefill the form.
    Prefill { phone: String, name: String, age: String },
    Unknown { phone: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MedicalRecord {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub date: Date,
    pub diagnosis: String,
    pub prescription_text: String,
    pub items: Vec<OrderItem>,
    pub note: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

fn record_from_row(row: &PgRow) -> Result<MedicalRecord, sqlx::Error> {
    let Json(items): Json<Vec<OrderItem>> = row.try_get("items")?;
    Ok(MedicalRecord {
        id: row.try_get("id")?,
        patient_id: row.try_get("patient_id")?,
        date: row.try_get("date")?,
        diagnosis: row.try_get("diagnosis")?,
        prescription_text: row.try_get("prescription_text")?,
        items,
        note: row.try_get("note")?,
        created_at: row.try_get("created_at")?,
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordInput {
    #[serde(default)]
    pub diagnosis: String,
    #[serde(default)]
    pub items: Vec<PrescriptionInput>,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SavedRecord {
    pub record_id: Uuid,
    pub order_id: Uuid,
}

/// `Amoxicillin (15) - 1-1-0-1 for 5 days, Paracetamol (4) - ...`
#[must_use]
pub fn prescription_text(items: &[OrderItem]) -> String {
    items
        .iter()
        .map(|item| {
            let pattern = item.dosage.unwrap_or_default().pattern();
            let days = format_amount(item.days.unwrap_or(0.0));
            format!("{} ({}) - {pattern} for {days} days", item.name, item.qty)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

// =============================================================================
// REGISTRATION & LOOKUP
// =============================================================================

/// # Errors
///
/// `Invalid` for a blank field, `DuplicatePhone` if the phone is taken.
pub async fn register(pool: &PgPool, input: &NewPatient) -> Result<Patient, PatientError> {
    let (name, phone, age, email) = input.normalized()?;
    let row = sqlx::query(&format!(
        "INSERT INTO patients (name, phone, age, email) VALUES ($1, $2, $3, $4)
         ON CONFLICT (phone) DO NOTHING
         RETURNING {PATIENT_COLUMNS}"
    ))
    .bind(&name)
    .bind(&phone)
    .bind(&age)
    .bind(email.as_deref())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| PatientError::DuplicatePhone(phone.clone()))?;
    let patient = patient_from_row(&row)?;
    info!(id = %patient.id, %phone, "patient registered");
    Ok(patient)
}

/// Create or link the patient row for a self-registered patient account.
/// An existing row for the phone keeps its history and gains the email.
///
/// # Errors
///
/// Returns a database error if the upsert fails.
pub async fn upsert_for_account(
    conn: &mut PgConnection,
    name: &str,
    phone: &str,
    age: &str,
    email: &str,
) -> Result<Patient, sqlx::Error> {
    let row = sqlx::query(&format!(
        "INSERT INTO patients (name, phone, age, email) VALUES ($1, $2, $3, $4)
         ON CONFLICT (phone) DO UPDATE SET email = EXCLUDED.email
         RETURNING {PATIENT_COLUMNS}"
    ))
    .bind(name)
    .bind(phone)
    .bind(age)
    .bind(email)
    .fetch_one(conn)
    .await?;
    patient_from_row(&row)
}

/// # Errors
///
/// Returns a database error if the query fails.
pub async fn find_by_phone(pool: &PgPool, phone: &str) -> Result<Option<Patient>, PatientError> {
    let row = sqlx::query(&format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE phone = $1"))
        .bind(phone.trim())
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(patient_from_row).transpose()?)
}

/// # Errors
///
/// Returns `NotFound` if the id is unknown.
pub async fn get_patient(pool: &PgPool, id: Uuid) -> Result<Patient, PatientError> {
    let row = sqlx::query(&format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(PatientError::NotFound(id))?;
    Ok(patient_from_row(&row)?)
}

/// Up to five patients whose phone starts with `prefix`. Empty until the
/// prefix is longer than two characters.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn suggest_by_phone_prefix(pool: &PgPool, prefix: &str) -> Result<Vec<Patient>, PatientError> {
    let prefix = prefix.trim();
    if prefix.chars().count() < SUGGEST_MIN_PREFIX {
        return Ok(Vec::new());
    }
    let rows = sqlx::query(&format!(
        "SELECT {PATIENT_COLUMNS} FROM patients
         WHERE left(phone, length($1)) = $1
         ORDER BY phone ASC
         LIMIT $2"
    ))
    .bind(prefix)
    .bind(SUGGEST_LIMIT)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(patient_from_row).collect::<Result<_, _>>()?)
}

/// Registered patient, or a prefill from their latest appointment.
///
/// # Errors
///
/// Returns a database error if a query fails.
pub async fn lookup(pool: &PgPool, phone: &str) -> Result<PatientLookup, PatientError> {
    let phone = phone.trim();
    if phone.is_empty() {
        return Err(PatientError::Invalid("phone is required"));
    }
    if let Some(patient) = find_by_phone(pool, phone).await? {
        return Ok(PatientLookup::Found { patient });
    }
    let latest = appointment::find_latest_by_phone(pool, phone).await?;
    Ok(match latest {
        Some(appt) => PatientLookup::Prefill { phone: phone.to_owned(), name: appt.patient_name, age: appt.age },
        None => PatientLookup::Unknown { phone: phone.to_owned() },
    })
}

// =============================================================================
// RECORDS
// =============================================================================

/// Append a medical record and queue its prescription for the pharmacy.
///
/// # Errors
///
/// `Invalid` without a diagnosis, `NotFound` for an unknown patient,
/// prescription errors for bad lines, or a database error.
pub async fn save_record(
    state: &AppState,
    patient_id: Uuid,
    input: &RecordInput,
    today: Date,
) -> Result<SavedRecord, PatientError> {
    let diagnosis = input.diagnosis.trim();
    if diagnosis.is_empty() {
        return Err(PatientError::Invalid("diagnosis is required"));
    }

    let mut items = Vec::with_capacity(input.items.len());
    for line in &input.items {
        let medicine = inventory::get_medicine(&state.pool, line.medicine_id).await?;
        items.push(consultation::prescription_line(&medicine, line)?);
    }
    let text = prescription_text(&items);

    let mut tx = state.pool.begin().await?;

    let patient_row = sqlx::query(&format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = $1 FOR UPDATE"))
        .bind(patient_id)
        .fetch_optional(tx.as_mut())
        .await?
        .ok_or(PatientError::NotFound(patient_id))?;
    let patient = patient_from_row(&patient_row)?;

    let record_id: Uuid = sqlx::query_scalar(
        "INSERT INTO medical_records (patient_id, date, diagnosis, prescription_text, items, note)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING id",
    )
    .bind(patient_id)
    .bind(today)
    .bind(diagnosis)
    .bind(&text)
    .bind(Json(&items))
    .bind(input.note.trim())
    .fetch_one(tx.as_mut())
    .await?;

    sqlx::query("UPDATE patients SET visit_count = visit_count + 1 WHERE id = $1")
        .bind(patient_id)
        .execute(tx.as_mut())
        .await?;

    let order_id = orders::insert_pending(
        tx.as_mut(),
        &NewPendingOrder {
            patient_name: &patient.name,
            phone: Some(&patient.phone),
            age: Some(&patient.age),
            diagnosis,
            items: &items,
            doctor_charge_cents: 0,
            kind: OrderKind::Prescription,
            appointment_id: None,
            note: input.note.trim(),
        },
    )
    .await?;

    let seen = sqlx::query(
        "UPDATE appointments SET status = 'completed'
         WHERE phone = $1 AND date = $2 AND status = 'pending'",
    )
    .bind(&patient.phone)
    .bind(today)
    .execute(tx.as_mut())
    .await?
    .rows_affected();

    tx.commit().await?;

    info!(%patient_id, %record_id, %order_id, "medical record saved");
    hub::notify(state, &Topic::Orders, "orders:changed", Data::new()).await;
    if seen > 0 {
        hub::notify(state, &Topic::Appointments(today), "appointments:changed", Data::new()).await;
    }
    Ok(SavedRecord { record_id, order_id })
}

/// Records for a patient, newest first.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn history(pool: &PgPool, patient_id: Uuid) -> Result<Vec<MedicalRecord>, PatientError> {
    let rows = sqlx::query(
        "SELECT id, patient_id, date, diagnosis, prescription_text, items, note, created_at
         FROM medical_records WHERE patient_id = $1
         ORDER BY created_at DESC",
    )
    .bind(patient_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(record_from_row).collect::<Result<_, _>>()?)
}

#[cfg(test)]
#[path = "patient_test.rs"]
mod tests;

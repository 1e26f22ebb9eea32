//! Consultation service: the doctor's prescription hand-off to the pharmacy.
//!
//! The order insert and the appointment status change share one transaction,
//! so a booked patient never shows as seen without a pending order (or the
//! other way round).

use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::frame::{Data, ErrorCode};
use crate::money::DEFAULT_DOCTOR_CHARGE_CENTS;
use crate::services::appointment::{self, AppointmentError};
use crate::services::dosage::{self, Dosage};
use crate::services::hub::{self, Topic};
use crate::services::inventory::{self, InventoryError, Medicine};
use crate::services::orders::{self, NewPendingOrder, OrderItem, OrderKind};
use crate::state::AppState;

#[derive(Debug, thiserror::Error)]
pub enum ConsultationError {
    #[error("{0}")]
    Invalid(&'static str),
    #[error("appointment not found: {0}")]
    AppointmentNotFound(Uuid),
    #[error(transparent)]
    Inventory(#[from] InventoryError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for ConsultationError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Invalid(_) => "E_INVALID_INPUT",
            Self::AppointmentNotFound(_) => "E_NOT_FOUND",
            Self::Inventory(e) => e.error_code(),
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Inventory(e) => e.retryable(),
            _ => matches!(self, Self::Database(_)),
        }
    }
}

impl From<AppointmentError> for ConsultationError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound(id) => Self::AppointmentNotFound(id),
            AppointmentError::Database(db) => Self::Database(db),
            _ => Self::Invalid("appointment could not be updated"),
        }
    }
}

/// One prescribed medicine as entered on the console.
#[derive(Debug, Clone, Deserialize)]
pub struct PrescriptionInput {
    pub medicine_id: Uuid,
    #[serde(default)]
    pub dosage: Dosage,
    pub dose_amount: f64,
    pub days: f64,
}

/// Turn a console line into an order item, computing the quantity.
///
/// # Errors
///
/// `Invalid` when days or dose amount are missing, or no time of day is
/// selected.
pub fn prescription_line(medicine: &Medicine, input: &PrescriptionInput) -> Result<OrderItem, ConsultationError> {
    if !(input.days > 0.0 && input.dose_amount > 0.0) {
        return Err(ConsultationError::Invalid("days and dose amount are required"));
    }
    let qty = dosage::compute_quantity(&input.dosage, input.dose_amount, input.days)
        .ok_or(ConsultationError::Invalid("select at least one time of day"))?;
    Ok(OrderItem {
        medicine_id: medicine.id,
        name: medicine.name.clone(),
        price_cents: medicine.price_cents,
        qty,
        dosage: Some(input.dosage),
        days: Some(input.days),
        dose_amount: Some(input.dose_amount),
    })
}

/// A finished consultation. `appointment_id` is `None` for emergency and
/// walk-in patients, who must then carry a name.
#[derive(Debug, Clone, Deserialize)]
pub struct Consultation {
    #[serde(default)]
    pub appointment_id: Option<Uuid>,
    #[serde(default)]
    pub patient_name: String,
    #[serde(default)]
    pub age: Option<String>,
    #[serde(default)]
    pub diagnosis: String,
    #[serde(default)]
    pub items: Vec<PrescriptionInput>,
    #[serde(default)]
    pub doctor_charge_cents: Option<i64>,
    #[serde(default)]
    pub note: String,
}

/// Create the pending pharmacy order for a consultation. Returns its id.
///
/// # Errors
///
/// `Invalid` for a nameless walk-in or a bad prescription line,
/// `AppointmentNotFound` for an unknown appointment, or a database error.
pub async fn send_to_pharmacy(state: &AppState, consultation: &Consultation) -> Result<Uuid, ConsultationError> {
    if consultation.appointment_id.is_none() && consultation.patient_name.trim().is_empty() {
        return Err(ConsultationError::Invalid("patient name is required for walk-in patients"));
    }
    let doctor_charge_cents = consultation.doctor_charge_cents.unwrap_or(DEFAULT_DOCTOR_CHARGE_CENTS);
    if doctor_charge_cents < 0 {
        return Err(ConsultationError::Invalid("doctor charge must not be negative"));
    }

    let mut items = Vec::with_capacity(consultation.items.len());
    for input in &consultation.items {
        let medicine = inventory::get_medicine(&state.pool, input.medicine_id).await?;
        items.push(prescription_line(&medicine, input)?);
    }

    let mut tx = state.pool.begin().await?;

    let (patient_name, phone, age, kind) = match consultation.appointment_id {
        Some(id) => {
            let row = sqlx::query_as::<_, (String, String, String)>(
                "SELECT patient_name, phone, age FROM appointments WHERE id = $1 FOR UPDATE",
            )
            .bind(id)
            .fetch_optional(tx.as_mut())
            .await?
            .ok_or(ConsultationError::AppointmentNotFound(id))?;
            (row.0, Some(row.1), Some(row.2), OrderKind::Appointment)
        }
        None => (
            consultation.patient_name.trim().to_owned(),
            None,
            consultation.age.clone(),
            OrderKind::Emergency,
        ),
    };

    let order_id = orders::insert_pending(
        tx.as_mut(),
        &NewPendingOrder {
            patient_name: &patient_name,
            phone: phone.as_deref(),
            age: age.as_deref(),
            diagnosis: consultation.diagnosis.trim(),
            items: &items,
            doctor_charge_cents,
            kind,
            appointment_id: consultation.appointment_id,
            note: consultation.note.trim(),
        },
    )
    .await?;

    let seen_on = match consultation.appointment_id {
        Some(id) => Some(appointment::mark_completed_in(tx.as_mut(), id).await?),
        None => None,
    };

    tx.commit().await?;

    info!(%order_id, kind = %kind, items = items.len(), "consultation sent to pharmacy");
    hub::notify(state, &Topic::Orders, "orders:changed", Data::new()).await;
    if let Some(date) = seen_on {
        hub::notify(state, &Topic::Appointments(date), "appointments:changed", Data::new()).await;
    }
    Ok(order_id)
}

#[cfg(test)]
#[path = "consultation_test.rs"]
mod tests;

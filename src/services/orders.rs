//! Pharmacy orders: the hand-off between the doctor and the pharmacy.
//!
//! A consultation or patient record creates a `pending` order. Billing loads
//! it into a cart and completes it inside the stock transaction. Walk-in
//! sales are inserted directly as completed `manual_sale` orders.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Row};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::services::dosage::Dosage;

#[derive(Debug, thiserror::Error)]
#[error("invalid order {field}: {value}")]
pub struct InvalidOrderField {
    pub field: &'static str,
    pub value: String,
}

macro_rules! string_enum {
    ($name:ident, $field:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = InvalidOrderField;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(InvalidOrderField { field: $field, value: s.to_owned() }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Completed,
}

string_enum!(OrderStatus, "status", { Pending => "pending", Completed => "completed" });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    Appointment,
    Emergency,
    Prescription,
    ManualSale,
}

string_enum!(OrderKind, "kind", {
    Appointment => "appointment",
    Emergency => "emergency",
    Prescription => "prescription",
    ManualSale => "manual_sale",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[default]
    Cash,
    Card,
    Transfer,
}

string_enum!(PaymentMethod, "payment_method", { Cash => "Cash", Card => "Card", Transfer => "Transfer" });

/// One prescribed or billed medicine, as stored in `pharmacy_orders.items`.
///
/// Dosage fields are optional because manually built orders may omit them;
/// billing fills defaults when loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub medicine_id: Uuid,
    pub name: String,
    pub price_cents: i64,
    pub qty: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dosage: Option<Dosage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dose_amount: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PharmacyOrder {
    pub id: Uuid,
    pub patient_name: String,
    pub phone: Option<String>,
    pub age: Option<String>,
    pub diagnosis: String,
    pub items: Vec<OrderItem>,
    pub doctor_charge_cents: i64,
    pub total_cents: i64,
    pub status: OrderStatus,
    pub kind: OrderKind,
    pub payment_method: Option<PaymentMethod>,
    pub reference_number: Option<String>,
    pub appointment_id: Option<Uuid>,
    pub note: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
}

pub(crate) const ORDER_COLUMNS: &str = "id, patient_name, phone, age, diagnosis, items, doctor_charge_cents, \
     total_cents, status, kind, payment_method, reference_number, appointment_id, note, created_at, completed_at";

fn decode_err(err: InvalidOrderField) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(err))
}

pub(crate) fn order_from_row(row: &PgRow) -> Result<PharmacyOrder, sqlx::Error> {
    let Json(items): Json<Vec<OrderItem>> = row.try_get("items")?;
    let status: String = row.try_get("status")?;
    let kind: String = row.try_get("kind")?;
    let payment_method: Option<String> = row.try_get("payment_method")?;
    Ok(PharmacyOrder {
        id: row.try_get("id")?,
        patient_name: row.try_get("patient_name")?,
        phone: row.try_get("phone")?,
        age: row.try_get("age")?,
        diagnosis: row.try_get("diagnosis")?,
        items,
        doctor_charge_cents: row.try_get("doctor_charge_cents")?,
        total_cents: row.try_get("total_cents")?,
        status: status.parse().map_err(decode_err)?,
        kind: kind.parse().map_err(decode_err)?,
        payment_method: payment_method
            .filter(|m| !m.is_empty())
            .map(|m| m.parse().map_err(decode_err))
            .transpose()?,
        reference_number: row.try_get("reference_number")?,
        appointment_id: row.try_get("appointment_id")?,
        note: row.try_get("note")?,
        created_at: row.try_get("created_at")?,
        completed_at: row.try_get("completed_at")?,
    })
}

/// Fields for a new pending order created by the doctor side.
#[derive(Debug, Clone)]
pub struct NewPendingOrder<'a> {
    pub patient_name: &'a str,
    pub phone: Option<&'a str>,
    pub age: Option<&'a str>,
    pub diagnosis: &'a str,
    pub items: &'a [OrderItem],
    pub doctor_charge_cents: i64,
    pub kind: OrderKind,
    pub appointment_id: Option<Uuid>,
    pub note: &'a str,
}

/// Insert a pending order on an open connection or transaction.
///
/// # Errors
///
/// Returns a database error if the insert fails.
pub async fn insert_pending(conn: &mut PgConnection, order: &NewPendingOrder<'_>) -> Result<Uuid, sqlx::Error> {
    sqlx::query_scalar(
        "INSERT INTO pharmacy_orders
             (patient_name, phone, age, diagnosis, items, doctor_charge_cents, total_cents, status, kind, appointment_id, note)
         VALUES ($1, $2, $3, $4, $5, $6, 0, 'pending', $7, $8, $9)
         RETURNING id",
    )
    .bind(order.patient_name)
    .bind(order.phone)
    .bind(order.age)
    .bind(order.diagnosis)
    .bind(Json(order.items))
    .bind(order.doctor_charge_cents)
    .bind(order.kind.as_str())
    .bind(order.appointment_id)
    .bind(order.note)
    .fetch_one(conn)
    .await
}

// =============================================================================
// READS
// =============================================================================

/// # Errors
///
/// Returns a database error if the query fails.
pub async fn get_order(pool: &PgPool, id: Uuid) -> Result<Option<PharmacyOrder>, sqlx::Error> {
    let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM pharmacy_orders WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(order_from_row).transpose()
}

/// Orders waiting for billing, newest first.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn pending_orders(pool: &PgPool) -> Result<Vec<PharmacyOrder>, sqlx::Error> {
    list_by_status(pool, Some(OrderStatus::Pending)).await
}

/// Every order, newest first (sales board).
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_orders(pool: &PgPool) -> Result<Vec<PharmacyOrder>, sqlx::Error> {
    list_by_status(pool, None).await
}

/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_by_status(pool: &PgPool, status: Option<OrderStatus>) -> Result<Vec<PharmacyOrder>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        "SELECT {ORDER_COLUMNS} FROM pharmacy_orders
         WHERE ($1::text IS NULL OR status = $1)
         ORDER BY created_at DESC"
    ))
    .bind(status.map(OrderStatus::as_str))
    .fetch_all(pool)
    .await?;
    rows.iter().map(order_from_row).collect()
}

/// Completed orders finished at or after `since` (all time when `None`),
/// newest first.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn completed_since(pool: &PgPool, since: Option<OffsetDateTime>) -> Result<Vec<PharmacyOrder>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        "SELECT {ORDER_COLUMNS} FROM pharmacy_orders
         WHERE status = 'completed'
           AND ($1::timestamptz IS NULL OR COALESCE(completed_at, created_at) >= $1)
         ORDER BY COALESCE(completed_at, created_at) DESC"
    ))
    .bind(since)
    .fetch_all(pool)
    .await?;
    rows.iter().map(order_from_row).collect()
}

#[cfg(test)]
#[path = "orders_test.rs"]
mod tests;

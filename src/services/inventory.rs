//! Inventory service: medicine stock rows.
//!
//! Stock only decreases through the billing transaction; this module covers
//! intake (add, restock), removal and the read paths used by the pharmacy
//! screens.

use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::frame::{Data, ErrorCode};
use crate::services::hub::{self, Topic};
use crate::state::AppState;

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("medicine not found: {0}")]
    NotFound(Uuid),
    #[error("{0}")]
    Invalid(&'static str),
    #[error("restock would leave {name} with negative stock (available {available})")]
    NegativeStock { name: String, available: i32 },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for InventoryError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_NOT_FOUND",
            Self::Invalid(_) => "E_INVALID_INPUT",
            Self::NegativeStock { .. } => "E_INSUFFICIENT_STOCK",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Medicine {
    pub id: Uuid,
    pub name: String,
    pub quantity: i32,
    pub price_cents: i64,
    pub batch_no: Option<String>,
    pub expiry: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

fn medicine_from_row(row: &PgRow) -> Result<Medicine, sqlx::Error> {
    Ok(Medicine {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        quantity: row.try_get("quantity")?,
        price_cents: row.try_get("price_cents")?,
        batch_no: row.try_get("batch_no")?,
        expiry: row.try_get("expiry")?,
        created_at: row.try_get("created_at")?,
    })
}

const MEDICINE_COLUMNS: &str = "id, name, quantity, price_cents, batch_no, expiry, created_at";

#[derive(Debug, Clone, Deserialize)]
pub struct NewMedicine {
    pub name: String,
    pub quantity: Option<i32>,
    pub price_cents: Option<i64>,
    #[serde(default)]
    pub expiry: Option<String>,
    #[serde(default)]
    pub batch_no: Option<String>,
}

/// Listing order for the two pharmacy screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MedicineOrder {
    /// Billing search list.
    #[default]
    Name,
    /// Inventory table, newest intake first.
    Newest,
}

/// Validate an intake form. Returns the trimmed name, quantity and price.
///
/// # Errors
///
/// Returns `Invalid` when a required field is missing or negative.
pub fn validate_new(input: &NewMedicine) -> Result<(String, i32, i64), InventoryError> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(InventoryError::Invalid("medicine name is required"));
    }
    let quantity = input.quantity.ok_or(InventoryError::Invalid("quantity is required"))?;
    let price = input.price_cents.ok_or(InventoryError::Invalid("price is required"))?;
    if quantity < 0 {
        return Err(InventoryError::Invalid("quantity must not be negative"));
    }
    if price < 0 {
        return Err(InventoryError::Invalid("price must not be negative"));
    }
    Ok((name.to_owned(), quantity, price))
}

fn blank_to_none(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// =============================================================================
// WRITES
// =============================================================================

/// Add a medicine to stock.
///
/// # Errors
///
/// Returns `Invalid` for a bad form, or a database error.
pub async fn add_medicine(state: &AppState, input: &NewMedicine) -> Result<Medicine, InventoryError> {
    let (name, quantity, price_cents) = validate_new(input)?;
    let row = sqlx::query(&format!(
        "INSERT INTO medicines (name, quantity, price_cents, batch_no, expiry)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING {MEDICINE_COLUMNS}"
    ))
    .bind(&name)
    .bind(quantity)
    .bind(price_cents)
    .bind(blank_to_none(input.batch_no.as_deref()))
    .bind(blank_to_none(input.expiry.as_deref()))
    .fetch_one(&state.pool)
    .await?;
    let medicine = medicine_from_row(&row)?;

    info!(id = %medicine.id, %name, quantity, "medicine added");
    hub::notify(state, &Topic::Inventory, "inventory:changed", Data::new()).await;
    Ok(medicine)
}

/// Remove a medicine.
///
/// # Errors
///
/// Returns `NotFound` if the id is unknown.
pub async fn delete_medicine(state: &AppState, id: Uuid) -> Result<(), InventoryError> {
    let result = sqlx::query("DELETE FROM medicines WHERE id = $1")
        .bind(id)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(InventoryError::NotFound(id));
    }
    info!(%id, "medicine deleted");
    hub::notify(state, &Topic::Inventory, "inventory:changed", Data::new()).await;
    Ok(())
}

/// Adjust stock by `delta` (positive for intake, negative for write-off).
///
/// # Errors
///
/// Returns `NotFound` for an unknown id, `NegativeStock` if the result
/// would drop below zero.
pub async fn restock(state: &AppState, id: Uuid, delta: i32) -> Result<Medicine, InventoryError> {
    let row = sqlx::query(&format!(
        "UPDATE medicines SET quantity = quantity + $2
         WHERE id = $1 AND quantity + $2 >= 0
         RETURNING {MEDICINE_COLUMNS}"
    ))
    .bind(id)
    .bind(delta)
    .fetch_optional(&state.pool)
    .await?;

    let Some(row) = row else {
        let current = sqlx::query_as::<_, (String, i32)>("SELECT name, quantity FROM medicines WHERE id = $1")
            .bind(id)
            .fetch_optional(&state.pool)
            .await?;
        return Err(match current {
            Some((name, available)) => InventoryError::NegativeStock { name, available },
            None => InventoryError::NotFound(id),
        });
    };
    let medicine = medicine_from_row(&row)?;

    info!(%id, delta, quantity = medicine.quantity, "medicine restocked");
    hub::notify(state, &Topic::Inventory, "inventory:changed", Data::new()).await;
    Ok(medicine)
}

// =============================================================================
// READS
// =============================================================================

/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_medicines(pool: &PgPool, order: MedicineOrder) -> Result<Vec<Medicine>, InventoryError> {
    let order_by = match order {
        MedicineOrder::Name => "name ASC",
        MedicineOrder::Newest => "created_at DESC",
    };
    let rows = sqlx::query(&format!("SELECT {MEDICINE_COLUMNS} FROM medicines ORDER BY {order_by}"))
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(medicine_from_row).collect::<Result<_, _>>()?)
}

/// Case-insensitive substring match on the medicine name.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn search(pool: &PgPool, term: &str) -> Result<Vec<Medicine>, InventoryError> {
    let term = term.trim();
    if term.is_empty() {
        return list_medicines(pool, MedicineOrder::Name).await;
    }
    let rows = sqlx::query(&format!(
        "SELECT {MEDICINE_COLUMNS} FROM medicines
         WHERE position(lower($1) in lower(name)) > 0
         ORDER BY name ASC"
    ))
    .bind(term)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(medicine_from_row).collect::<Result<_, _>>()?)
}

/// # Errors
///
/// Returns `NotFound` if the id is unknown.
pub async fn get_medicine(pool: &PgPool, id: Uuid) -> Result<Medicine, InventoryError> {
    let row = sqlx::query(&format!("SELECT {MEDICINE_COLUMNS} FROM medicines WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(InventoryError::NotFound(id))?;
    Ok(medicine_from_row(&row)?)
}

/// Current stock for a set of medicines, keyed by id. Unknown ids are absent.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn stock_levels(pool: &PgPool, ids: &[Uuid]) -> Result<std::collections::HashMap<Uuid, i32>, InventoryError> {
    let rows = sqlx::query_as::<_, (Uuid, i32)>("SELECT id, quantity FROM medicines WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().collect())
}

/// Number of medicines with stock below `threshold`.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn low_stock_count(pool: &PgPool, threshold: i32) -> Result<i64, InventoryError> {
    let count: i64 = sqlx::query_scalar("SELECT count(*) FROM medicines WHERE quantity < $1")
        .bind(threshold)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

#[cfg(test)]
#[path = "inventory_test.rs"]
mod tests;

//! Billing: complete a sale and decrement stock atomically.
//!
//! DESIGN
//! ======
//! One transaction covers the whole sale. The pending order (if any) and
//! every medicine row it touches are locked `FOR UPDATE` in id order, stock
//! is checked against the locked values, decremented, and the order is
//! written as completed before commit. Lines are priced from the stored
//! order items, or from the locked inventory row for anything added at the
//! counter; prices posted with the cart are never charged. Any failure rolls
//! everything back:
//! stock is never partially decremented and a failed sale leaves no order
//! behind. Two concurrent sales of the last unit serialize on the row lock;
//! the second one sees the reduced stock and fails.

use std::collections::BTreeMap;

use serde::Serialize;
use sqlx::types::Json;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::frame::{Data, ErrorCode};
use crate::services::cart::{Cart, CartError, Payment, WALK_IN_CUSTOMER};
use crate::services::hub::{self, Topic};
use crate::services::orders::{OrderItem, OrderKind, OrderStatus, PaymentMethod};
use crate::state::AppState;

#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    #[error("bill is empty")]
    EmptyBill,
    #[error("invalid quantity for {name}: {qty}")]
    InvalidQuantity { name: String, qty: i32 },
    #[error("order not found: {0}")]
    OrderNotFound(Uuid),
    #[error("order {0} is already completed")]
    OrderNotPending(Uuid),
    #[error("medicine no longer exists: {0}")]
    MedicineMissing(Uuid),
    #[error("insufficient stock for {name} (available {available})")]
    InsufficientStock { name: String, available: i32 },
    #[error(transparent)]
    Cart(#[from] CartError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for BillingError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyBill => "E_EMPTY_BILL",
            Self::InvalidQuantity { .. } => "E_INVALID_INPUT",
            Self::OrderNotFound(_) => "E_NOT_FOUND",
            Self::OrderNotPending(_) => "E_ORDER_NOT_PENDING",
            Self::MedicineMissing(_) => "E_MEDICINE_MISSING",
            Self::InsufficientStock { .. } => "E_INSUFFICIENT_STOCK",
            Self::Cart(e) => e.error_code(),
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletedSale {
    pub order_id: Uuid,
    pub total_cents: i64,
    pub balance_cents: Option<i64>,
    pub payment_method: PaymentMethod,
}

/// Sum quantities per medicine so a medicine listed twice is checked once.
///
/// # Errors
///
/// `EmptyBill` for a bill with nothing to charge; `InvalidQuantity` for a
/// non-positive line.
pub fn aggregate_quantities(cart: &Cart) -> Result<BTreeMap<Uuid, i32>, BillingError> {
    if cart.is_empty_bill() {
        return Err(BillingError::EmptyBill);
    }
    let mut wanted: BTreeMap<Uuid, i32> = BTreeMap::new();
    for line in &cart.lines {
        if line.qty <= 0 {
            return Err(BillingError::InvalidQuantity { name: line.name.clone(), qty: line.qty });
        }
        *wanted.entry(line.medicine_id).or_default() += line.qty;
    }
    Ok(wanted)
}

/// Inventory row as seen under the sale's row lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedMedicine {
    pub name: String,
    pub quantity: i32,
    pub price_cents: i64,
}

/// Reprice `cart` from server-side data. A line keeps the price and name of
/// the matching stored order item; other lines take the inventory row's.
///
/// # Errors
///
/// `MedicineMissing` for a counter-added line with no inventory row.
pub fn price_lines(
    cart: &Cart,
    stock: &BTreeMap<Uuid, LockedMedicine>,
    stored: &[OrderItem],
) -> Result<Cart, BillingError> {
    let mut priced = cart.clone();
    for line in &mut priced.lines {
        if let Some(item) = stored.iter().find(|i| i.medicine_id == line.medicine_id) {
            line.price_cents = item.price_cents;
            line.name.clone_from(&item.name);
        } else {
            let row = stock.get(&line.medicine_id).ok_or(BillingError::MedicineMissing(line.medicine_id))?;
            line.price_cents = row.price_cents;
            line.name.clone_from(&row.name);
        }
    }
    Ok(priced)
}

/// Complete the sale described by `cart`.
///
/// With an `order_id` the pending order is completed in place and keeps its
/// kind; without one a completed `manual_sale` is recorded for a walk-in.
///
/// # Errors
///
/// See [`BillingError`]. Nothing is written when an error is returned.
pub async fn finish_transaction(
    state: &AppState,
    cart: &Cart,
    payment: &Payment,
    now: OffsetDateTime,
) -> Result<CompletedSale, BillingError> {
    let wanted = aggregate_quantities(cart)?;
    // Reject malformed carts before opening a transaction.
    cart.totals(payment)?;
    let reference = payment.stored_reference();

    let mut tx = state.pool.begin().await?;

    let mut stored: Vec<OrderItem> = Vec::new();
    if let Some(order_id) = cart.order_id {
        let row = sqlx::query_as::<_, (String, Json<Vec<OrderItem>>)>(
            "SELECT status, items FROM pharmacy_orders WHERE id = $1 FOR UPDATE",
        )
        .bind(order_id)
        .fetch_optional(tx.as_mut())
        .await?;
        match row {
            None => return Err(BillingError::OrderNotFound(order_id)),
            Some((status, _)) if status != OrderStatus::Pending.as_str() => {
                return Err(BillingError::OrderNotPending(order_id));
            }
            Some((_, Json(items))) => stored = items,
        }
    }

    let ids: Vec<Uuid> = wanted.keys().copied().collect();
    let rows = sqlx::query_as::<_, (Uuid, String, i32, i64)>(
        "SELECT id, name, quantity, price_cents FROM medicines WHERE id = ANY($1) ORDER BY id FOR UPDATE",
    )
    .bind(&ids)
    .fetch_all(tx.as_mut())
    .await?;
    let stock: BTreeMap<Uuid, LockedMedicine> = rows
        .into_iter()
        .map(|(id, name, quantity, price_cents)| (id, LockedMedicine { name, quantity, price_cents }))
        .collect();

    for (id, qty) in &wanted {
        let Some(row) = stock.get(id) else {
            return Err(BillingError::MedicineMissing(*id));
        };
        if row.quantity - qty < 0 {
            warn!(medicine = %row.name, available = row.quantity, requested = qty, "sale blocked by stock");
            return Err(BillingError::InsufficientStock { name: row.name.clone(), available: row.quantity });
        }
    }

    let priced = price_lines(cart, &stock, &stored)?;
    let totals = priced.totals(payment)?;
    let items = priced.order_items();

    for (id, qty) in &wanted {
        sqlx::query("UPDATE medicines SET quantity = quantity - $2 WHERE id = $1")
            .bind(id)
            .bind(qty)
            .execute(tx.as_mut())
            .await?;
    }

    let order_id = if let Some(order_id) = cart.order_id {
        sqlx::query(
            "UPDATE pharmacy_orders
             SET status = 'completed', items = $2, doctor_charge_cents = $3, total_cents = $4,
                 payment_method = $5, reference_number = $6, completed_at = $7
             WHERE id = $1",
        )
        .bind(order_id)
        .bind(Json(&items))
        .bind(cart.doctor_charge_cents)
        .bind(totals.total_cents)
        .bind(payment.method.as_str())
        .bind(reference)
        .bind(now)
        .execute(tx.as_mut())
        .await?;
        order_id
    } else {
        sqlx::query_scalar(
            "INSERT INTO pharmacy_orders
                 (patient_name, items, doctor_charge_cents, total_cents, status, kind,
                  payment_method, reference_number, created_at, completed_at)
             VALUES ($1, $2, $3, $4, 'completed', $5, $6, $7, $8, $8)
             RETURNING id",
        )
        .bind(WALK_IN_CUSTOMER)
        .bind(Json(&items))
        .bind(cart.doctor_charge_cents)
        .bind(totals.total_cents)
        .bind(OrderKind::ManualSale.as_str())
        .bind(payment.method.as_str())
        .bind(reference)
        .bind(now)
        .fetch_one(tx.as_mut())
        .await?
    };

    tx.commit().await?;

    info!(%order_id, total_cents = totals.total_cents, method = %payment.method, lines = wanted.len(), "sale completed");
    hub::notify(state, &Topic::Orders, "orders:changed", Data::new()).await;
    hub::notify(state, &Topic::Inventory, "inventory:changed", Data::new()).await;

    Ok(CompletedSale {
        order_id,
        total_cents: totals.total_cents,
        balance_cents: totals.balance_cents,
        payment_method: payment.method,
    })
}

#[cfg(test)]
#[path = "billing_test.rs"]
mod tests;

//! Pharmacy routes: inventory, the order queue and billing.
//!
//! Billing keeps no server-side cart. The screen posts its cart with each
//! edit to `/api/billing/quote` and gets back the updated cart and totals;
//! `/api/billing/complete` re-checks everything inside one transaction.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock;
use crate::routes::auth::StaffUser;
use crate::routes::error::ApiError;
use crate::services::billing::{self, CompletedSale};
use crate::services::cart::{Cart, CartOp, Invoice, Payment, Totals};
use crate::services::inventory::{self, InventoryError, Medicine, MedicineOrder, NewMedicine};
use crate::services::orders::{self, OrderStatus, PharmacyOrder};
use crate::state::AppState;

// =============================================================================
// MEDICINES
// =============================================================================

#[derive(Deserialize)]
pub struct MedicineQuery {
    /// Name search for the billing picker.
    pub q: Option<String>,
    #[serde(default)]
    pub order: MedicineOrder,
}

/// `GET /api/medicines?q=&order=`
pub async fn list_medicines(
    State(state): State<AppState>,
    _staff: StaffUser,
    Query(query): Query<MedicineQuery>,
) -> Result<Json<Vec<Medicine>>, ApiError> {
    let medicines = match query.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        Some(term) => inventory::search(&state.pool, term).await?,
        None => inventory::list_medicines(&state.pool, query.order).await?,
    };
    Ok(Json(medicines))
}

/// `POST /api/medicines`
pub async fn add_medicine(
    State(state): State<AppState>,
    _staff: StaffUser,
    Json(body): Json<NewMedicine>,
) -> Result<(StatusCode, Json<Medicine>), ApiError> {
    Ok((StatusCode::CREATED, Json(inventory::add_medicine(&state, &body).await?)))
}

/// `DELETE /api/medicines/{id}`
pub async fn delete_medicine(
    State(state): State<AppState>,
    _staff: StaffUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    inventory::delete_medicine(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct Restock {
    pub delta: i32,
}

/// `POST /api/medicines/{id}/restock`
pub async fn restock(
    State(state): State<AppState>,
    _staff: StaffUser,
    Path(id): Path<Uuid>,
    Json(body): Json<Restock>,
) -> Result<Json<Medicine>, ApiError> {
    Ok(Json(inventory::restock(&state, id, body.delta).await?))
}

// =============================================================================
// ORDERS
// =============================================================================

#[derive(Deserialize)]
pub struct StatusQuery {
    pub status: Option<OrderStatus>,
}

/// `GET /api/orders?status=`: newest first.
pub async fn list_orders(
    State(state): State<AppState>,
    _staff: StaffUser,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Vec<PharmacyOrder>>, ApiError> {
    Ok(Json(orders::list_by_status(&state.pool, query.status).await?))
}

/// `GET /api/orders/{id}/cart`: load a pending order into a fresh cart.
pub async fn order_cart(
    State(state): State<AppState>,
    _staff: StaffUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Cart>, ApiError> {
    let order = orders::get_order(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::new("E_NOT_FOUND", format!("order not found: {id}")))?;
    if order.status != OrderStatus::Pending {
        return Err(ApiError::new("E_ORDER_NOT_PENDING", format!("order already completed: {id}")));
    }
    Ok(Json(Cart::from_order(&order)))
}

// =============================================================================
// BILLING
// =============================================================================

#[derive(Deserialize)]
pub struct QuoteRequest {
    #[serde(default)]
    pub cart: Cart,
    pub op: Option<CartOp>,
    #[serde(default)]
    pub payment: Payment,
}

#[derive(Serialize)]
pub struct Quote {
    pub cart: Cart,
    pub totals: Totals,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// `POST /api/billing/quote`: apply one edit (if any) and price the cart.
pub async fn quote(
    State(state): State<AppState>,
    _staff: StaffUser,
    Json(body): Json<QuoteRequest>,
) -> Result<Json<Quote>, ApiError> {
    let QuoteRequest { mut cart, op, payment } = body;
    let mut warning = None;
    if let Some(op) = op {
        let medicine = match op.medicine_id() {
            Some(id) if !matches!(op, CartOp::Remove { .. }) => match inventory::get_medicine(&state.pool, id).await {
                Ok(m) => Some(m),
                Err(InventoryError::NotFound(_)) => None,
                Err(e) => return Err(e.into()),
            },
            _ => None,
        };
        warning = cart.apply(&op, medicine.as_ref())?;
    }
    let totals = cart.totals(&payment)?;
    Ok(Json(Quote { cart, totals, warning }))
}

#[derive(Deserialize)]
pub struct InvoiceRequest {
    pub cart: Cart,
}

#[derive(Serialize)]
pub struct InvoiceResponse {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub text: String,
}

/// `POST /api/billing/invoice`: printable invoice for the current cart.
pub async fn invoice(
    State(state): State<AppState>,
    _staff: StaffUser,
    Json(body): Json<InvoiceRequest>,
) -> Result<Json<InvoiceResponse>, ApiError> {
    let issued_at = clock::format_date_time(state.now());
    let invoice = Invoice::build(&body.cart, &state.config.clinic, issued_at)?;
    let text = invoice.render_text();
    Ok(Json(InvoiceResponse { invoice, text }))
}

#[derive(Deserialize)]
pub struct CompleteRequest {
    pub cart: Cart,
    #[serde(default)]
    pub payment: Payment,
}

/// `POST /api/billing/complete`: deduct stock and record the sale.
pub async fn complete(
    State(state): State<AppState>,
    _staff: StaffUser,
    Json(body): Json<CompleteRequest>,
) -> Result<Json<CompletedSale>, ApiError> {
    let sale = billing::finish_transaction(&state, &body.cart, &body.payment, state.now()).await?;
    Ok(Json(sale))
}

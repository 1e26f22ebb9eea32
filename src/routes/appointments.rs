//! Appointment queue and consultation routes.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use uuid::Uuid;

use crate::routes::auth::{DoctorUser, StaffUser};
use crate::routes::booking::{DateQuery, query_date};
use crate::routes::error::ApiError;
use crate::services::appointment::{self, QueueDay};
use crate::services::consultation::{self, Consultation};
use crate::state::AppState;

/// `GET /api/appointments?date=`: the day's queue, today by default.
pub async fn queue(
    State(state): State<AppState>,
    _staff: StaffUser,
    Query(query): Query<DateQuery>,
) -> Result<Json<QueueDay>, ApiError> {
    let date = query_date(query.date.as_deref())?.unwrap_or_else(|| state.now().date());
    Ok(Json(appointment::list_for_date(&state.pool, date).await?))
}

/// `DELETE /api/appointments/{id}`
pub async fn cancel(State(state): State<AppState>, _staff: StaffUser, Path(id): Path<Uuid>) -> Result<StatusCode, ApiError> {
    appointment::cancel(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/consultations`: queue the prescription for the pharmacy.
pub async fn consult(
    State(state): State<AppState>,
    _doctor: DoctorUser,
    Json(body): Json<Consultation>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let order_id = consultation::send_to_pharmacy(&state, &body).await?;
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "order_id": order_id }))))
}

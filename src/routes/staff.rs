//! Staff slot management (doctor only).

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;

use crate::routes::auth::DoctorUser;
use crate::routes::error::ApiError;
use crate::services::staff::{self, StaffSlot};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AssignSlot {
    pub code: String,
    pub name: String,
    pub password: String,
}

/// `GET /api/staff`: all three slots.
pub async fn list(State(state): State<AppState>, _doctor: DoctorUser) -> Result<Json<Vec<StaffSlot>>, ApiError> {
    Ok(Json(staff::list(&state.pool).await?))
}

/// `POST /api/staff`
pub async fn assign(
    State(state): State<AppState>,
    _doctor: DoctorUser,
    Json(body): Json<AssignSlot>,
) -> Result<Json<StaffSlot>, ApiError> {
    Ok(Json(staff::assign(&state, &body.code, &body.name, &body.password).await?))
}

/// `DELETE /api/staff/{code}`
pub async fn remove(State(state): State<AppState>, _doctor: DoctorUser, Path(code): Path<String>) -> Result<StatusCode, ApiError> {
    staff::remove(&state, &code).await?;
    Ok(StatusCode::NO_CONTENT)
}

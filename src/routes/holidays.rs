//! Holiday calendar routes. Listing is public; changes need staff.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;
use time::Date;
use uuid::Uuid;

use crate::routes::auth::StaffUser;
use crate::routes::error::ApiError;
use crate::services::holiday::{self, Closure, Holiday, HolidayKind};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct NewHoliday {
    pub date: Date,
    pub kind: HolidayKind,
    #[serde(default)]
    pub session: Closure,
}

/// `GET /api/holidays`
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Holiday>>, ApiError> {
    Ok(Json(holiday::list_holidays(&state.pool).await?))
}

/// `POST /api/holidays`
pub async fn create(
    State(state): State<AppState>,
    _staff: StaffUser,
    Json(body): Json<NewHoliday>,
) -> Result<(StatusCode, Json<Holiday>), ApiError> {
    let created = holiday::add_holiday(&state, body.date, body.kind, body.session).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `DELETE /api/holidays/{id}`
pub async fn delete(State(state): State<AppState>, _staff: StaffUser, Path(id): Path<Uuid>) -> Result<StatusCode, ApiError> {
    holiday::delete_holiday(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

//! Clinic settings: the doctor's profile image.

use axum::Json;
use axum::extract::State;
use serde::Deserialize;

use crate::routes::auth::DoctorUser;
use crate::routes::error::ApiError;
use crate::services::settings::{self, DoctorProfile};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct DoctorImage {
    pub image: String,
}

/// `GET /api/settings/doctor-image`: public, shown on the landing page.
pub async fn doctor_image(State(state): State<AppState>) -> Result<Json<DoctorProfile>, ApiError> {
    Ok(Json(settings::doctor_profile(&state.pool).await?))
}

/// `PUT /api/settings/doctor-image`
pub async fn put_doctor_image(
    State(state): State<AppState>,
    _doctor: DoctorUser,
    Json(body): Json<DoctorImage>,
) -> Result<Json<DoctorProfile>, ApiError> {
    Ok(Json(settings::set_doctor_image(&state.pool, &body.image).await?))
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod tests;

//! Patient directory and medical record routes (staff).

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use uuid::Uuid;

use crate::routes::auth::StaffUser;
use crate::routes::error::ApiError;
use crate::services::patient::{self, MedicalRecord, NewPatient, Patient, PatientLookup, RecordInput, SavedRecord};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct PrefixQuery {
    #[serde(default)]
    pub prefix: String,
}

#[derive(Deserialize)]
pub struct PhoneQuery {
    pub phone: String,
}

/// `GET /api/patients/suggest?prefix=`
pub async fn suggest(
    State(state): State<AppState>,
    _staff: StaffUser,
    Query(query): Query<PrefixQuery>,
) -> Result<Json<Vec<Patient>>, ApiError> {
    Ok(Json(patient::suggest_by_phone_prefix(&state.pool, &query.prefix).await?))
}

/// `GET /api/patients/lookup?phone=`
pub async fn lookup(
    State(state): State<AppState>,
    _staff: StaffUser,
    Query(query): Query<PhoneQuery>,
) -> Result<Json<PatientLookup>, ApiError> {
    Ok(Json(patient::lookup(&state.pool, &query.phone).await?))
}

/// `POST /api/patients`
pub async fn register(
    State(state): State<AppState>,
    _staff: StaffUser,
    Json(body): Json<NewPatient>,
) -> Result<(StatusCode, Json<Patient>), ApiError> {
    Ok((StatusCode::CREATED, Json(patient::register(&state.pool, &body).await?)))
}

/// `POST /api/patients/{id}/records`
pub async fn add_record(
    State(state): State<AppState>,
    _staff: StaffUser,
    Path(id): Path<Uuid>,
    Json(body): Json<RecordInput>,
) -> Result<(StatusCode, Json<SavedRecord>), ApiError> {
    let saved = patient::save_record(&state, id, &body, state.now().date()).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

/// `GET /api/patients/{id}/records`: newest first.
pub async fn records(
    State(state): State<AppState>,
    _staff: StaffUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<MedicalRecord>>, ApiError> {
    Ok(Json(patient::history(&state.pool, id).await?))
}

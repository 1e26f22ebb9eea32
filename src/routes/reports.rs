//! Reports (doctor only).

use axum::Json;
use axum::extract::{Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::IntoResponse;
use serde::Deserialize;

use crate::clock;
use crate::routes::auth::DoctorUser;
use crate::routes::error::ApiError;
use crate::services::reports::{self, Dashboard, SalesRange, SalesReport};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct RangeQuery {
    pub range: Option<String>,
}

fn parse_range(query: &RangeQuery) -> Result<SalesRange, ApiError> {
    Ok(query.range.as_deref().map(str::parse::<SalesRange>).transpose()?.unwrap_or_default())
}

fn text_download(filename: String, body: String) -> impl IntoResponse {
    (
        [
            (CONTENT_TYPE, "text/plain; charset=utf-8".to_owned()),
            (CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
        ],
        body,
    )
}

/// `GET /api/reports/dashboard`
pub async fn dashboard(State(state): State<AppState>, _doctor: DoctorUser) -> Result<Json<Dashboard>, ApiError> {
    let board = reports::dashboard(&state.pool, state.now(), state.config.low_stock_threshold).await?;
    Ok(Json(board))
}

/// `GET /api/reports/sales?range=today|week|month|all`
pub async fn sales(
    State(state): State<AppState>,
    _doctor: DoctorUser,
    Query(query): Query<RangeQuery>,
) -> Result<Json<SalesReport>, ApiError> {
    let range = parse_range(&query)?;
    Ok(Json(reports::sales_report(&state.pool, range, state.now()).await?))
}

/// `GET /api/reports/daily.txt`
pub async fn daily_text(State(state): State<AppState>, _doctor: DoctorUser) -> Result<impl IntoResponse, ApiError> {
    let now = state.now();
    let board = reports::dashboard(&state.pool, now, state.config.low_stock_threshold).await?;
    let body = reports::daily_report_text(&state.config.clinic, now.date(), &board.revenue);
    Ok(text_download(format!("daily_report_{}.txt", clock::format_date(now.date())), body))
}

/// `GET /api/reports/sales.txt?range=`
pub async fn sales_text(
    State(state): State<AppState>,
    _doctor: DoctorUser,
    Query(query): Query<RangeQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let range = parse_range(&query)?;
    let now = state.now();
    let report = reports::sales_report(&state.pool, range, now).await?;
    let body = reports::sales_report_text(&state.config.clinic, &report);
    Ok(text_download(format!("sales_report_{}_{}.txt", range.as_str(), clock::format_date(now.date())), body))
}

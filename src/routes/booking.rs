//! Public booking routes.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use serde::Deserialize;

use crate::clock;
use crate::routes::error::ApiError;
use crate::services::appointment::{self, Booking, BookingRequest};
use crate::services::holiday;
use crate::services::slots::{self, SlotBoard};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct DateQuery {
    pub date: Option<String>,
}

/// Parse an optional `?date=YYYY-MM-DD`.
///
/// # Errors
///
/// `E_INVALID_INPUT` for a present but malformed date.
pub(crate) fn query_date(raw: Option<&str>) -> Result<Option<time::Date>, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(raw) => clock::parse_date(raw)
            .map(Some)
            .ok_or_else(|| ApiError::bad_request(format!("invalid date: {raw}"))),
    }
}

/// `GET /api/booking/slots?date=`: bookable dates, any holiday notice, and
/// the visible slots with their booked flags. Defaults to the first bookable
/// date.
pub async fn slots(State(state): State<AppState>, Query(query): Query<DateQuery>) -> Result<Json<SlotBoard>, ApiError> {
    let now = state.now();
    let date = query_date(query.date.as_deref())?.unwrap_or_else(|| slots::default_date(now));
    let holiday = holiday::holiday_on(&state.pool, date).await?;
    let booked = appointment::booked_keys(&state.pool, date).await?;
    Ok(Json(slots::slot_board(date, now, holiday.as_ref(), &booked)))
}

/// `POST /api/booking`
pub async fn book(
    State(state): State<AppState>,
    Json(body): Json<BookingRequest>,
) -> Result<(StatusCode, Json<Booking>), ApiError> {
    state.booking_limiter.check_and_record(body.phone.trim())?;
    let booking = appointment::book(&state, &body, state.now()).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

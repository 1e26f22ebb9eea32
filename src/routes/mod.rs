//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! JSON API under `/api`, the live-update socket at `/api/ws`, and the
//! built front end served from `STATIC_DIR` for every other path.

pub mod appointments;
pub mod auth;
pub mod booking;
pub mod chat;
pub mod error;
pub mod holidays;
pub mod patients;
pub mod pharmacy;
pub mod reports;
pub mod settings;
pub mod staff;
pub mod ws;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

fn api_routes() -> Router<AppState> {
    Router::new()
        // auth
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/staff-login", post(auth::staff_login))
        .route("/api/auth/patient-login", post(auth::patient_login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/reset/request", post(auth::reset_request))
        .route("/api/auth/reset/confirm", post(auth::reset_confirm))
        .route("/api/auth/ws-ticket", post(auth::ws_ticket))
        .route("/api/auth/me", get(auth::me))
        // booking and queue
        .route("/api/booking/slots", get(booking::slots))
        .route("/api/booking", post(booking::book))
        .route("/api/holidays", get(holidays::list).post(holidays::create))
        .route("/api/holidays/{id}", delete(holidays::delete))
        .route("/api/appointments", get(appointments::queue))
        .route("/api/appointments/{id}", delete(appointments::cancel))
        .route("/api/consultations", post(appointments::consult))
        // patients
        .route("/api/patients", post(patients::register))
        .route("/api/patients/suggest", get(patients::suggest))
        .route("/api/patients/lookup", get(patients::lookup))
        .route("/api/patients/{id}/records", get(patients::records).post(patients::add_record))
        // pharmacy
        .route("/api/medicines", get(pharmacy::list_medicines).post(pharmacy::add_medicine))
        .route("/api/medicines/{id}", delete(pharmacy::delete_medicine))
        .route("/api/medicines/{id}/restock", post(pharmacy::restock))
        .route("/api/orders", get(pharmacy::list_orders))
        .route("/api/orders/{id}/cart", get(pharmacy::order_cart))
        .route("/api/billing/quote", post(pharmacy::quote))
        .route("/api/billing/invoice", post(pharmacy::invoice))
        .route("/api/billing/complete", post(pharmacy::complete))
        // chat
        .route("/api/chat/start", post(chat::start))
        .route("/api/chat/{phone}/messages", get(chat::messages).post(chat::patient_send))
        .route("/api/chat/{phone}/read", post(chat::patient_read))
        .route("/api/chat/{phone}/messages/{id}", delete(chat::delete_message))
        .route("/api/chats", get(chat::threads))
        .route("/api/chats/{phone}/reply", post(chat::reply))
        .route("/api/chats/{phone}/open", post(chat::open))
        // admin
        .route("/api/staff", get(staff::list).post(staff::assign))
        .route("/api/staff/{code}", delete(staff::remove))
        .route("/api/reports/dashboard", get(reports::dashboard))
        .route("/api/reports/sales", get(reports::sales))
        .route("/api/reports/daily.txt", get(reports::daily_text))
        .route("/api/reports/sales.txt", get(reports::sales_text))
        .route("/api/settings/doctor-image", get(settings::doctor_image).put(settings::put_doctor_image))
        .route("/api/ws", get(ws::handle_ws))
        .route("/healthz", get(healthz))
}

/// Full application router with CORS, compression and request tracing.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    let static_dir = state.config.static_dir.clone();

    let router = api_routes().with_state(state);
    let router = match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir).append_index_html_on_directories(true)),
        None => router,
    };
    router
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

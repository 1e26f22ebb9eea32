//! Auth routes: sign-in for the three roles, session cookies, password
//! reset, WS tickets.

use axum::extract::{FromRef, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use time::Duration;

use crate::routes::error::ApiError;
use crate::services::auth::{self as auth_svc, Account, RegisterRequest};
use crate::services::session::{self, Principal, Role};
use crate::services::staff;
use crate::state::AppState;

pub(crate) const COOKIE_NAME: &str = "session_token";

fn session_cookie(value: String, secure: bool, max_age: Duration) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(max_age)
        .build()
}

// =============================================================================
// AUTH EXTRACTOR
// =============================================================================

/// Signed-in caller, from the session cookie.
pub struct AuthUser {
    pub principal: Principal,
    pub token: String,
}

impl AuthUser {
    /// Reject callers below `role`.
    ///
    /// # Errors
    ///
    /// `E_FORBIDDEN` when the session's role is not privileged enough.
    pub fn require(&self, role: Role) -> Result<(), ApiError> {
        if self.principal.role.satisfies(role) { Ok(()) } else { Err(ApiError::forbidden()) }
    }
}

impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar.get(COOKIE_NAME).map(Cookie::value).unwrap_or_default();
        if token.is_empty() {
            return Err(ApiError::unauthorized());
        }

        let app_state = AppState::from_ref(state);
        let principal = session::validate_session(&app_state.pool, token)
            .await?
            .ok_or_else(ApiError::unauthorized)?;

        Ok(Self { principal, token: token.to_owned() })
    }
}

/// Staff or doctor.
pub struct StaffUser(pub AuthUser);

impl<S> axum::extract::FromRequestParts<S> for StaffUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        user.require(Role::Staff)?;
        Ok(Self(user))
    }
}

pub struct DoctorUser(pub AuthUser);

impl<S> axum::extract::FromRequestParts<S> for DoctorUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        user.require(Role::Doctor)?;
        Ok(Self(user))
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

async fn start_session(state: &AppState, jar: CookieJar, principal: Principal) -> Result<(CookieJar, Json<Principal>), ApiError> {
    let ttl = state.config.session_ttl_hours;
    let token = session::create_session(&state.pool, &principal, ttl, state.now()).await?;
    tracing::info!(role = principal.role.as_str(), subject = %principal.subject, "session started");
    let jar = jar.add(session_cookie(token, state.config.cookie_secure, Duration::hours(ttl)));
    Ok((jar, Json(principal)))
}

/// `POST /api/auth/register`
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Account>), ApiError> {
    let account = auth_svc::register(&state, &body).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

#[derive(Deserialize)]
pub struct EmailLogin {
    pub email: String,
    pub password: String,
}

/// `POST /api/auth/login`: doctor sign-in.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<EmailLogin>,
) -> Result<(CookieJar, Json<Principal>), ApiError> {
    let principal = auth_svc::login_doctor(&state, &body.email, &body.password).await?;
    start_session(&state, jar, principal).await
}

#[derive(Deserialize)]
pub struct StaffLogin {
    pub name: String,
    pub code: String,
}

/// `POST /api/auth/staff-login`
pub async fn staff_login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<StaffLogin>,
) -> Result<(CookieJar, Json<Principal>), ApiError> {
    let principal = staff::verify(&state.pool, &body.name, &body.code).await?;
    start_session(&state, jar, principal).await
}

/// `POST /api/auth/patient-login`
pub async fn patient_login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<EmailLogin>,
) -> Result<(CookieJar, Json<Principal>), ApiError> {
    let principal = auth_svc::login_patient(&state, &body.email, &body.password).await?;
    start_session(&state, jar, principal).await
}

/// `GET /api/auth/me`
pub async fn me(auth: AuthUser) -> Json<Principal> {
    Json(auth.principal)
}

/// `POST /api/auth/logout`: delete session, clear cookie.
pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> impl IntoResponse {
    let _ = session::delete_session(&state.pool, &auth.token).await;
    let jar = CookieJar::new().add(session_cookie(String::new(), state.config.cookie_secure, Duration::ZERO));
    (jar, StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct ResetRequest {
    pub email: String,
}

/// `POST /api/auth/reset/request`
pub async fn reset_request(
    State(state): State<AppState>,
    Json(body): Json<ResetRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    auth_svc::request_reset(&state, &body.email).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[derive(Deserialize)]
pub struct ResetConfirm {
    pub email: String,
    pub code: String,
    pub password: String,
}

/// `POST /api/auth/reset/confirm`
pub async fn reset_confirm(
    State(state): State<AppState>,
    Json(body): Json<ResetConfirm>,
) -> Result<Json<serde_json::Value>, ApiError> {
    auth_svc::confirm_reset(&state, &body.email, &body.code, &body.password).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

/// `POST /api/auth/ws-ticket`: one-time ticket for an authenticated socket.
pub async fn ws_ticket(State(state): State<AppState>, auth: AuthUser) -> Result<Json<serde_json::Value>, ApiError> {
    let ticket = session::create_ws_ticket(&state.pool, &auth.principal).await?;
    Ok(Json(serde_json::json!({ "ticket": ticket })))
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;

use super::*;
use crate::config::Config;
use crate::services::mail::{MailError, Mailer};
use crate::state::test_helpers;
use std::sync::Mutex;

#[derive(Default)]
struct CapturingMailer {
    sent: Mutex<Vec<(String, String)>>,
}

#[async_trait::async_trait]
impl Mailer for CapturingMailer {
    async fn send_html(&self, to: &str, _subject: &str, html: &str) -> Result<(), MailError> {
        self.sent.lock().expect("lock").push((to.to_owned(), html.to_owned()));
        Ok(())
    }
}

fn request(email: &str, password: &str, role: AccountRole) -> RegisterRequest {
    RegisterRequest {
        email: email.into(),
        password: password.into(),
        name: "Test User".into(),
        role,
        secret: None,
        phone: None,
        age: None,
    }
}

// =============================================================================
// normalization
// =============================================================================

#[test]
fn normalize_email_lowercases_and_validates() {
    assert_eq!(normalize_email("  Doctor@Clinic.LK "), Some("doctor@clinic.lk".into()));
    assert_eq!(normalize_email("no-at-sign"), None);
    assert_eq!(normalize_email("@clinic.lk"), None);
    assert_eq!(normalize_email("a@b@c"), None);
}

#[test]
fn normalize_code_uppercases_and_checks_alphabet() {
    assert_eq!(normalize_code(" ab23cd "), Some("AB23CD".into()));
    assert_eq!(normalize_code("AB23C"), None);
    // 0, 1, I and O are excluded to avoid misreading.
    assert_eq!(normalize_code("AB23C0"), None);
    assert_eq!(normalize_code("AB23CI"), None);
}

#[test]
fn generated_codes_normalize_to_themselves() {
    for _ in 0..20 {
        let code = generate_reset_code();
        assert_eq!(normalize_code(&code), Some(code));
    }
}

#[test]
fn error_codes() {
    assert_eq!(AuthError::AccessDenied.error_code(), "E_FORBIDDEN");
    assert_eq!(AuthError::InvalidCredentials.error_code(), "E_UNAUTHORIZED");
    assert_eq!(AuthError::MailUnavailable.error_code(), "E_MAIL_DISABLED");
    assert!(AuthError::Mail(MailError("down".into())).retryable());
}

// =============================================================================
// registration guards
// =============================================================================

#[tokio::test]
async fn register_rejects_bad_email_and_short_password() {
    let state = test_helpers::test_app_state();
    let bad_email = register(&state, &request("nope", "secret1", AccountRole::Staff)).await;
    assert!(matches!(bad_email, Err(AuthError::InvalidEmail)));
    let short = register(&state, &request("a@b.lk", "12345", AccountRole::Staff)).await;
    assert!(matches!(short, Err(AuthError::WeakPassword)));
}

#[tokio::test]
async fn admin_registration_needs_configured_key() {
    let state = test_helpers::test_app_state();
    let mut req = request("admin@clinic.lk", "secret1", AccountRole::Admin);
    req.secret = Some("anything".into());
    assert!(matches!(register(&state, &req).await, Err(AuthError::RegistrationKey)));

    let config = Config { admin_registration_key: Some("open-sesame".into()), ..Config::default() };
    let state = test_helpers::test_app_state_with_config(config);
    req.secret = Some("wrong".into());
    assert!(matches!(register(&state, &req).await, Err(AuthError::RegistrationKey)));
}

#[tokio::test]
async fn patient_registration_needs_phone_and_age() {
    let state = test_helpers::test_app_state();
    let req = request("p@clinic.lk", "secret1", AccountRole::Patient);
    assert!(matches!(register(&state, &req).await, Err(AuthError::Invalid(_))));
}

#[tokio::test]
async fn reset_requires_mailer() {
    let state = test_helpers::test_app_state();
    assert!(matches!(request_reset(&state, "a@b.lk").await, Err(AuthError::MailUnavailable)));
}

#[tokio::test]
async fn confirm_reset_validates_before_database() {
    let state = test_helpers::test_app_state();
    assert!(matches!(confirm_reset(&state, "a@b.lk", "xx", "secret1").await, Err(AuthError::InvalidCode)));
    assert!(matches!(confirm_reset(&state, "a@b.lk", "AB23CD", "123").await, Err(AuthError::WeakPassword)));
}

// =============================================================================
// live flows
// =============================================================================

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn doctor_login_requires_doctor_email() {
    let base = test_helpers::live_app_state().await;
    let doctor = format!("doc-{}@clinic.lk", Uuid::new_v4().simple());
    let other = format!("other-{}@clinic.lk", Uuid::new_v4().simple());
    let config = Config { doctor_email: Some(doctor.clone()), ..Config::default() };
    let state = AppState::new(base.pool.clone(), config, None);

    register(&state, &request(&doctor, "secret1", AccountRole::Staff)).await.expect("doctor account");
    register(&state, &request(&other, "secret1", AccountRole::Staff)).await.expect("other account");
    assert!(matches!(
        register(&state, &request(&other, "secret1", AccountRole::Staff)).await,
        Err(AuthError::EmailTaken)
    ));

    let principal = login_doctor(&state, &doctor.to_uppercase(), "secret1").await.expect("login");
    assert_eq!(principal.role, Role::Doctor);
    assert!(matches!(login_doctor(&state, &doctor, "wrong-1").await, Err(AuthError::InvalidCredentials)));
    assert!(matches!(login_doctor(&state, &other, "secret1").await, Err(AuthError::AccessDenied)));
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn reset_code_flow_burns_after_five_misses() {
    let base = test_helpers::live_app_state().await;
    let mailer = std::sync::Arc::new(CapturingMailer::default());
    let shared: std::sync::Arc<dyn Mailer> = mailer.clone();
    let state = AppState::new(base.pool.clone(), Config::default(), Some(shared));
    let email = format!("patient-{}@clinic.lk", Uuid::new_v4().simple());
    let mut req = request(&email, "secret1", AccountRole::Patient);
    req.phone = Some(test_helpers::unique_phone());
    req.age = Some("30".into());
    register(&state, &req).await.expect("register");

    request_reset(&state, &email).await.expect("request");
    let burnt = last_code(&mailer);
    assert_eq!(burnt.len(), 6);

    for _ in 0..MAX_FAILED_ATTEMPTS {
        assert!(confirm_reset(&state, &email, "ZZZZZZ", "newpass1").await.is_err());
    }
    assert!(matches!(
        confirm_reset(&state, &email, &burnt, "newpass1").await,
        Err(AuthError::VerificationFailed)
    ));

    request_reset(&state, &email).await.expect("second request");
    let fresh = last_code(&mailer);
    confirm_reset(&state, &email, &fresh, "newpass1").await.expect("confirm");
    assert!(login_patient(&state, &email, "secret1").await.is_err());
    let principal = login_patient(&state, &email, "newpass1").await.expect("login");
    assert_eq!(principal.role, Role::Patient);
    assert_eq!(Some(principal.subject), req.phone);
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn reset_code_survives_a_failed_password_change() {
    let state = test_helpers::live_app_state().await;
    // A code with no account behind it: the password update finds no row.
    let email = format!("orphan-{}@clinic.lk", Uuid::new_v4().simple());
    let code = "AB23CD";
    sqlx::query("INSERT INTO password_reset_codes (email, code_hash) VALUES ($1, $2)")
        .bind(&email)
        .bind(hash_reset_code(&email, code))
        .execute(&state.pool)
        .await
        .expect("insert code");

    assert!(matches!(
        confirm_reset(&state, &email, code, "newpass1").await,
        Err(AuthError::VerificationFailed)
    ));

    let (consumed, attempts): (Option<time::OffsetDateTime>, i32) = sqlx::query_as(
        "SELECT consumed_at, attempts FROM password_reset_codes WHERE email = $1",
    )
    .bind(&email)
    .fetch_one(&state.pool)
    .await
    .expect("code row");
    assert!(consumed.is_none());
    assert_eq!(attempts, 0);
}

#[cfg(feature = "live-db-tests")]
fn last_code(mailer: &CapturingMailer) -> String {
    let sent = mailer.sent.lock().expect("lock");
    let (_, html) = sent.last().expect("mail sent");
    html.split("color: #111;\">").nth(1).map(|rest| rest.chars().take(6).collect()).unwrap_or_default()
}

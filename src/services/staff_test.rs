use super::*;
use crate::state::test_helpers;

#[test]
fn canonical_code_accepts_only_three_slots() {
    assert_eq!(canonical_code("S0001"), Some("S0001"));
    assert_eq!(canonical_code(" s0003 "), Some("S0003"));
    assert_eq!(canonical_code("S0004"), None);
    assert_eq!(canonical_code(""), None);
}

#[test]
fn error_codes() {
    assert_eq!(StaffError::UnknownCode("S9".into()).error_code(), "E_UNKNOWN_STAFF_CODE");
    assert_eq!(StaffError::InvalidCredentials.error_code(), "E_UNAUTHORIZED");
}

#[tokio::test]
async fn assign_requires_every_field() {
    let state = test_helpers::test_app_state();
    assert!(matches!(assign(&state, "S0001", " ", "code").await, Err(StaffError::Invalid(_))));
    assert!(matches!(assign(&state, "S0001", "Nimal", "").await, Err(StaffError::Invalid(_))));
}

#[tokio::test]
async fn assign_rejects_unknown_code() {
    let state = test_helpers::test_app_state();
    let result = assign(&state, "S0009", "Nimal", "1234").await;
    assert!(matches!(result, Err(StaffError::UnknownCode(code)) if code == "S0009"));
}

#[tokio::test]
async fn verify_rejects_blank_credentials() {
    let state = test_helpers::test_app_state();
    assert!(matches!(verify(&state.pool, "", "x").await, Err(StaffError::InvalidCredentials)));
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn assign_verify_remove() {
    let state = test_helpers::live_app_state().await;
    let name = format!("Staff {}", uuid::Uuid::new_v4().simple());

    assign(&state, "S0003", &name, "pass-1").await.expect("assign");
    let principal = verify(&state.pool, &name.to_uppercase(), "pass-1").await.expect("verify");
    assert_eq!(principal.subject, "S0003");
    assert_eq!(principal.role, Role::Staff);
    assert!(verify(&state.pool, &name, "wrong").await.is_err());

    let slots = list(&state.pool).await.expect("list");
    assert_eq!(slots.len(), 3);
    assert_eq!(slots[2].assignee.as_deref(), Some(name.as_str()));

    remove(&state, "S0003").await.expect("remove");
    assert!(matches!(remove(&state, "S0003").await, Err(StaffError::NotAssigned(_))));
}

use super::*;
use crate::services::dosage::Dosage;

fn item(name: &str, qty: i32, dosage: Option<Dosage>, days: Option<f64>) -> OrderItem {
    OrderItem { medicine_id: Uuid::new_v4(), name: name.into(), price_cents: 100, qty, dosage, days, dose_amount: Some(1.0) }
}

#[test]
fn prescription_text_joins_lines() {
    let noon = Dosage { morning: true, noon: true, night: true, ..Dosage::default() };
    let text = prescription_text(&[
        item("Amoxicillin", 15, Some(noon), Some(5.0)),
        item("Paracetamol", 4, Some(Dosage::twice_daily()), Some(2.0)),
    ]);
    assert_eq!(text, "Amoxicillin (15) - 1-1-0-1 for 5 days, Paracetamol (4) - 1-0-0-1 for 2 days");
}

#[test]
fn prescription_text_handles_bare_items() {
    assert_eq!(prescription_text(&[item("Syrup", 1, None, None)]), "Syrup (1) - 0-0-0-0 for 0 days");
    assert_eq!(prescription_text(&[]), "");
}

#[test]
fn new_patient_normalizes_fields() {
    let input = NewPatient {
        name: " Nimal ".into(),
        phone: " 0771234567".into(),
        age: "40 ".into(),
        email: Some(" Nimal@Example.COM ".into()),
    };
    let (name, phone, age, email) = input.normalized().unwrap();
    assert_eq!((name.as_str(), phone.as_str(), age.as_str()), ("Nimal", "0771234567", "40"));
    assert_eq!(email.as_deref(), Some("nimal@example.com"));
}

#[test]
fn new_patient_requires_fields() {
    let input = NewPatient { name: "Nimal".into(), phone: String::new(), age: "40".into(), email: None };
    assert!(matches!(input.normalized(), Err(PatientError::Invalid(_))));
}

#[test]
fn lookup_serializes_with_status_tag() {
    let value = serde_json::to_value(PatientLookup::Unknown { phone: "077".into() }).unwrap();
    assert_eq!(value["status"], "unknown");
    let value = serde_json::to_value(PatientLookup::Prefill {
        phone: "077".into(),
        name: "Kamal".into(),
        age: "30".into(),
    })
    .unwrap();
    assert_eq!(value["status"], "prefill");
    assert_eq!(value["name"], "Kamal");
}

#[tokio::test]
async fn short_prefix_returns_no_suggestions() {
    let state = crate::state::test_helpers::test_app_state();
    let found = suggest_by_phone_prefix(&state.pool, "07").await.unwrap();
    assert!(found.is_empty());
}

#[tokio::test]
async fn record_requires_diagnosis() {
    let state = crate::state::test_helpers::test_app_state();
    let input = RecordInput { diagnosis: "  ".into(), items: Vec::new(), note: String::new() };
    let result = save_record(&state, Uuid::new_v4(), &input, state.now().date()).await;
    assert!(matches!(result, Err(PatientError::Invalid(_))));
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn register_save_record_and_history() {
    use crate::services::orders::OrderStatus;
    use crate::state::test_helpers;

    let state = test_helpers::live_app_state().await;
    let phone = test_helpers::unique_phone();
    let input = NewPatient { name: "Record Test".into(), phone: phone.clone(), age: "50".into(), email: None };
    let patient = register(&state.pool, &input).await.expect("register");
    assert!(matches!(register(&state.pool, &input).await, Err(PatientError::DuplicatePhone(_))));

    let suggestions = suggest_by_phone_prefix(&state.pool, &phone[..6]).await.expect("suggest");
    assert!(suggestions.len() <= 5);

    let record = RecordInput { diagnosis: "Flu".into(), items: Vec::new(), note: "rest".into() };
    let saved = save_record(&state, patient.id, &record, state.now().date()).await.expect("save");

    let records = history(&state.pool, patient.id).await.expect("history");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, saved.record_id);
    let reloaded = get_patient(&state.pool, patient.id).await.expect("patient");
    assert_eq!(reloaded.visit_count, 1);
    let order = orders::get_order(&state.pool, saved.order_id).await.expect("query").expect("order");
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.kind, OrderKind::Prescription);

    match lookup(&state.pool, &phone).await.expect("lookup") {
        PatientLookup::Found { patient: found } => assert_eq!(found.id, patient.id),
        other => panic!("expected found, got {other:?}"),
    }
}

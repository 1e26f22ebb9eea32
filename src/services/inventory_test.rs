use super::*;

fn form(name: &str, quantity: Option<i32>, price_cents: Option<i64>) -> NewMedicine {
    NewMedicine { name: name.into(), quantity, price_cents, expiry: None, batch_no: None }
}

#[test]
fn validate_accepts_complete_form() {
    let (name, qty, price) = validate_new(&form("  Paracetamol 500mg ", Some(100), Some(250))).unwrap();
    assert_eq!(name, "Paracetamol 500mg");
    assert_eq!(qty, 100);
    assert_eq!(price, 250);
}

#[test]
fn validate_allows_zero_stock_and_free_items() {
    assert!(validate_new(&form("Sample", Some(0), Some(0))).is_ok());
}

#[test]
fn validate_rejects_missing_fields() {
    assert!(matches!(validate_new(&form("", Some(1), Some(1))), Err(InventoryError::Invalid(_))));
    assert!(matches!(validate_new(&form("A", None, Some(1))), Err(InventoryError::Invalid(_))));
    assert!(matches!(validate_new(&form("A", Some(1), None)), Err(InventoryError::Invalid(_))));
}

#[test]
fn validate_rejects_negative_values() {
    assert!(validate_new(&form("A", Some(-1), Some(1))).is_err());
    assert!(validate_new(&form("A", Some(1), Some(-5))).is_err());
}

#[test]
fn blank_optional_fields_become_none() {
    assert_eq!(blank_to_none(Some("  ")), None);
    assert_eq!(blank_to_none(Some(" B-12")), Some("B-12"));
    assert_eq!(blank_to_none(None), None);
}

#[test]
fn order_parses_lowercase() {
    let order: MedicineOrder = serde_json::from_str("\"newest\"").unwrap();
    assert_eq!(order, MedicineOrder::Newest);
    assert_eq!(MedicineOrder::default(), MedicineOrder::Name);
}

#[test]
fn error_codes() {
    assert_eq!(InventoryError::NotFound(Uuid::nil()).error_code(), "E_NOT_FOUND");
    assert_eq!(
        InventoryError::NegativeStock { name: "A".into(), available: 1 }.error_code(),
        "E_INSUFFICIENT_STOCK"
    );
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn add_search_restock_delete() {
    use crate::state::test_helpers;

    let state = test_helpers::live_app_state().await;
    let unique = format!("Zincovit-{}", Uuid::new_v4().simple());
    let med = add_medicine(&state, &form(&unique, Some(5), Some(1200))).await.expect("add");

    let found = search(&state.pool, &unique.to_uppercase()).await.expect("search");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, med.id);

    let restocked = restock(&state, med.id, 20).await.expect("restock");
    assert_eq!(restocked.quantity, 25);
    assert!(matches!(
        restock(&state, med.id, -100).await,
        Err(InventoryError::NegativeStock { available: 25, .. })
    ));

    delete_medicine(&state, med.id).await.expect("delete");
    assert!(matches!(get_medicine(&state.pool, med.id).await, Err(InventoryError::NotFound(_))));
}

use super::*;

#[test]
fn status_round_trips_text() {
    assert_eq!("pending".parse::<OrderStatus>().unwrap(), OrderStatus::Pending);
    assert_eq!(OrderStatus::Completed.as_str(), "completed");
    assert!("cancelled".parse::<OrderStatus>().is_err());
}

#[test]
fn kind_uses_snake_case() {
    assert_eq!(OrderKind::ManualSale.as_str(), "manual_sale");
    assert_eq!("manual_sale".parse::<OrderKind>().unwrap(), OrderKind::ManualSale);
    assert_eq!(serde_json::to_string(&OrderKind::ManualSale).unwrap(), "\"manual_sale\"");
}

#[test]
fn payment_method_keeps_capitalised_names() {
    assert_eq!(serde_json::to_string(&PaymentMethod::Transfer).unwrap(), "\"Transfer\"");
    assert_eq!("Card".parse::<PaymentMethod>().unwrap(), PaymentMethod::Card);
    assert_eq!(PaymentMethod::default(), PaymentMethod::Cash);
    let err = "cash".parse::<PaymentMethod>().unwrap_err();
    assert_eq!(err.field, "payment_method");
}

#[test]
fn order_item_dosage_fields_are_optional() {
    let json = format!(
        r#"{{"medicine_id":"{}","name":"Amoxicillin","price_cents":1500,"qty":10}}"#,
        Uuid::new_v4()
    );
    let item: OrderItem = serde_json::from_str(&json).unwrap();
    assert!(item.dosage.is_none());
    assert!(item.days.is_none());
    assert_eq!(item.qty, 10);

    let back = serde_json::to_value(&item).unwrap();
    assert!(back.get("dosage").is_none());
}

use super::*;

#[test]
fn kind_parses_known_values() {
    assert_eq!("poya".parse::<HolidayKind>().unwrap(), HolidayKind::Poya);
    assert_eq!("other".parse::<HolidayKind>().unwrap(), HolidayKind::Other);
    assert!(matches!(
        "festival".parse::<HolidayKind>(),
        Err(HolidayError::Invalid { field: "kind", .. })
    ));
}

#[test]
fn closure_parses_and_defaults_to_full() {
    assert_eq!("morning".parse::<Closure>().unwrap(), Closure::Morning);
    assert_eq!("evening".parse::<Closure>().unwrap(), Closure::Evening);
    assert_eq!(Closure::default(), Closure::Full);
    assert!("afternoon".parse::<Closure>().is_err());
}

#[test]
fn closure_serde_is_lowercase() {
    let json = serde_json::to_string(&Closure::Evening).unwrap();
    assert_eq!(json, "\"evening\"");
    let parsed: HolidayKind = serde_json::from_str("\"poya\"").unwrap();
    assert_eq!(parsed, HolidayKind::Poya);
}

#[test]
fn error_codes() {
    assert_eq!(HolidayError::NotFound(Uuid::nil()).error_code(), "E_NOT_FOUND");
    assert_eq!(
        HolidayError::Invalid { field: "kind", value: "x".into() }.error_code(),
        "E_INVALID_INPUT"
    );
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn holiday_add_lookup_delete() {
    use crate::state::test_helpers;
    use time::macros::date;

    let state = test_helpers::live_app_state().await;
    let day = date!(2031 - 05 - 12);

    let holiday = add_holiday(&state, day, HolidayKind::Poya, Closure::Morning)
        .await
        .expect("add");
    let found = holiday_on(&state.pool, day).await.expect("lookup");
    assert!(found.is_some_and(|h| h.date == day));

    let all = list_holidays(&state.pool).await.expect("list");
    assert!(all.iter().any(|h| h.id == holiday.id));
    assert!(all.windows(2).all(|w| w[0].date <= w[1].date));

    delete_holiday(&state, holiday.id).await.expect("delete");
    assert!(matches!(
        delete_holiday(&state, holiday.id).await,
        Err(HolidayError::NotFound(_))
    ));
}

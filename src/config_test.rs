use super::*;

// =============================================================================
// parse_utc_offset
// =============================================================================

#[test]
fn parse_offset_positive_half_hour() {
    let offset = parse_utc_offset("+05:30").expect("offset");
    assert_eq!(offset.whole_hours(), 5);
    assert_eq!(offset.minutes_past_hour(), 30);
}

#[test]
fn parse_offset_negative() {
    let offset = parse_utc_offset("-03:00").expect("offset");
    assert_eq!(offset.whole_hours(), -3);
    assert_eq!(offset.minutes_past_hour(), 0);
}

#[test]
fn parse_offset_utc_aliases() {
    assert_eq!(parse_utc_offset("Z"), Some(UtcOffset::UTC));
    assert_eq!(parse_utc_offset("utc"), Some(UtcOffset::UTC));
    assert_eq!(parse_utc_offset("+00:00"), Some(UtcOffset::UTC));
}

#[test]
fn parse_offset_hours_only() {
    let offset = parse_utc_offset("+8").expect("offset");
    assert_eq!(offset.whole_hours(), 8);
}

#[test]
fn parse_offset_rejects_garbage() {
    assert_eq!(parse_utc_offset(""), None);
    assert_eq!(parse_utc_offset("+25:00"), None);
    assert_eq!(parse_utc_offset("+05:75"), None);
    assert_eq!(parse_utc_offset("abc"), None);
}

// =============================================================================
// defaults
// =============================================================================

#[test]
fn default_config_uses_clinic_defaults() {
    let config = Config::default();
    assert_eq!(config.port, DEFAULT_PORT);
    assert_eq!(config.low_stock_threshold, 10);
    assert_eq!(config.utc_offset.whole_hours(), 5);
    assert_eq!(config.clinic.name, DEFAULT_CLINIC_NAME);
    assert!(config.mail.is_none());
}

#[test]
fn env_parse_falls_back_on_missing_key() {
    assert_eq!(env_parse("CLINIC_TEST_SURELY_UNSET_KEY", 42_u32), 42);
}

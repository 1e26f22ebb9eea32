use super::*;

fn limiter(per_key: usize, global: usize) -> RateLimiter {
    RateLimiter::new(RateLimitConfig {
        per_key_limit: per_key,
        per_key_window: Duration::from_secs(60),
        global_limit: global,
        global_window: Duration::from_secs(60),
    })
}

#[test]
fn per_key_allows_up_to_limit() {
    let rl = limiter(3, 100);
    let now = Instant::now();

    for i in 0..3 {
        assert!(rl.check_and_record_at("0771234567", now).is_ok(), "request {i} should succeed");
    }
    assert!(matches!(
        rl.check_and_record_at("0771234567", now),
        Err(RateLimitError::PerKeyExceeded { limit: 3, window_secs: 60 })
    ));
}

#[test]
fn global_allows_up_to_limit() {
    let rl = limiter(100, 5);
    let now = Instant::now();

    for i in 0..5 {
        assert!(rl.check_and_record_at(&format!("07700000{i:02}"), now).is_ok());
    }
    assert!(matches!(
        rl.check_and_record_at("0779999999", now),
        Err(RateLimitError::GlobalExceeded { .. })
    ));
}

#[test]
fn window_expiry_allows_new_requests() {
    let rl = limiter(2, 100);
    let start = Instant::now();

    rl.check_and_record_at("a", start).unwrap();
    rl.check_and_record_at("a", start).unwrap();
    assert!(rl.check_and_record_at("a", start).is_err());

    let after_window = start + Duration::from_secs(60) + Duration::from_millis(1);
    assert!(rl.check_and_record_at("a", after_window).is_ok());
}

#[test]
fn distinct_keys_do_not_interfere() {
    let rl = limiter(1, 100);
    let now = Instant::now();

    rl.check_and_record_at("a", now).unwrap();
    assert!(rl.check_and_record_at("a", now).is_err());
    assert!(rl.check_and_record_at("b", now).is_ok());
}

#[test]
fn rejected_request_is_not_recorded() {
    let rl = limiter(1, 2);
    let now = Instant::now();

    rl.check_and_record_at("a", now).unwrap();
    for _ in 0..5 {
        assert!(rl.check_and_record_at("a", now).is_err());
    }
    // Global still has room for one more key because rejections were not counted.
    assert!(rl.check_and_record_at("b", now).is_ok());
}

#[test]
fn error_is_retryable_rate_limited() {
    let err = RateLimitError::PerKeyExceeded { limit: 1, window_secs: 60 };
    assert_eq!(err.error_code(), "E_RATE_LIMITED");
    assert!(err.retryable());
}

#[test]
fn config_from_env_uses_defaults() {
    let cfg = RateLimitConfig::from_env("CLINIC_TEST_UNSET_SCOPE");
    assert_eq!(cfg, RateLimitConfig::default());
}

use super::*;
use crate::services::orders::{OrderKind, OrderStatus};
use time::macros::{date, datetime};

fn sale(patient: &str, total_cents: i64, method: PaymentMethod, completed_at: OffsetDateTime) -> PharmacyOrder {
    PharmacyOrder {
        id: Uuid::new_v4(),
        patient_name: patient.into(),
        phone: None,
        age: None,
        diagnosis: String::new(),
        items: Vec::new(),
        doctor_charge_cents: 0,
        total_cents,
        status: OrderStatus::Completed,
        kind: OrderKind::ManualSale,
        payment_method: Some(method),
        reference_number: None,
        appointment_id: None,
        note: String::new(),
        created_at: completed_at - Duration::hours(1),
        completed_at: Some(completed_at),
    }
}

const NOW: OffsetDateTime = datetime!(2026-03-31 15:00 +05:30);

// =============================================================================
// ranges
// =============================================================================

#[test]
fn range_parses_case_insensitively() {
    assert_eq!("WEEK".parse::<SalesRange>().unwrap(), SalesRange::Week);
    assert_eq!(" all ".parse::<SalesRange>().unwrap(), SalesRange::All);
    assert!(matches!("year".parse::<SalesRange>(), Err(ReportError::InvalidRange(r)) if r == "year"));
}

#[test]
fn previous_month_clamps_to_month_end() {
    assert_eq!(same_day_previous_month(date!(2026 - 03 - 31)), date!(2026 - 02 - 28));
    assert_eq!(same_day_previous_month(date!(2028 - 03 - 30)), date!(2028 - 02 - 29));
    assert_eq!(same_day_previous_month(date!(2026 - 01 - 15)), date!(2025 - 12 - 15));
    assert_eq!(same_day_previous_month(date!(2026 - 10 - 18)), date!(2026 - 09 - 18));
    assert_eq!(same_day_previous_month(date!(2026 - 03 - 10)), date!(2026 - 02 - 10));
    assert_eq!(same_day_previous_month(date!(2026 - 05 - 31)), date!(2026 - 04 - 30));
    assert_eq!(same_day_previous_month(date!(2026 - 01 - 01)), date!(2025 - 12 - 01));
}

#[test]
fn month_range_starts_on_same_day_last_month() {
    let mid_month = datetime!(2026-03-10 12:00 +05:30);
    assert_eq!(SalesRange::Month.since(mid_month), Some(datetime!(2026-02-10 00:00 +05:30)));
    assert!(!SalesRange::Month.contains(datetime!(2026-02-09 23:00 +05:30), mid_month));
    assert!(SalesRange::Month.contains(datetime!(2026-02-10 09:00 +05:30), mid_month));
}

#[test]
fn since_uses_clinic_midnight() {
    assert_eq!(SalesRange::Today.since(NOW), Some(datetime!(2026-03-31 00:00 +05:30)));
    assert_eq!(SalesRange::Week.since(NOW), Some(datetime!(2026-03-24 00:00 +05:30)));
    assert_eq!(SalesRange::Month.since(NOW), Some(datetime!(2026-02-28 00:00 +05:30)));
    assert_eq!(SalesRange::All.since(NOW), None);
}

#[test]
fn week_excludes_its_exact_bound() {
    let bound = datetime!(2026-03-24 00:00 +05:30);
    assert!(!SalesRange::Week.contains(bound, NOW));
    assert!(SalesRange::Week.contains(bound + Duration::seconds(1), NOW));
    assert!(SalesRange::Today.contains(datetime!(2026-03-31 00:00 +05:30), NOW));
}

// =============================================================================
// dashboard revenue
// =============================================================================

#[test]
fn revenue_splits_day_and_month() {
    let orders = vec![
        sale("Kamal", 2_500, PaymentMethod::Cash, datetime!(2026-03-31 09:15 +05:30)),
        sale("", 1_000, PaymentMethod::Card, datetime!(2026-03-31 08:00 +05:30)),
        sale("Nimal", 7_000, PaymentMethod::Cash, datetime!(2026-03-02 10:00 +05:30)),
        sale("Old", 9_999, PaymentMethod::Cash, datetime!(2026-02-28 10:00 +05:30)),
    ];
    let r = revenue(&orders, NOW);
    assert_eq!(r.daily_revenue_cents, 3_500);
    assert_eq!(r.monthly_revenue_cents, 10_500);
    assert_eq!(r.today_orders.len(), 2);
    assert_eq!(r.today_orders[0].time, "09:15");
    assert_eq!(r.today_orders[1].customer, "Cash Sale");
}

#[test]
fn revenue_dates_orders_in_clinic_offset() {
    // 20:00 UTC on the 30th is already the 31st in the clinic.
    let orders = vec![sale("Late", 4_000, PaymentMethod::Cash, datetime!(2026-03-30 20:00 UTC))];
    let r = revenue(&orders, NOW);
    assert_eq!(r.daily_revenue_cents, 4_000);
    assert_eq!(r.today_orders[0].time, "01:30");
}

// =============================================================================
// sales report
// =============================================================================

#[test]
fn summarize_counts_payment_methods() {
    let orders = vec![
        sale("A", 1_000, PaymentMethod::Cash, datetime!(2026-03-31 10:00 +05:30)),
        sale("B", 2_000, PaymentMethod::Card, datetime!(2026-03-30 10:00 +05:30)),
        sale("C", 3_000, PaymentMethod::Transfer, datetime!(2026-03-29 10:00 +05:30)),
        sale("D", 4_000, PaymentMethod::Cash, datetime!(2026-03-01 10:00 +05:30)),
    ];
    let report = summarize(&orders, SalesRange::Week, NOW);
    assert_eq!(report.order_count, 3);
    assert_eq!(report.total_revenue_cents, 6_000);
    assert_eq!(report.cash_payments, 1);
    assert_eq!(report.card_payments, 2);

    let all = summarize(&orders, SalesRange::All, NOW);
    assert_eq!(all.order_count, 4);
    assert_eq!(all.cash_payments, 2);
}

#[test]
fn chart_is_latest_ten_oldest_first() {
    let orders: Vec<PharmacyOrder> = (0..12)
        .map(|i| sale("P", (i + 1) * 100, PaymentMethod::Cash, NOW - Duration::hours(i)))
        .collect();
    let report = summarize(&orders, SalesRange::All, NOW);
    assert_eq!(report.chart.len(), CHART_POINTS);
    assert_eq!(report.chart.first().unwrap().total_cents, 1_000);
    assert_eq!(report.chart.last().unwrap().total_cents, 100);
}

// =============================================================================
// text
// =============================================================================

#[test]
fn daily_text_lists_orders_and_total() {
    let orders = vec![sale("Kamal", 2_550, PaymentMethod::Cash, datetime!(2026-03-31 09:15 +05:30))];
    let text = daily_report_text(&ClinicInfo::default(), NOW.date(), &revenue(&orders, NOW));
    assert!(text.contains("Daily Report"));
    assert!(text.contains("Date: 2026-03-31"));
    assert!(text.contains("1 | Kamal | 09:15 |       25.50"));
    assert!(text.trim_end().ends_with("Total Revenue: Rs. 25.50"));
}

#[test]
fn sales_text_shows_period_and_methods() {
    let orders = vec![sale("B", 2_000, PaymentMethod::Card, datetime!(2026-03-30 10:00 +05:30))];
    let text = sales_report_text(&ClinicInfo::default(), &summarize(&orders, SalesRange::Month, NOW));
    assert!(text.contains("Period: MONTH"));
    assert!(text.contains("Total Revenue: Rs. 20.00"));
    assert!(text.contains("2026-03-30 | B       | Card   |  20.00"));
}

#[test]
fn nested_error_codes_delegate() {
    let err = ReportError::from(AppointmentError::Invalid("x"));
    assert_eq!(err.error_code(), "E_INVALID_INPUT");
    assert_eq!(ReportError::InvalidRange("x".into()).error_code(), "E_INVALID_INPUT");
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn dashboard_reads_live_counts() {
    use crate::state::test_helpers;

    let state = test_helpers::live_app_state().await;
    let board = dashboard(&state.pool, state.now(), 10).await.expect("dashboard");
    assert!(board.revenue.daily_revenue_cents <= board.revenue.monthly_revenue_cents);
    assert!(board.pending_appointments >= 0);
    let report = sales_report(&state.pool, SalesRange::Today, state.now()).await.expect("sales");
    assert_eq!(report.order_count, report.orders.len());
}

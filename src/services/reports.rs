//! Revenue dashboard and sales reports.
//!
//! Revenue is counted from completed orders, dated by completion time
//! (creation time for rows that predate `completed_at`). Dates are taken in
//! the clinic's offset, carried by `now`.

use std::fmt::Write as _;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use time::{Date, Duration, Month, OffsetDateTime};
use uuid::Uuid;

use crate::clock;
use crate::config::ClinicInfo;
use crate::frame::ErrorCode;
use crate::money::format_cents;
use crate::services::appointment::{self, AppointmentError};
use crate::services::inventory::{self, InventoryError};
use crate::services::orders::{self, PaymentMethod, PharmacyOrder};

/// Chart series length on the sales report.
pub const CHART_POINTS: usize = 10;

const CASH_SALE_LABEL: &str = "Cash Sale";

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("unknown report range: {0}")]
    InvalidRange(String),
    #[error(transparent)]
    Appointment(#[from] AppointmentError),
    #[error(transparent)]
    Inventory(#[from] InventoryError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for ReportError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidRange(_) => "E_INVALID_INPUT",
            Self::Appointment(e) => e.error_code(),
            Self::Inventory(e) => e.error_code(),
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Appointment(e) => e.retryable(),
            Self::Inventory(e) => e.retryable(),
            _ => matches!(self, Self::Database(_)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SalesRange {
    #[default]
    Today,
    Week,
    Month,
    All,
}

impl SalesRange {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Today => "today",
            Self::Week => "week",
            Self::Month => "month",
            Self::All => "all",
        }
    }

    /// Lower bound of the range. `Today` includes midnight; `Week` and
    /// `Month` count orders strictly after their bound.
    #[must_use]
    pub fn since(self, now: OffsetDateTime) -> Option<OffsetDateTime> {
        let today = now.date();
        let start = match self {
            Self::Today => today,
            Self::Week => today - Duration::days(7),
            Self::Month => same_day_previous_month(today),
            Self::All => return None,
        };
        Some(clock::start_of_day(start, now.offset()))
    }

    #[must_use]
    pub fn contains(self, at: OffsetDateTime, now: OffsetDateTime) -> bool {
        match (self, self.since(now)) {
            (_, None) => true,
            (Self::Today, Some(start)) => at >= start,
            (_, Some(start)) => at > start,
        }
    }
}

impl FromStr for SalesRange {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "today" => Ok(Self::Today),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "all" => Ok(Self::All),
            other => Err(ReportError::InvalidRange(other.to_owned())),
        }
    }
}

/// Same calendar day one month earlier, clamped to the end of a shorter month.
#[must_use]
pub fn same_day_previous_month(date: Date) -> Date {
    let (year, month) = match date.month() {
        Month::January => (date.year() - 1, Month::December),
        m => (date.year(), m.previous()),
    };
    let day = date.day().min(time::util::days_in_year_month(year, month));
    Date::from_calendar_date(year, month, day).unwrap_or(date)
}

fn order_time(order: &PharmacyOrder, now: OffsetDateTime) -> OffsetDateTime {
    order.completed_at.unwrap_or(order.created_at).to_offset(now.offset())
}

fn customer_label(order: &PharmacyOrder) -> &str {
    let name = order.patient_name.trim();
    if name.is_empty() { CASH_SALE_LABEL } else { name }
}

// =============================================================================
// DASHBOARD
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyOrder {
    pub id: Uuid,
    pub customer: String,
    pub time: String,
    pub total_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Revenue {
    pub daily_revenue_cents: i64,
    pub monthly_revenue_cents: i64,
    pub today_orders: Vec<DailyOrder>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dashboard {
    #[serde(flatten)]
    pub revenue: Revenue,
    pub pending_appointments: i64,
    pub low_stock_count: i64,
}

/// Split completed orders into today's and this calendar month's revenue.
#[must_use]
pub fn revenue(orders: &[PharmacyOrder], now: OffsetDateTime) -> Revenue {
    let today = now.date();
    let mut out = Revenue { daily_revenue_cents: 0, monthly_revenue_cents: 0, today_orders: Vec::new() };
    for order in orders {
        let at = order_time(order, now);
        if at.year() != today.year() || at.month() != today.month() {
            continue;
        }
        out.monthly_revenue_cents += order.total_cents;
        if at.date() == today {
            out.daily_revenue_cents += order.total_cents;
            out.today_orders.push(DailyOrder {
                id: order.id,
                customer: customer_label(order).to_owned(),
                time: clock::format_time(at),
                total_cents: order.total_cents,
            });
        }
    }
    out
}

/// # Errors
///
/// Returns a database error if any of the underlying queries fail.
pub async fn dashboard(pool: &PgPool, now: OffsetDateTime, low_stock_threshold: i32) -> Result<Dashboard, ReportError> {
    let month_start = now.date().replace_day(1).unwrap_or(now.date());
    let orders = orders::completed_since(pool, Some(clock::start_of_day(month_start, now.offset()))).await?;
    Ok(Dashboard {
        revenue: revenue(&orders, now),
        pending_appointments: appointment::pending_count(pool, now.date()).await?,
        low_stock_count: inventory::low_stock_count(pool, low_stock_threshold).await?,
    })
}

// =============================================================================
// SALES REPORT
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaleRow {
    pub id: Uuid,
    pub date: String,
    pub customer: String,
    pub payment_method: Option<PaymentMethod>,
    pub total_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartPoint {
    pub label: String,
    pub total_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SalesReport {
    pub range: SalesRange,
    pub total_revenue_cents: i64,
    pub order_count: usize,
    pub cash_payments: usize,
    /// Card and bank transfer payments together.
    pub card_payments: usize,
    pub orders: Vec<SaleRow>,
    pub chart: Vec<ChartPoint>,
}

/// Summarize completed orders (newest first) for `range`.
#[must_use]
pub fn summarize(orders: &[PharmacyOrder], range: SalesRange, now: OffsetDateTime) -> SalesReport {
    let rows: Vec<SaleRow> = orders
        .iter()
        .filter(|o| range.contains(order_time(o, now), now))
        .map(|o| SaleRow {
            id: o.id,
            date: clock::format_date(order_time(o, now).date()),
            customer: customer_label(o).to_owned(),
            payment_method: o.payment_method,
            total_cents: o.total_cents,
        })
        .collect();

    let count_method = |pred: fn(PaymentMethod) -> bool| {
        rows.iter().filter(|r| r.payment_method.is_some_and(pred)).count()
    };
    let cash_payments = count_method(|m| m == PaymentMethod::Cash);
    let card_payments = count_method(|m| matches!(m, PaymentMethod::Card | PaymentMethod::Transfer));

    let mut chart: Vec<ChartPoint> = rows
        .iter()
        .take(CHART_POINTS)
        .map(|r| ChartPoint { label: r.date.clone(), total_cents: r.total_cents })
        .collect();
    chart.reverse();

    SalesReport {
        range,
        total_revenue_cents: rows.iter().map(|r| r.total_cents).sum(),
        order_count: rows.len(),
        cash_payments,
        card_payments,
        orders: rows,
        chart,
    }
}

/// # Errors
///
/// Returns a database error if the query fails.
pub async fn sales_report(pool: &PgPool, range: SalesRange, now: OffsetDateTime) -> Result<SalesReport, ReportError> {
    let orders = orders::completed_since(pool, range.since(now)).await?;
    Ok(summarize(&orders, range, now))
}

// =============================================================================
// TEXT REPORTS
// =============================================================================

/// Fixed-width table. Columns from `numeric_from` on are right-aligned.
fn text_table(out: &mut String, headers: &[&str], rows: &[Vec<String>], numeric_from: usize) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }
    let rule = "-".repeat(widths.iter().sum::<usize>() + 3 * widths.len().saturating_sub(1));
    let line = |out: &mut String, cells: &[String]| {
        let parts: Vec<String> = cells
            .iter()
            .zip(&widths)
            .enumerate()
            .map(|(i, (cell, w))| if i < numeric_from { format!("{cell:<w$}") } else { format!("{cell:>w$}") })
            .collect();
        let _ = writeln!(out, "{}", parts.join(" | ").trim_end());
    };

    line(&mut *out, &headers.iter().map(|h| (*h).to_owned()).collect::<Vec<_>>());
    let _ = writeln!(out, "{rule}");
    for row in rows {
        line(&mut *out, row);
    }
    let _ = writeln!(out, "{rule}");
}

#[must_use]
pub fn daily_report_text(clinic: &ClinicInfo, date: Date, revenue: &Revenue) -> String {
    let rows: Vec<Vec<String>> = revenue
        .today_orders
        .iter()
        .enumerate()
        .map(|(i, o)| vec![(i + 1).to_string(), o.customer.clone(), o.time.clone(), format_cents(o.total_cents)])
        .collect();

    let mut out = String::new();
    let _ = writeln!(out, "{} - Daily Report", clinic.name);
    let _ = writeln!(out, "Date: {}", clock::format_date(date));
    let _ = writeln!(out);
    text_table(&mut out, &["#", "Type", "Time", "Amount (Rs)"], &rows, 3);
    let _ = writeln!(out, "Total Revenue: Rs. {}", format_cents(revenue.daily_revenue_cents));
    out
}

#[must_use]
pub fn sales_report_text(clinic: &ClinicInfo, report: &SalesReport) -> String {
    let rows: Vec<Vec<String>> = report
        .orders
        .iter()
        .map(|r| {
            vec![
                r.date.clone(),
                r.customer.clone(),
                r.payment_method.map_or("-", PaymentMethod::as_str).to_owned(),
                format_cents(r.total_cents),
            ]
        })
        .collect();

    let mut out = String::new();
    let _ = writeln!(out, "{} - Sales Report", clinic.name);
    let _ = writeln!(out, "Period: {}", report.range.as_str().to_ascii_uppercase());
    let _ = writeln!(out, "Total Revenue: Rs. {}", format_cents(report.total_revenue_cents));
    let _ = writeln!(out, "Orders: {}  Cash: {}  Card/Online: {}", report.order_count, report.cash_payments, report.card_payments);
    let _ = writeln!(out);
    text_table(&mut out, &["Date", "Patient", "Method", "Amount"], &rows, 3);
    out
}

#[cfg(test)]
#[path = "reports_test.rs"]
mod tests;

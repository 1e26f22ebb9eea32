//! Money helpers. Amounts are integer cents everywhere; formatting is only
//! for invoices and text reports.

/// Doctor's professional charge applied to new consultations (Rs. 500.00).
pub const DEFAULT_DOCTOR_CHARGE_CENTS: i64 = 50_000;

/// `123456` -> `"1234.56"`, `-50` -> `"-0.50"`.
#[must_use]
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

/// `"Rs. 1234.56"`
#[must_use]
pub fn format_rupees(cents: i64) -> String {
    format!("Rs. {}", format_cents(cents))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_two_decimals() {
        assert_eq!(format_cents(0), "0.00");
        assert_eq!(format_cents(5), "0.05");
        assert_eq!(format_cents(50_000), "500.00");
        assert_eq!(format_cents(123_456), "1234.56");
    }

    #[test]
    fn formats_negative_balance() {
        assert_eq!(format_cents(-50), "-0.50");
        assert_eq!(format_rupees(-12_345), "Rs. -123.45");
    }
}

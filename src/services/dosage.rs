//! Dosage schedule and quantity computation.
//!
//! A dosage is four time-of-day flags plus a meal timing. The dispensed
//! quantity is `ceil(times_per_day * dose_amount * days)`; half tablets are
//! allowed in the dose amount, so both factors are `f64`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MealTiming {
    #[default]
    #[serde(rename = "After Meal")]
    AfterMeal,
    #[serde(rename = "Before Meal")]
    BeforeMeal,
    #[serde(rename = "With Meal")]
    WithMeal,
}

impl MealTiming {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AfterMeal => "After Meal",
            Self::BeforeMeal => "Before Meal",
            Self::WithMeal => "With Meal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct Dosage {
    pub morning: bool,
    pub noon: bool,
    pub evening: bool,
    pub night: bool,
    pub timing: MealTiming,
}

impl Dosage {
    /// Morning and night, after meals. Used for new billing lines.
    #[must_use]
    pub fn twice_daily() -> Self {
        Self { morning: true, night: true, ..Self::default() }
    }

    #[must_use]
    pub fn times_per_day(&self) -> u8 {
        u8::from(self.morning) + u8::from(self.noon) + u8::from(self.evening) + u8::from(self.night)
    }

    /// Morning-noon-evening-night flags, e.g. `1-0-0-1`.
    #[must_use]
    pub fn pattern(&self) -> String {
        let flag = |on: bool| if on { '1' } else { '0' };
        format!("{}-{}-{}-{}", flag(self.morning), flag(self.noon), flag(self.evening), flag(self.night))
    }

    /// `1-0-0-1 (After Meal) [1 tab x 2 Days]`
    #[must_use]
    pub fn instructions(&self, dose_amount: f64, days: f64) -> String {
        format!(
            "{} ({}) [{} tab x {} Days]",
            self.pattern(),
            self.timing.as_str(),
            format_amount(dose_amount),
            format_amount(days),
        )
    }
}

/// Merge a partial dosage edit from the billing screen.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct DosageChange {
    pub morning: Option<bool>,
    pub noon: Option<bool>,
    pub evening: Option<bool>,
    pub night: Option<bool>,
    pub timing: Option<MealTiming>,
    pub days: Option<f64>,
    pub dose_amount: Option<f64>,
}

impl DosageChange {
    pub fn apply(&self, dosage: &mut Dosage, dose_amount: &mut f64, days: &mut f64) {
        if let Some(v) = self.morning {
            dosage.morning = v;
        }
        if let Some(v) = self.noon {
            dosage.noon = v;
        }
        if let Some(v) = self.evening {
            dosage.evening = v;
        }
        if let Some(v) = self.night {
            dosage.night = v;
        }
        if let Some(v) = self.timing {
            dosage.timing = v;
        }
        if let Some(v) = self.days {
            *days = v;
        }
        if let Some(v) = self.dose_amount {
            *dose_amount = v;
        }
    }
}

/// Units to dispense, or `None` when any factor is zero or negative.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn compute_quantity(dosage: &Dosage, dose_amount: f64, days: f64) -> Option<i32> {
    let times = f64::from(dosage.times_per_day());
    let positive = |v: f64| v > 0.0;
    if !positive(times) || !positive(dose_amount) || !positive(days) {
        return None;
    }
    let qty = (times * dose_amount * days).ceil();
    if qty > f64::from(i32::MAX) {
        return None;
    }
    Some(qty as i32)
}

/// `1` for whole numbers, `0.5` otherwise.
#[must_use]
pub fn format_amount(value: f64) -> String {
    if value.fract().abs() < f64::EPSILON && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        format!("{value}")
    }
}

#[cfg(test)]
#[path = "dosage_test.rs"]
mod tests;

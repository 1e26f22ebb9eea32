use super::*;

#[test]
fn times_per_day_counts_flags() {
    assert_eq!(Dosage::default().times_per_day(), 0);
    assert_eq!(Dosage::twice_daily().times_per_day(), 2);
    let all = Dosage { morning: true, noon: true, evening: true, night: true, timing: MealTiming::WithMeal };
    assert_eq!(all.times_per_day(), 4);
}

#[test]
fn quantity_is_ceiling_of_product() {
    let d = Dosage::twice_daily();
    assert_eq!(compute_quantity(&d, 1.0, 2.0), Some(4));
    assert_eq!(compute_quantity(&d, 0.5, 3.0), Some(3));

    let once = Dosage { noon: true, ..Dosage::default() };
    assert_eq!(compute_quantity(&once, 0.5, 3.0), Some(2));
}

#[test]
fn quantity_none_for_non_positive_factors() {
    let d = Dosage::twice_daily();
    assert_eq!(compute_quantity(&Dosage::default(), 1.0, 2.0), None);
    assert_eq!(compute_quantity(&d, 0.0, 2.0), None);
    assert_eq!(compute_quantity(&d, 1.0, 0.0), None);
    assert_eq!(compute_quantity(&d, -1.0, 2.0), None);
    assert_eq!(compute_quantity(&d, f64::NAN, 2.0), None);
}

#[test]
fn instructions_format() {
    assert_eq!(Dosage::twice_daily().instructions(1.0, 2.0), "1-0-0-1 (After Meal) [1 tab x 2 Days]");

    let d = Dosage { noon: true, evening: true, timing: MealTiming::BeforeMeal, ..Dosage::default() };
    assert_eq!(d.instructions(0.5, 5.0), "0-1-1-0 (Before Meal) [0.5 tab x 5 Days]");
}

#[test]
fn timing_serde_uses_display_names() {
    assert_eq!(serde_json::to_string(&MealTiming::WithMeal).unwrap(), "\"With Meal\"");
    let parsed: Dosage = serde_json::from_str(r#"{"morning":true,"timing":"Before Meal"}"#).unwrap();
    assert!(parsed.morning);
    assert!(!parsed.night);
    assert_eq!(parsed.timing, MealTiming::BeforeMeal);
}

#[test]
fn missing_timing_defaults_to_after_meal() {
    let parsed: Dosage = serde_json::from_str(r#"{"night":true}"#).unwrap();
    assert_eq!(parsed.timing, MealTiming::AfterMeal);
}

#[test]
fn change_applies_only_given_fields() {
    let mut dosage = Dosage::twice_daily();
    let mut dose = 1.0;
    let mut days = 2.0;

    let change = DosageChange { night: Some(false), days: Some(5.0), ..DosageChange::default() };
    change.apply(&mut dosage, &mut dose, &mut days);

    assert!(dosage.morning);
    assert!(!dosage.night);
    assert!((dose - 1.0).abs() < f64::EPSILON);
    assert!((days - 5.0).abs() < f64::EPSILON);
}

#[test]
fn format_amount_trims_whole_numbers() {
    assert_eq!(format_amount(2.0), "2");
    assert_eq!(format_amount(0.5), "0.5");
    assert_eq!(format_amount(1.25), "1.25");
}

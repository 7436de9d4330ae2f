//! Built-in statistic computations
//!
//! Each routine reads the current window's filtered view and returns a
//! JSON summary. Glucose stats work in the caller's preferred display
//! unit; insulin and carb stats read the type-specific dose fields.
//!
//! Result shapes are flat objects with a primary `value` where one makes
//! sense, plus the supporting counts a consumer needs to qualify it.

use serde_json::{json, Value};

use crate::bg::{convert_to_mgdl, BgClass, GlucoseUnit};
use crate::datetime::MS_IN_MIN;
use crate::event::{Event, EventType};
use crate::stats::StatInput;

/// Expected CGM readings per day at the standard 5-minute interval
const CGM_READINGS_ONE_DAY: f64 = 288.0;

/// Minutes covered by one CGM reading
const CGM_SAMPLE_MINUTES: i64 = 5;

/// Days of CGM data below which GMI is flagged as insufficient
const GMI_MIN_DAYS: f64 = 14.0;

/// Glucose values from the preferred source, in display units
fn glucose_values(input: &StatInput, source: Option<&EventType>) -> Vec<f64> {
    let Some(source) = source.or(input.bg_source.as_ref()) else {
        return Vec::new();
    };

    input
        .view
        .of_type(source)
        .events()
        .filter_map(|event| {
            let value = event.value?;
            let stored = event
                .units
                .as_deref()
                .and_then(GlucoseUnit::parse)
                .unwrap_or(input.bg_prefs.bg_units);
            Some(stored.convert(value, input.bg_prefs.bg_units))
        })
        .collect()
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation; `None` below two values
fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

fn extra_f64(event: &Event, key: &str) -> Option<f64> {
    event.extra.get(key).and_then(Value::as_f64)
}

pub(super) fn average_glucose(input: &StatInput) -> Value {
    let values = glucose_values(input, None);
    json!({
        "value": mean(&values),
        "units": input.bg_prefs.bg_units.label(),
        "total": values.len(),
    })
}

pub(super) fn standard_dev(input: &StatInput) -> Value {
    let values = glucose_values(input, None);
    json!({
        "value": sample_std_dev(&values),
        "mean": mean(&values),
        "total": values.len(),
    })
}

pub(super) fn coefficient_of_variation(input: &StatInput) -> Value {
    let values = glucose_values(input, None);
    let cv = match (sample_std_dev(&values), mean(&values)) {
        (Some(sd), Some(m)) if m != 0.0 => Some(sd / m * 100.0),
        _ => None,
    };
    json!({
        "value": cv,
        "total": values.len(),
    })
}

/// GMI estimates lab A1c from mean CGM glucose: 3.31 + 0.02392 x mg/dL
pub(super) fn glucose_management_indicator(input: &StatInput) -> Value {
    let values = glucose_values(input, Some(&EventType::Cbg));
    let gmi = mean(&values).map(|m| {
        let mgdl = match input.bg_prefs.bg_units {
            GlucoseUnit::MgDl => m,
            GlucoseUnit::MmolL => convert_to_mgdl(m),
        };
        3.31 + 0.02392 * mgdl
    });

    json!({
        "value": gmi,
        "insufficientData": gmi.is_none() || input.window.days < GMI_MIN_DAYS,
        "total": values.len(),
    })
}

fn range_buckets(values: &[f64], input: &StatInput) -> [usize; 5] {
    let mut buckets = [0usize; 5];
    for value in values {
        let class = input.bg_prefs.bg_bounds.classify(*value);
        let idx = BgClass::all().iter().position(|c| *c == class).unwrap_or(2);
        buckets[idx] += 1;
    }
    buckets
}

pub(super) fn readings_in_range(input: &StatInput) -> Value {
    let values = glucose_values(input, Some(&EventType::Smbg));
    let buckets = range_buckets(&values, input);

    json!({
        "veryLow": buckets[0],
        "low": buckets[1],
        "target": buckets[2],
        "high": buckets[3],
        "veryHigh": buckets[4],
        "total": values.len(),
    })
}

pub(super) fn time_in_range(input: &StatInput) -> Value {
    let values = glucose_values(input, Some(&EventType::Cbg));
    let buckets = range_buckets(&values, input);
    let minutes = |count: usize| count as i64 * CGM_SAMPLE_MINUTES;

    json!({
        "veryLow": minutes(buckets[0]),
        "low": minutes(buckets[1]),
        "target": minutes(buckets[2]),
        "high": minutes(buckets[3]),
        "veryHigh": minutes(buckets[4]),
        "total": minutes(values.len()),
        "units": "minutes",
    })
}

pub(super) fn sensor_usage(input: &StatInput) -> Value {
    let count = input.view.of_type(&EventType::Cbg).len();
    let expected = input.window.days * CGM_READINGS_ONE_DAY;
    let usage = if expected > 0.0 {
        Some((count as f64 / expected * 100.0).min(100.0))
    } else {
        None
    };

    json!({
        "value": usage,
        "count": count,
        "expected": expected,
    })
}

fn insulin_totals(input: &StatInput) -> (f64, f64) {
    let bolus: f64 = input
        .view
        .of_type(&EventType::Bolus)
        .events()
        .map(|event| {
            extra_f64(event, "normal").unwrap_or_else(|| event.value.unwrap_or(0.0))
                + extra_f64(event, "extended").unwrap_or(0.0)
        })
        .sum();

    // basal dose = rate (U/hr) x duration
    let basal: f64 = input
        .view
        .of_type(&EventType::Basal)
        .events()
        .filter_map(|event| {
            let rate = extra_f64(event, "rate")?;
            let duration = event.duration? as f64;
            Some(rate * duration / (60.0 * MS_IN_MIN as f64))
        })
        .sum();

    (basal, bolus)
}

pub(super) fn total_insulin(input: &StatInput) -> Value {
    let (basal, bolus) = insulin_totals(input);
    json!({
        "basal": basal,
        "bolus": bolus,
        "total": basal + bolus,
    })
}

pub(super) fn average_daily_dose(input: &StatInput) -> Value {
    let (basal, bolus) = insulin_totals(input);
    let total = basal + bolus;
    let daily = if input.window.days > 0.0 {
        Some(total / input.window.days)
    } else {
        None
    };

    json!({
        "totalInsulin": total,
        "value": daily,
    })
}

pub(super) fn carbs(input: &StatInput) -> Value {
    let wizard: f64 = input
        .view
        .of_type(&EventType::Wizard)
        .events()
        .filter_map(|event| extra_f64(event, "carbInput"))
        .sum();

    let food_entries: Vec<f64> = input
        .view
        .of_type(&EventType::Food)
        .events()
        .filter_map(|event| {
            event
                .extra
                .get("nutrition")
                .and_then(|n| n.get("carbohydrate"))
                .and_then(|c| c.get("net"))
                .and_then(Value::as_f64)
        })
        .collect();

    let wizard_count = input.view.of_type(&EventType::Wizard).len();

    json!({
        "value": wizard + food_entries.iter().sum::<f64>(),
        "total": wizard_count + food_entries.len(),
    })
}

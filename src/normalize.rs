//! Record normalization
//!
//! Derives the display-time and display-unit fields on an event from the
//! caller's current preferences: `normal_time`, `display_offset`,
//! `ms_per24`, `normal_end`, and the converted glucose value. The raw
//! `time` field is the source of truth and is never touched.
//!
//! Normalization is a pure function: it returns a new record and leaves
//! the input alone, so collections shared between sessions never observe
//! another session's preferences. Re-normalizing under different
//! preferences is always safe; under identical preferences it is a
//! fixpoint.

use crate::bg::{BgPrefs, GlucoseUnit};
use crate::datetime::{
    format_naive_seconds, ms_per_24, zone_offset_minutes, TimePrefs, MS_IN_MIN,
};
use crate::event::{Event, EventType};

/// Annotation attached when offset reconstruction disagrees with the
/// device clock
pub const DEVICE_TIME_MISMATCH: &str =
    "Combining `time` and `timezoneOffset` does not yield `deviceTime`.";

/// Normalize one event under the given preferences
///
/// The reconciliation rule, in priority order:
/// 1. timezone-aware: display in the named zone; `normal_time` is the
///    absolute instant and `display_offset` the zone's offset at that
///    instant (signed minutes east).
/// 2. offsets present: reconstruct device-local time arithmetically from
///    `timezone_offset` and `conversion_offset`; no display offset.
/// 3. fallback: trust the naive device clock read as UTC, or the absolute
///    instant when there is no device clock.
pub fn normalize(event: &Event, time_prefs: &TimePrefs, bg_prefs: &BgPrefs) -> Event {
    let mut normalized = event.clone();
    let zone = time_prefs.timezone();

    if let Some(zone) = zone {
        normalized.normal_time = Some(event.time);
        normalized.display_offset = Some(zone_offset_minutes(event.time, zone));
        normalized.warning = None;
    } else {
        let normal_time = match (event.timezone_offset, event.conversion_offset) {
            (Some(tz_offset), Some(conv_offset)) => {
                event.time + tz_offset * MS_IN_MIN + conv_offset
            }
            _ => event.device_time_ms().unwrap_or(event.time),
        };

        normalized.normal_time = Some(normal_time);
        normalized.display_offset = Some(0);

        // Device clock consistency check, second precision; non-fatal
        normalized.warning = match event.device_time {
            Some(device_time)
                if format_naive_seconds(normal_time)
                    != device_time.format("%Y-%m-%dT%H:%M:%S").to_string() =>
            {
                Some(DEVICE_TIME_MISMATCH.to_string())
            }
            _ => None,
        };
    }

    let normal_time = normalized.normal_time.unwrap_or(event.time);

    normalized.normal_end = match (&event.event_type, event.duration) {
        (EventType::Basal, Some(duration)) => Some(normal_time + duration),
        _ => None,
    };

    if event.event_type.is_glucose() {
        normalize_bg_units(&mut normalized, bg_prefs);
        normalized.ms_per24 = Some(ms_per_24(normal_time, zone));
    } else {
        normalized.ms_per24 = None;
    }

    normalized
}

/// Convert a glucose event's value into the preferred display unit
fn normalize_bg_units(event: &mut Event, bg_prefs: &BgPrefs) {
    let stored = event.units.as_deref().and_then(GlucoseUnit::parse);

    if let (Some(stored), Some(value)) = (stored, event.value) {
        if stored != bg_prefs.bg_units {
            event.value = Some(stored.convert(value, bg_prefs.bg_units));
            event.units = Some(bg_prefs.bg_units.label().to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bg::BgBounds;
    use crate::datetime::{parse_naive, MS_IN_HOUR};
    use chrono_tz::Tz;

    // 2021-06-15T12:00:00Z
    const T0: i64 = 1_623_758_400_000;

    fn new_york() -> Tz {
        "America/New_York".parse().unwrap()
    }

    #[test]
    fn test_timezone_aware_keeps_time_and_sets_offset() {
        let event = Event::new("a", "bolus", T0);
        let prefs = TimePrefs::aware(new_york());

        let normalized = normalize(&event, &prefs, &BgPrefs::default());

        assert_eq!(normalized.normal_time, Some(T0));
        // EDT is UTC-4 in June
        assert_eq!(normalized.display_offset, Some(-240));
        assert!(normalized.warning.is_none());
        // input untouched
        assert!(event.normal_time.is_none());
    }

    #[test]
    fn test_offset_reconstruction() {
        let event = Event::new("a", "bolus", T0).offsets(-240, 0);

        let normalized = normalize(&event, &TimePrefs::default(), &BgPrefs::default());

        assert_eq!(normalized.normal_time, Some(T0 - 240 * MS_IN_MIN));
        assert_eq!(normalized.display_offset, Some(0));
    }

    #[test]
    fn test_device_time_fallback() {
        let device_time = parse_naive("2021-06-15T08:00:00").unwrap();
        let event = Event::new("a", "bolus", T0).device_time(device_time);

        let normalized = normalize(&event, &TimePrefs::default(), &BgPrefs::default());

        // naive device clock read as UTC
        assert_eq!(normalized.normal_time, Some(T0 - 4 * MS_IN_HOUR));
        assert!(normalized.warning.is_none());
    }

    #[test]
    fn test_bare_time_fallback() {
        let event = Event::new("a", "bolus", T0);
        let normalized = normalize(&event, &TimePrefs::default(), &BgPrefs::default());

        assert_eq!(normalized.normal_time, Some(T0));
        assert_eq!(normalized.display_offset, Some(0));
    }

    #[test]
    fn test_device_time_mismatch_warning() {
        // offsets say local is UTC-4 but the device clock reads UTC-5
        let device_time = parse_naive("2021-06-15T07:00:00").unwrap();
        let event = Event::new("a", "bolus", T0)
            .offsets(-240, 0)
            .device_time(device_time);

        let normalized = normalize(&event, &TimePrefs::default(), &BgPrefs::default());

        assert_eq!(normalized.warning.as_deref(), Some(DEVICE_TIME_MISMATCH));
        // the warning never blocks derivation
        assert_eq!(normalized.normal_time, Some(T0 - 4 * MS_IN_HOUR));
    }

    #[test]
    fn test_device_time_agreement_no_warning() {
        let device_time = parse_naive("2021-06-15T08:00:00").unwrap();
        let event = Event::new("a", "bolus", T0)
            .offsets(-240, 0)
            .device_time(device_time);

        let normalized = normalize(&event, &TimePrefs::default(), &BgPrefs::default());
        assert!(normalized.warning.is_none());
    }

    #[test]
    fn test_basal_normal_end() {
        let event = Event::new("a", "basal", T0).duration(30 * MS_IN_MIN);
        let normalized = normalize(&event, &TimePrefs::default(), &BgPrefs::default());

        assert_eq!(normalized.normal_end, Some(T0 + 30 * MS_IN_MIN));
    }

    #[test]
    fn test_basal_without_duration_has_no_end() {
        let event = Event::new("a", "basal", T0);
        let normalized = normalize(&event, &TimePrefs::default(), &BgPrefs::default());

        assert!(normalized.normal_end.is_none());
    }

    #[test]
    fn test_glucose_unit_conversion() {
        let event = Event::new("a", "cbg", T0).value(180.0, "mg/dL");
        let prefs = BgPrefs {
            bg_units: GlucoseUnit::MmolL,
            bg_bounds: BgBounds::default_mmoll(),
        };

        let normalized = normalize(&event, &TimePrefs::default(), &prefs);

        let value = normalized.value.unwrap();
        assert!((value - 9.991366).abs() < 1e-5);
        assert_eq!(normalized.units.as_deref(), Some("mmol/L"));
    }

    #[test]
    fn test_glucose_matching_units_untouched() {
        let event = Event::new("a", "smbg", T0).value(120.0, "mg/dL");
        let normalized = normalize(&event, &TimePrefs::default(), &BgPrefs::default());

        assert_eq!(normalized.value, Some(120.0));
        assert_eq!(normalized.units.as_deref(), Some("mg/dL"));
    }

    #[test]
    fn test_ms_per24_uses_display_zone() {
        let event = Event::new("a", "cbg", T0).value(100.0, "mg/dL");

        let utc = normalize(&event, &TimePrefs::default(), &BgPrefs::default());
        assert_eq!(utc.ms_per24, Some(12 * MS_IN_HOUR));

        let aware = normalize(&event, &TimePrefs::aware(new_york()), &BgPrefs::default());
        assert_eq!(aware.ms_per24, Some(8 * MS_IN_HOUR));
    }

    #[test]
    fn test_non_glucose_has_no_ms_per24() {
        let event = Event::new("a", "bolus", T0);
        let normalized = normalize(&event, &TimePrefs::default(), &BgPrefs::default());
        assert!(normalized.ms_per24.is_none());
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let device_time = parse_naive("2021-06-15T08:00:00").unwrap();
        let event = Event::new("a", "cbg", T0)
            .value(180.0, "mg/dL")
            .offsets(-240, 0)
            .device_time(device_time);
        let prefs = TimePrefs::aware(new_york());
        let bg = BgPrefs::for_unit(GlucoseUnit::MmolL);

        let once = normalize(&event, &prefs, &bg);
        let twice = normalize(&once, &prefs, &bg);

        assert_eq!(once, twice);
    }
}

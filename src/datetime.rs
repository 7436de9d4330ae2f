//! Datetime helpers for display-time normalization
//!
//! All instants are epoch milliseconds (UTC). Device records carry naive
//! local timestamps and minute-granularity offsets; display normalization
//! reconciles those against IANA timezone rules, so day boundaries and
//! in-day offsets stay correct across DST transitions.

use chrono::{DateTime, Datelike, NaiveDateTime, Offset, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Milliseconds in one minute
pub const MS_IN_MIN: i64 = 60_000;

/// Milliseconds in one hour
pub const MS_IN_HOUR: i64 = 3_600_000;

/// Milliseconds in one nominal 24-hour day
pub const MS_IN_DAY: i64 = 86_400_000;

/// Caller timezone preferences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimePrefs {
    /// Whether display times should honor a named timezone
    #[serde(default)]
    pub timezone_aware: bool,
    /// IANA timezone name; ignored unless `timezone_aware`
    #[serde(default)]
    pub timezone_name: Option<Tz>,
}

impl TimePrefs {
    /// Timezone-aware preferences for a named zone
    pub fn aware(tz: Tz) -> Self {
        Self {
            timezone_aware: true,
            timezone_name: Some(tz),
        }
    }

    /// The active display zone, if any
    ///
    /// An aware preference with no zone name falls back to UTC.
    pub fn timezone(&self) -> Option<Tz> {
        if self.timezone_aware {
            Some(self.timezone_name.unwrap_or(Tz::UTC))
        } else {
            None
        }
    }
}

/// UTC offset of `zone` at the given instant, in signed minutes east
///
/// This is the number of minutes to add to a UTC clock reading to get the
/// local clock reading (negative west of Greenwich).
pub fn zone_offset_minutes(time_ms: i64, zone: Tz) -> i64 {
    let local = to_zone(time_ms, zone);
    i64::from(local.offset().fix().local_minus_utc()) / 60
}

/// Milliseconds elapsed since local midnight of the instant's calendar day
///
/// Computed from the local wall clock rather than modular arithmetic on
/// the epoch value, so 23- and 25-hour DST days produce the offset a wall
/// clock would show. With no zone, the UTC clock is used.
pub fn ms_per_24(time_ms: i64, zone: Option<Tz>) -> i64 {
    let zone = zone.unwrap_or(Tz::UTC);
    let local = to_zone(time_ms, zone);

    i64::from(local.hour()) * MS_IN_HOUR
        + i64::from(local.minute()) * MS_IN_MIN
        + i64::from(local.second()) * 1_000
        + i64::from(local.timestamp_subsec_millis())
}

/// Day of week of the instant in UTC, 0 = Sunday .. 6 = Saturday
pub fn day_of_week_utc(time_ms: i64) -> u8 {
    to_utc(time_ms).weekday().num_days_from_sunday() as u8
}

/// Parse an absolute instant from an RFC 3339 string
///
/// Strings without an offset designator are read as UTC, which is how
/// upstream services serialize `time`.
pub fn parse_instant(raw: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis());
    }
    parse_naive(raw).map(naive_utc_ms)
}

/// Parse a naive device-local timestamp ("2021-03-14T01:30:00")
pub fn parse_naive(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()
}

/// Epoch milliseconds of a naive timestamp read as UTC
pub fn naive_utc_ms(naive: NaiveDateTime) -> i64 {
    naive.and_utc().timestamp_millis()
}

/// Render an instant as a naive UTC timestamp at second precision
///
/// Used for the deviceTime consistency check, which ignores sub-second
/// precision.
pub fn format_naive_seconds(time_ms: i64) -> String {
    to_utc(time_ms).format("%Y-%m-%dT%H:%M:%S").to_string()
}

// out-of-range instants clamp rather than panic
fn to_utc(time_ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(time_ms)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn to_zone(time_ms: i64, zone: Tz) -> DateTime<Tz> {
    to_utc(time_ms).with_timezone(&zone)
}

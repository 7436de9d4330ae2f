//! Event model for diabetes device data
//!
//! This module defines the fundamental record type flowing through the
//! engine:
//! - `Event`: one device event (reading, delivery, upload, ...)
//! - `EventType`: the open tag set identifying what kind of event it is
//!
//! Events arrive as heterogeneous JSON objects. Known fields are parsed
//! into typed struct fields; anything else rides along in `extra` so
//! callers can still select it during field projection.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::datetime::{naive_utc_ms, parse_instant, parse_naive};

/// Kind of device event
///
/// The tag set is open: unrecognized tags are preserved as `Other` so
/// future record types survive a round trip through the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    /// Continuous glucose monitor reading
    Cbg,
    /// Self-monitored (fingerstick) glucose reading
    Smbg,
    /// Basal insulin delivery interval
    Basal,
    /// Bolus insulin dose
    Bolus,
    /// Device upload session
    Upload,
    /// Bolus calculator entry
    Wizard,
    /// Food / carb entry
    Food,
    /// Physical activity entry
    PhysicalActivity,
    /// Device status event (suspend, alarm, ...)
    DeviceEvent,
    /// Pump settings snapshot
    PumpSettings,
    /// Unrecognized record type
    Other(String),
}

impl EventType {
    /// The wire tag for this type
    pub fn tag(&self) -> &str {
        match self {
            EventType::Cbg => "cbg",
            EventType::Smbg => "smbg",
            EventType::Basal => "basal",
            EventType::Bolus => "bolus",
            EventType::Upload => "upload",
            EventType::Wizard => "wizard",
            EventType::Food => "food",
            EventType::PhysicalActivity => "physicalActivity",
            EventType::DeviceEvent => "deviceEvent",
            EventType::PumpSettings => "pumpSettings",
            EventType::Other(tag) => tag,
        }
    }

    /// Whether this is a glucose reading type (cbg or smbg)
    pub fn is_glucose(&self) -> bool {
        matches!(self, EventType::Cbg | EventType::Smbg)
    }
}

impl From<String> for EventType {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "cbg" => EventType::Cbg,
            "smbg" => EventType::Smbg,
            "basal" => EventType::Basal,
            "bolus" => EventType::Bolus,
            "upload" => EventType::Upload,
            "wizard" => EventType::Wizard,
            "food" => EventType::Food,
            "physicalActivity" => EventType::PhysicalActivity,
            "deviceEvent" => EventType::DeviceEvent,
            "pumpSettings" => EventType::PumpSettings,
            _ => EventType::Other(tag),
        }
    }
}

impl From<&str> for EventType {
    fn from(tag: &str) -> Self {
        EventType::from(tag.to_string())
    }
}

impl From<EventType> for String {
    fn from(t: EventType) -> String {
        t.tag().to_string()
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// A single device event
///
/// `time` is the absolute instant reported by the upstream service and is
/// the source of truth. The `normal_*` fields are display-time derivations
/// filled in by [`crate::normalize`]; they stay `None` on a freshly
/// ingested record.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Unique record id within a collection
    pub id: String,
    /// Record type tag
    pub event_type: EventType,
    /// Absolute instant, epoch milliseconds UTC
    pub time: i64,
    /// Naive device-local timestamp, if the device reported one
    pub device_time: Option<NaiveDateTime>,
    /// Device UTC offset in minutes, for timezone-naive reconstruction
    pub timezone_offset: Option<i64>,
    /// Upload-time clock correction in milliseconds
    pub conversion_offset: Option<i64>,
    /// Measured or delivered value (glucose reading, bolus units, basal rate)
    pub value: Option<f64>,
    /// Unit the value is expressed in
    pub units: Option<String>,
    /// Duration in milliseconds (basal intervals, suspends)
    pub duration: Option<i64>,
    /// Basal delivery type (scheduled, temp, automated, suspend)
    pub delivery_type: Option<String>,
    /// Uploading application or device family
    pub source: Option<String>,
    /// Device model, on upload records
    pub device_model: Option<String>,
    /// Device capability tags, on upload records
    pub device_tags: Vec<String>,
    /// Unrecognized type-specific fields, preserved for projection
    pub extra: Map<String, Value>,

    /// Reconciled display instant, epoch milliseconds
    pub normal_time: Option<i64>,
    /// Minutes to add to UTC for local display
    pub display_offset: Option<i64>,
    /// Offset within the local 24h display day
    pub ms_per24: Option<i64>,
    /// End of a basal interval: normal_time + duration
    pub normal_end: Option<i64>,
    /// Non-fatal data-quality annotation from normalization
    pub warning: Option<String>,
}

/// JSON keys consumed into typed `Event` fields
const KNOWN_KEYS: &[&str] = &[
    "id",
    "type",
    "time",
    "deviceTime",
    "timezoneOffset",
    "conversionOffset",
    "value",
    "units",
    "duration",
    "deliveryType",
    "source",
    "deviceModel",
    "deviceTags",
];

impl Event {
    /// Create a minimal event; type-specific fields via the builders below
    pub fn new(id: impl Into<String>, event_type: impl Into<EventType>, time: i64) -> Self {
        Self {
            id: id.into(),
            event_type: event_type.into(),
            time,
            device_time: None,
            timezone_offset: None,
            conversion_offset: None,
            value: None,
            units: None,
            duration: None,
            delivery_type: None,
            source: None,
            device_model: None,
            device_tags: Vec::new(),
            extra: Map::new(),
            normal_time: None,
            display_offset: None,
            ms_per24: None,
            normal_end: None,
            warning: None,
        }
    }

    /// Builder: set value and units
    pub fn value(mut self, value: f64, units: impl Into<String>) -> Self {
        self.value = Some(value);
        self.units = Some(units.into());
        self
    }

    /// Builder: set duration in milliseconds
    pub fn duration(mut self, duration: i64) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Builder: set device-local timestamp
    pub fn device_time(mut self, naive: NaiveDateTime) -> Self {
        self.device_time = Some(naive);
        self
    }

    /// Builder: set reconstruction offsets
    pub fn offsets(mut self, timezone_offset: i64, conversion_offset: i64) -> Self {
        self.timezone_offset = Some(timezone_offset);
        self.conversion_offset = Some(conversion_offset);
        self
    }

    /// Builder: set an extra type-specific field
    pub fn field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Parse a raw JSON record into an event
    ///
    /// Returns `None` for anything that is not a well-formed record: not
    /// an object, missing or empty `id`, missing `type`, or a `time` that
    /// cannot be read as an instant. Rejection is silent by contract;
    /// callers count rather than report.
    pub fn from_value(raw: &Value) -> Option<Self> {
        let obj = raw.as_object()?;

        let id = obj.get("id")?.as_str()?;
        if id.is_empty() {
            return None;
        }
        let event_type = EventType::from(obj.get("type")?.as_str()?);
        let time = parse_time_field(obj.get("time")?)?;

        let mut event = Event::new(id, event_type, time);

        event.device_time = obj
            .get("deviceTime")
            .and_then(Value::as_str)
            .and_then(parse_naive);
        event.timezone_offset = obj.get("timezoneOffset").and_then(as_integer);
        event.conversion_offset = obj.get("conversionOffset").and_then(as_integer);
        event.value = obj.get("value").and_then(Value::as_f64);
        event.units = obj
            .get("units")
            .and_then(Value::as_str)
            .map(str::to_string);
        event.duration = obj.get("duration").and_then(as_integer);
        event.delivery_type = obj
            .get("deliveryType")
            .and_then(Value::as_str)
            .map(str::to_string);
        event.source = obj
            .get("source")
            .and_then(Value::as_str)
            .map(str::to_string);
        event.device_model = obj
            .get("deviceModel")
            .and_then(Value::as_str)
            .map(str::to_string);
        event.device_tags = obj
            .get("deviceTags")
            .and_then(Value::as_array)
            .map(|tags| {
                tags.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        for (key, value) in obj {
            if !KNOWN_KEYS.contains(&key.as_str()) {
                event.extra.insert(key.clone(), value.clone());
            }
        }

        Some(event)
    }

    /// Render the event as a flat JSON object for sorting and projection
    ///
    /// Instants are emitted as epoch milliseconds; the device timestamp
    /// keeps its naive ISO form. Derived fields appear only once the
    /// record has been normalized.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();

        map.insert("id".into(), Value::String(self.id.clone()));
        map.insert("type".into(), Value::String(self.event_type.tag().into()));
        map.insert("time".into(), Value::from(self.time));

        if let Some(device_time) = self.device_time {
            map.insert(
                "deviceTime".into(),
                Value::String(device_time.format("%Y-%m-%dT%H:%M:%S").to_string()),
            );
        }
        if let Some(offset) = self.timezone_offset {
            map.insert("timezoneOffset".into(), Value::from(offset));
        }
        if let Some(offset) = self.conversion_offset {
            map.insert("conversionOffset".into(), Value::from(offset));
        }
        if let Some(value) = self.value {
            map.insert("value".into(), Value::from(value));
        }
        if let Some(units) = &self.units {
            map.insert("units".into(), Value::String(units.clone()));
        }
        if let Some(duration) = self.duration {
            map.insert("duration".into(), Value::from(duration));
        }
        if let Some(delivery_type) = &self.delivery_type {
            map.insert("deliveryType".into(), Value::String(delivery_type.clone()));
        }
        if let Some(source) = &self.source {
            map.insert("source".into(), Value::String(source.clone()));
        }
        if let Some(device_model) = &self.device_model {
            map.insert("deviceModel".into(), Value::String(device_model.clone()));
        }
        if !self.device_tags.is_empty() {
            map.insert(
                "deviceTags".into(),
                Value::Array(
                    self.device_tags
                        .iter()
                        .map(|t| Value::String(t.clone()))
                        .collect(),
                ),
            );
        }

        for (key, value) in &self.extra {
            map.insert(key.clone(), value.clone());
        }

        if let Some(normal_time) = self.normal_time {
            map.insert("normalTime".into(), Value::from(normal_time));
        }
        if let Some(display_offset) = self.display_offset {
            map.insert("displayOffset".into(), Value::from(display_offset));
        }
        if let Some(ms_per24) = self.ms_per24 {
            map.insert("msPer24".into(), Value::from(ms_per24));
        }
        if let Some(normal_end) = self.normal_end {
            map.insert("normalEnd".into(), Value::from(normal_end));
        }
        if let Some(warning) = &self.warning {
            map.insert("warning".into(), Value::String(warning.clone()));
        }

        map
    }

    /// Device-local timestamp as epoch milliseconds read as UTC
    pub fn device_time_ms(&self) -> Option<i64> {
        self.device_time.map(naive_utc_ms)
    }
}

fn parse_time_field(raw: &Value) -> Option<i64> {
    match raw {
        Value::String(s) => parse_instant(s),
        Value::Number(_) => as_integer(raw),
        _ => None,
    }
}

fn as_integer(raw: &Value) -> Option<i64> {
    raw.as_i64().or_else(|| raw.as_f64().map(|f| f as i64))
}

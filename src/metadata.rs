//! Collection-wide metadata
//!
//! Derived over the unfiltered collection at query time: which glucose
//! sources are present, and the most recent insulin pump upload.

use serde::{Deserialize, Serialize};

use crate::event::{Event, EventType};
use crate::store::EventStore;

/// Device tag marking an upload as coming from an insulin pump
const INSULIN_PUMP_TAG: &str = "insulin-pump";

/// Which glucose data sources exist in the collection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BgSources {
    /// Continuous readings present
    pub cbg: bool,
    /// Fingerstick readings present
    pub smbg: bool,
    /// The preferred source: cbg when present, else smbg
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<EventType>,
}

impl BgSources {
    /// Detect sources over the unfiltered collection
    pub fn detect(store: &EventStore) -> Self {
        let all = store.view_all();
        let cbg = !all.of_type(&EventType::Cbg).is_empty();
        let smbg = !all.of_type(&EventType::Smbg).is_empty();

        let current = if cbg {
            Some(EventType::Cbg)
        } else if smbg {
            Some(EventType::Smbg)
        } else {
            None
        };

        Self { cbg, smbg, current }
    }
}

/// The most recent insulin pump upload in the collection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestPump {
    /// Device model string, empty when no pump upload exists
    pub device_model: String,
    /// Lowercased upload source, with the CareLink service mapped to its
    /// device manufacturer
    pub manufacturer: String,
}

impl LatestPump {
    /// Find the latest pump upload over the unfiltered collection
    pub fn detect(store: &EventStore) -> Self {
        let uploads = store.view_all();
        let latest = uploads
            .of_type(&EventType::Upload)
            .events()
            .filter(|e| e.device_tags.iter().any(|t| t == INSULIN_PUMP_TAG))
            .last();

        match latest {
            Some(upload) => Self::from_upload(upload),
            None => Self::default(),
        }
    }

    fn from_upload(upload: &Event) -> Self {
        let source = upload
            .source
            .as_deref()
            .unwrap_or_default()
            .to_lowercase();
        let manufacturer = if source == "carelink" {
            "medtronic".to_string()
        } else {
            source
        };

        Self {
            device_model: upload.device_model.clone().unwrap_or_default(),
            manufacturer,
        }
    }
}

/// Metadata attached to every query result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaData {
    pub latest_pump: LatestPump,
    pub bg_sources: BgSources,
}

impl MetaData {
    /// Compute all metadata over the unfiltered collection
    pub fn collect(store: &EventStore) -> Self {
        Self {
            latest_pump: LatestPump::detect(store),
            bg_sources: BgSources::detect(store),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn upload(id: &str, time: i64, source: &str, model: &str, tags: &[&str]) -> Event {
        let raw = json!({
            "id": id,
            "type": "upload",
            "time": time,
            "source": source,
            "deviceModel": model,
            "deviceTags": tags,
        });
        Event::from_value(&raw).unwrap()
    }

    #[test]
    fn test_bg_sources_prefers_cbg() {
        let mut store = EventStore::new();
        store.add(vec![
            Event::new("c", "cbg", 0).value(100.0, "mg/dL"),
            Event::new("s", "smbg", 0).value(100.0, "mg/dL"),
        ]);

        let sources = BgSources::detect(&store);
        assert!(sources.cbg);
        assert!(sources.smbg);
        assert_eq!(sources.current, Some(EventType::Cbg));
    }

    #[test]
    fn test_bg_sources_smbg_only() {
        let mut store = EventStore::new();
        store.add(vec![Event::new("s", "smbg", 0).value(100.0, "mg/dL")]);

        let sources = BgSources::detect(&store);
        assert!(!sources.cbg);
        assert_eq!(sources.current, Some(EventType::Smbg));
    }

    #[test]
    fn test_bg_sources_empty() {
        let store = EventStore::new();
        let sources = BgSources::detect(&store);
        assert_eq!(sources.current, None);
    }

    #[test]
    fn test_latest_pump_picks_most_recent_pump_upload() {
        let mut store = EventStore::new();
        store.add(vec![
            upload("u1", 1000, "Tandem", "t:slim X2", &["insulin-pump"]),
            upload("u2", 3000, "Dexcom", "G6", &["cgm"]),
            upload("u3", 2000, "Insulet", "Omnipod", &["insulin-pump"]),
        ]);

        let pump = LatestPump::detect(&store);
        // u3 is the latest upload tagged insulin-pump; u2 is ignored
        assert_eq!(pump.device_model, "Omnipod");
        assert_eq!(pump.manufacturer, "insulet");
    }

    #[test]
    fn test_latest_pump_carelink_maps_to_medtronic() {
        let mut store = EventStore::new();
        store.add(vec![upload("u1", 0, "CareLink", "723", &["insulin-pump"])]);

        let pump = LatestPump::detect(&store);
        assert_eq!(pump.manufacturer, "medtronic");
        assert_eq!(pump.device_model, "723");
    }

    #[test]
    fn test_latest_pump_defaults_when_absent() {
        let store = EventStore::new();
        let pump = LatestPump::detect(&store);
        assert_eq!(pump, LatestPump::default());
    }
}

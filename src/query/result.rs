//! Query result structures
//!
//! Produced once per query and owned by the caller. Consumers treat the
//! whole structure as read-only; per-type record lists are ordered as the
//! query's sort requested and carry only the selected fields.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::bg::BgPrefs;
use crate::datetime::TimePrefs;
use crate::metadata::MetaData;
use crate::query::endpoints::EndpointWindow;

/// A projected record: the selected fields of one normalized event
pub type ProjectedRecord = Map<String, Value>;

/// Result slice for one endpoint window
#[derive(Debug, Clone, Default, Serialize)]
pub struct WindowData {
    /// The window this slice covers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoints: Option<EndpointWindow>,
    /// Stat results keyed by stat id; only populated for the current window
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub stats: BTreeMap<String, Value>,
    /// Projected records keyed by record type tag
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, Vec<ProjectedRecord>>,
}

/// The three window slices of a result
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResultData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<WindowData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<WindowData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<WindowData>,
}

impl ResultData {
    /// Mutable access to a window slice by label
    pub(crate) fn slot_mut(&mut self, label: &str) -> &mut Option<WindowData> {
        match label {
            "current" => &mut self.current,
            "next" => &mut self.next,
            _ => &mut self.prev,
        }
    }
}

/// The assembled result of one query
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOutput {
    pub data: ResultData,
    /// The preferences the query resolved to (defaults applied)
    pub time_prefs: TimePrefs,
    pub bg_prefs: BgPrefs,
    pub meta_data: MetaData,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_window_serializes_sparse() {
        let window = WindowData::default();
        let json = serde_json::to_value(&window).unwrap();

        assert_eq!(json, serde_json::json!({}));
    }

    #[test]
    fn test_result_data_slots() {
        let mut data = ResultData::default();
        *data.slot_mut("current") = Some(WindowData::default());

        assert!(data.current.is_some());
        assert!(data.next.is_none());
        assert!(data.prev.is_none());
    }

    #[test]
    fn test_output_serializes_camel_case() {
        let output = QueryOutput {
            data: ResultData::default(),
            time_prefs: TimePrefs::default(),
            bg_prefs: BgPrefs::default(),
            meta_data: MetaData::default(),
        };

        let json = serde_json::to_value(&output).unwrap();
        assert!(json.get("timePrefs").is_some());
        assert!(json.get("bgPrefs").is_some());
        assert!(json.get("metaData").is_some());
    }
}

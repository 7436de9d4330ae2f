//! Query parameters
//!
//! A [`Query`] is constructed fresh per call and never persisted. All
//! parameters are optional; an empty query still yields metadata and
//! resolved preferences.

use serde::{Deserialize, Serialize};

use crate::bg::BgPrefs;
use crate::datetime::TimePrefs;
use crate::event::EventType;

/// Sort direction for per-type projections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Sort specification: field name plus direction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    #[serde(default)]
    pub order: SortOrder,
}

impl SortSpec {
    pub fn new(field: impl Into<String>, order: SortOrder) -> Self {
        Self {
            field: field.into(),
            order,
        }
    }

    /// Parse a "field" or "field,desc" string
    pub fn parse(spec: &str) -> Option<Self> {
        let mut parts = spec.split(',').map(str::trim);
        let field = parts.next().filter(|f| !f.is_empty())?;
        let order = match parts.next() {
            Some("desc") => SortOrder::Desc,
            _ => SortOrder::Asc,
        };
        Some(Self::new(field, order))
    }
}

/// One requested record type with its projection and sort
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeQuery {
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Fields to keep in projected records; empty keeps every field
    #[serde(default)]
    pub select: Vec<String>,
    #[serde(default)]
    pub sort: Option<SortSpec>,
}

impl TypeQuery {
    pub fn new(event_type: impl Into<EventType>) -> Self {
        Self {
            event_type: event_type.into(),
            select: Vec::new(),
            sort: None,
        }
    }

    /// Builder: set the projected fields
    pub fn select(mut self, fields: impl Into<Vec<String>>) -> Self {
        self.select = fields.into();
        self
    }

    /// Builder: set the projected fields from a comma-separated list
    pub fn select_csv(mut self, fields: &str) -> Self {
        self.select = fields
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .collect();
        self
    }

    /// Builder: set the sort
    pub fn sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort = Some(SortSpec::new(field, order));
        self
    }
}

/// Parameters for one query against a [`crate::DataSet`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    /// Half-open [start, end) window, epoch ms; absent skips all windows
    #[serde(default)]
    pub endpoints: Option<[i64; 2]>,
    /// Weekdays to keep, 0 = Sunday .. 6 = Saturday; absent keeps all
    #[serde(default)]
    pub active_days: Option<Vec<u8>>,
    /// Record types to project per window
    #[serde(default)]
    pub types: Vec<TypeQuery>,
    /// Stat identifiers to compute over the current window
    #[serde(default)]
    pub stats: Vec<String>,
    #[serde(default)]
    pub time_prefs: Option<TimePrefs>,
    #[serde(default)]
    pub bg_prefs: Option<BgPrefs>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set the query window
    pub fn endpoints(mut self, range: [i64; 2]) -> Self {
        self.endpoints = Some(range);
        self
    }

    /// Builder: set the active weekdays
    pub fn active_days(mut self, days: impl Into<Vec<u8>>) -> Self {
        self.active_days = Some(days.into());
        self
    }

    /// Builder: add a requested type
    pub fn with_type(mut self, type_query: TypeQuery) -> Self {
        self.types.push(type_query);
        self
    }

    /// Builder: set the requested stats
    pub fn stats(mut self, stats: impl Into<Vec<String>>) -> Self {
        self.stats = stats.into();
        self
    }

    /// Builder: set the requested stats from a comma-separated list
    pub fn stats_csv(mut self, stats: &str) -> Self {
        self.stats = stats
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        self
    }

    /// Builder: set timezone preferences
    pub fn time_prefs(mut self, prefs: TimePrefs) -> Self {
        self.time_prefs = Some(prefs);
        self
    }

    /// Builder: set blood glucose preferences
    pub fn bg_prefs(mut self, prefs: BgPrefs) -> Self {
        self.bg_prefs = Some(prefs);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_spec_parse() {
        let spec = SortSpec::parse("normalTime").unwrap();
        assert_eq!(spec.field, "normalTime");
        assert_eq!(spec.order, SortOrder::Asc);

        let spec = SortSpec::parse("normalTime, desc").unwrap();
        assert_eq!(spec.order, SortOrder::Desc);

        assert!(SortSpec::parse("").is_none());
    }

    #[test]
    fn test_select_csv_trims_and_drops_empty() {
        let tq = TypeQuery::new("cbg").select_csv("id, value , units,,msPer24");
        assert_eq!(tq.select, vec!["id", "value", "units", "msPer24"]);
    }

    #[test]
    fn test_query_builder() {
        let query = Query::new()
            .endpoints([0, 100])
            .active_days(vec![1, 3, 5])
            .with_type(TypeQuery::new("cbg").select_csv("id,value"))
            .stats_csv("averageGlucose, timeInRange");

        assert_eq!(query.endpoints, Some([0, 100]));
        assert_eq!(query.types.len(), 1);
        assert_eq!(query.stats, vec!["averageGlucose", "timeInRange"]);
    }

    #[test]
    fn test_query_deserializes_from_json() {
        let json = r#"{
            "endpoints": [0, 604800000],
            "activeDays": [1, 3, 5],
            "types": [{"type": "cbg", "select": ["id", "value"], "sort": {"field": "normalTime"}}],
            "stats": ["averageGlucose"]
        }"#;

        let query: Query = serde_json::from_str(json).unwrap();
        assert_eq!(query.active_days, Some(vec![1, 3, 5]));
        assert_eq!(query.types[0].event_type, EventType::Cbg);
        assert_eq!(query.types[0].sort.as_ref().unwrap().field, "normalTime");
    }
}

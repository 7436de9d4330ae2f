//! Query orchestrator
//!
//! [`DataSet`] is the public entry point: it owns the event collection
//! and answers windowed queries over it. One query runs the full
//! pipeline:
//!
//! ```text
//! Query → metadata → endpoint plan → per-window view
//!       → stats (current only) → per-type normalize / sort / project
//!       → assembled QueryOutput
//! ```
//!
//! Queries borrow the store immutably and build their own filtered view
//! snapshots, so concurrent queries need no coordination; ingestion
//! borrows mutably and is exclusive by construction.

use std::cmp::Ordering;
use std::time::Instant;

use serde_json::{Map, Value};

use crate::bg::BgPrefs;
use crate::datetime::TimePrefs;
use crate::event::Event;
use crate::metadata::MetaData;
use crate::normalize::normalize;
use crate::query::endpoints::{EndpointWindow, Endpoints};
use crate::query::error::{QueryError, QueryResult};
use crate::query::params::{Query, SortOrder, TypeQuery};
use crate::query::result::{ProjectedRecord, QueryOutput, ResultData, WindowData};
use crate::stats::{StatHandler, StatInput, StatRegistry};
use crate::store::{DedupPolicy, EventStore, FilterSet, View};

/// The engine instance: event collection plus stat dispatch table
#[derive(Default)]
pub struct DataSet {
    store: EventStore,
    stats: StatRegistry,
}

impl DataSet {
    /// An empty data set with the default dedup policy
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty data set with an explicit dedup policy
    pub fn with_dedup(dedup: DedupPolicy) -> Self {
        Self {
            store: EventStore::with_dedup(dedup),
            stats: StatRegistry::new(),
        }
    }

    /// Build a data set from raw JSON records; returns the rejected count
    pub fn from_raw(raw: &[Value]) -> (Self, usize) {
        let mut data_set = Self::new();
        let (_, rejected) = data_set.store.add_raw(raw);
        (data_set, rejected)
    }

    /// Ingest parsed events; see [`EventStore::add`]
    pub fn add(&mut self, batch: Vec<Event>) -> usize {
        self.store.add(batch)
    }

    /// Ingest raw JSON records; see [`EventStore::add_raw`]
    pub fn add_raw(&mut self, raw: &[Value]) -> (usize, usize) {
        self.store.add_raw(raw)
    }

    /// Remove events matching a predicate; see [`EventStore::remove`]
    pub fn remove(&mut self, predicate: impl FnMut(&Event) -> bool) -> usize {
        self.store.remove(predicate)
    }

    /// The underlying collection
    pub fn store(&self) -> &EventStore {
        &self.store
    }

    /// Register a custom stat handler
    pub fn register_stat(&mut self, id: impl Into<String>, handler: StatHandler) {
        self.stats.register(id, handler);
    }

    /// Run one query against the collection
    ///
    /// Data-quality problems degrade to omission; errors are reserved for
    /// structurally invalid calls (inverted endpoint range, days outside
    /// 0..=6, stats requested with no window).
    pub fn query(&self, query: &Query) -> QueryResult<QueryOutput> {
        let started = Instant::now();

        let time_prefs = query.time_prefs.unwrap_or_default();
        let bg_prefs = query.bg_prefs.unwrap_or_default();

        if let Some(days) = &query.active_days {
            if let Some(&bad) = days.iter().find(|d| **d > 6) {
                return Err(QueryError::InvalidDayOfWeek(bad));
            }
        }
        if !query.stats.is_empty() && query.endpoints.is_none() {
            return Err(QueryError::MissingEndpoints);
        }

        // Metadata always reflects the whole collection, not the window
        let meta_data = MetaData::collect(&self.store);

        let mut data = ResultData::default();

        if let Some(range) = query.endpoints {
            let mut endpoints = Endpoints::plan(range)?;
            if let Some(days) = &query.active_days {
                endpoints.apply_active_days(days);
            }

            for (label, window) in endpoints.labeled() {
                let window_data = self.run_window(
                    label,
                    &window,
                    query,
                    &time_prefs,
                    &bg_prefs,
                    &meta_data,
                )?;
                *data.slot_mut(label) = Some(window_data);
            }
        }

        tracing::debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            types = query.types.len(),
            stats = query.stats.len(),
            "query complete"
        );

        Ok(QueryOutput {
            data,
            time_prefs,
            bg_prefs,
            meta_data,
        })
    }

    fn run_window(
        &self,
        label: &str,
        window: &EndpointWindow,
        query: &Query,
        time_prefs: &TimePrefs,
        bg_prefs: &BgPrefs,
        meta_data: &MetaData,
    ) -> QueryResult<WindowData> {
        let mut filters = FilterSet::new().endpoints(window.range);
        if let Some(days) = &query.active_days {
            filters = filters.active_days(days.clone());
        }

        let view = self.store.view(&filters);
        let mut window_data = WindowData {
            endpoints: Some(*window),
            ..WindowData::default()
        };

        if label == "current" && !query.stats.is_empty() {
            let stat_started = Instant::now();
            let input = StatInput {
                view: &view,
                window,
                bg_prefs,
                bg_source: meta_data.bg_sources.current.clone(),
            };
            window_data.stats = self.stats.dispatch(&query.stats, &input);
            tracing::debug!(
                elapsed_ms = stat_started.elapsed().as_millis() as u64,
                "stats computed"
            );
        }

        for type_query in &query.types {
            let records = self.project_type(&view, type_query, time_prefs, bg_prefs);
            window_data
                .data
                .insert(type_query.event_type.tag().to_string(), records);
        }

        Ok(window_data)
    }

    /// Normalize, sort, and project one requested type within a view
    fn project_type(
        &self,
        view: &View<'_>,
        type_query: &TypeQuery,
        time_prefs: &TimePrefs,
        bg_prefs: &BgPrefs,
    ) -> Vec<ProjectedRecord> {
        let mut maps: Vec<Map<String, Value>> = view
            .of_type(&type_query.event_type)
            .events()
            .map(|event| normalize(event, time_prefs, bg_prefs).to_map())
            .collect();

        if let Some(sort) = &type_query.sort {
            maps.sort_by(|a, b| json_field_cmp(a.get(&sort.field), b.get(&sort.field)));
            if sort.order == SortOrder::Desc {
                maps.reverse();
            }
        }

        if type_query.select.is_empty() {
            return maps;
        }

        maps.into_iter()
            .map(|map| {
                let mut projected = Map::new();
                for field in &type_query.select {
                    if let Some(value) = map.get(field) {
                        projected.insert(field.clone(), value.clone());
                    }
                }
                projected
            })
            .collect()
    }
}

/// Order two optional JSON values for record sorting
///
/// Numbers order numerically, strings lexically, booleans false-first.
/// Records missing the field sort first; mixed kinds keep their relative
/// order (the sort is stable).
fn json_field_cmp(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (a, b) {
            (Value::Number(x), Value::Number(y)) => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .unwrap_or(Ordering::Equal),
            (Value::String(x), Value::String(y)) => x.cmp(y),
            (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
            _ => Ordering::Equal,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bg::GlucoseUnit;
    use crate::datetime::{MS_IN_DAY, MS_IN_HOUR};
    use crate::query::params::SortSpec;
    use serde_json::json;

    // 2021-06-13T00:00:00Z, a Sunday
    const SUNDAY: i64 = 1_623_542_400_000;

    fn week_of_data() -> Vec<Event> {
        let mut events = Vec::new();
        for day in 0..7 {
            let base = SUNDAY + day * MS_IN_DAY;
            events.push(
                Event::new(format!("cbg-{day}"), "cbg", base + 8 * MS_IN_HOUR)
                    .value(100.0 + day as f64 * 10.0, "mg/dL"),
            );
        }
        events.push(
            Event::new("bolus-0", "bolus", SUNDAY + 12 * MS_IN_HOUR).field("normal", json!(4.0)),
        );
        events
    }

    #[test]
    fn test_query_three_windows() {
        let mut data_set = DataSet::new();
        data_set.add(week_of_data());

        let output = data_set
            .query(&Query::new().endpoints([SUNDAY, SUNDAY + 7 * MS_IN_DAY]))
            .unwrap();

        let current = output.data.current.unwrap();
        let prev = output.data.prev.unwrap();
        let next = output.data.next.unwrap();

        let current_endpoints = current.endpoints.unwrap();
        assert_eq!(current_endpoints.days, 7.0);
        assert_eq!(
            prev.endpoints.unwrap().range,
            [SUNDAY - 7 * MS_IN_DAY, SUNDAY]
        );
        assert_eq!(
            next.endpoints.unwrap().range,
            [SUNDAY + 7 * MS_IN_DAY, SUNDAY + 14 * MS_IN_DAY]
        );
    }

    #[test]
    fn test_query_without_endpoints_yields_metadata_only() {
        let mut data_set = DataSet::new();
        data_set.add(week_of_data());

        let output = data_set.query(&Query::new()).unwrap();

        assert!(output.data.current.is_none());
        assert!(output.meta_data.bg_sources.cbg);
    }

    #[test]
    fn test_query_projects_selected_fields() {
        let mut data_set = DataSet::new();
        data_set.add(week_of_data());

        let output = data_set
            .query(
                &Query::new()
                    .endpoints([SUNDAY, SUNDAY + 7 * MS_IN_DAY])
                    .with_type(TypeQuery::new("cbg").select_csv("id,value,units")),
            )
            .unwrap();

        let current = output.data.current.unwrap();
        let records = &current.data["cbg"];
        assert_eq!(records.len(), 7);
        for record in records {
            assert_eq!(record.len(), 3);
            assert!(record.contains_key("id"));
            assert!(record.contains_key("value"));
            assert!(!record.contains_key("time"));
        }
    }

    #[test]
    fn test_query_converts_units_in_projection() {
        let mut data_set = DataSet::new();
        data_set.add(vec![
            Event::new("a", "cbg", SUNDAY + 1000).value(180.0, "mg/dL")
        ]);

        let output = data_set
            .query(
                &Query::new()
                    .endpoints([SUNDAY, SUNDAY + 7 * MS_IN_DAY])
                    .bg_prefs(BgPrefs::for_unit(GlucoseUnit::MmolL))
                    .with_type(TypeQuery::new("cbg").select_csv("value,units")),
            )
            .unwrap();

        let current = output.data.current.unwrap();
        let record = &current.data["cbg"][0];
        assert!((record["value"].as_f64().unwrap() - 9.991366).abs() < 1e-5);
        assert_eq!(record["units"], json!("mmol/L"));
    }

    #[test]
    fn test_query_active_days_filter() {
        let mut data_set = DataSet::new();
        data_set.add(week_of_data());

        let output = data_set
            .query(
                &Query::new()
                    .endpoints([SUNDAY, SUNDAY + 7 * MS_IN_DAY])
                    .active_days(vec![1, 3, 5])
                    .with_type(TypeQuery::new("cbg").select_csv("id")),
            )
            .unwrap();

        let current = output.data.current.unwrap();
        let ids: Vec<&str> = current.data["cbg"]
            .iter()
            .map(|r| r["id"].as_str().unwrap())
            .collect();

        // Mon/Wed/Fri only
        assert_eq!(ids, vec!["cbg-1", "cbg-3", "cbg-5"]);
        assert_eq!(current.endpoints.unwrap().active_days, 3.0);
    }

    #[test]
    fn test_query_sort_desc() {
        let mut data_set = DataSet::new();
        data_set.add(week_of_data());

        let mut type_query = TypeQuery::new("cbg").select_csv("id,value");
        type_query.sort = Some(SortSpec::parse("value,desc").unwrap());

        let output = data_set
            .query(
                &Query::new()
                    .endpoints([SUNDAY, SUNDAY + 7 * MS_IN_DAY])
                    .with_type(type_query),
            )
            .unwrap();

        let current = output.data.current.unwrap();
        let values: Vec<f64> = current.data["cbg"]
            .iter()
            .map(|r| r["value"].as_f64().unwrap())
            .collect();

        let mut sorted = values.clone();
        sorted.sort_by(|a, b| b.partial_cmp(a).unwrap());
        assert_eq!(values, sorted);
    }

    #[test]
    fn test_query_stats_current_window_only() {
        let mut data_set = DataSet::new();
        data_set.add(week_of_data());

        let output = data_set
            .query(
                &Query::new()
                    .endpoints([SUNDAY, SUNDAY + 7 * MS_IN_DAY])
                    .stats_csv("averageGlucose,totalInsulin,bogusStat"),
            )
            .unwrap();

        let current = output.data.current.unwrap();
        assert!(current.stats.contains_key("averageGlucose"));
        assert!(current.stats.contains_key("totalInsulin"));
        // unknown ids are omitted, not errors
        assert!(!current.stats.contains_key("bogusStat"));

        // neighbors carry no stats
        assert!(output.data.prev.unwrap().stats.is_empty());
        assert!(output.data.next.unwrap().stats.is_empty());
    }

    #[test]
    fn test_query_stats_without_endpoints_is_typed_error() {
        let data_set = DataSet::new();
        let err = data_set
            .query(&Query::new().stats_csv("averageGlucose"))
            .unwrap_err();

        assert!(matches!(err, QueryError::MissingEndpoints));
    }

    #[test]
    fn test_query_invalid_day_is_typed_error() {
        let data_set = DataSet::new();
        let err = data_set
            .query(
                &Query::new()
                    .endpoints([0, MS_IN_DAY])
                    .active_days(vec![1, 9]),
            )
            .unwrap_err();

        assert!(matches!(err, QueryError::InvalidDayOfWeek(9)));
    }

    #[test]
    fn test_query_unknown_type_degrades_to_empty() {
        let mut data_set = DataSet::new();
        data_set.add(week_of_data());

        let output = data_set
            .query(
                &Query::new()
                    .endpoints([SUNDAY, SUNDAY + 7 * MS_IN_DAY])
                    .with_type(TypeQuery::new("sleepDiary")),
            )
            .unwrap();

        let current = output.data.current.unwrap();
        assert_eq!(current.data["sleepDiary"].len(), 0);
    }

    #[test]
    fn test_query_does_not_mutate_stored_records() {
        let mut data_set = DataSet::new();
        data_set.add(vec![
            Event::new("a", "cbg", SUNDAY + 1000).value(180.0, "mg/dL")
        ]);

        data_set
            .query(
                &Query::new()
                    .endpoints([SUNDAY, SUNDAY + MS_IN_DAY])
                    .bg_prefs(BgPrefs::for_unit(GlucoseUnit::MmolL))
                    .with_type(TypeQuery::new("cbg")),
            )
            .unwrap();

        // stored record still carries the ingested units and no derived fields
        let stored = data_set.store().get("a").unwrap();
        assert_eq!(stored.value, Some(180.0));
        assert_eq!(stored.units.as_deref(), Some("mg/dL"));
        assert!(stored.normal_time.is_none());
    }

    #[test]
    fn test_repeated_queries_are_consistent() {
        let mut data_set = DataSet::new();
        data_set.add(week_of_data());

        let query = Query::new()
            .endpoints([SUNDAY, SUNDAY + 7 * MS_IN_DAY])
            .active_days(vec![1, 3, 5])
            .with_type(TypeQuery::new("cbg").select_csv("id,value"));

        let first = serde_json::to_value(data_set.query(&query).unwrap()).unwrap();
        let second = serde_json::to_value(data_set.query(&query).unwrap()).unwrap();

        // no filter state leaks between runs
        assert_eq!(first, second);
    }

    #[test]
    fn test_custom_stat_registration() {
        let mut data_set = DataSet::new();
        data_set.add(week_of_data());
        data_set.register_stat(
            "recordCount",
            Box::new(|input| json!({ "value": input.view.len() })),
        );

        let output = data_set
            .query(
                &Query::new()
                    .endpoints([SUNDAY, SUNDAY + 7 * MS_IN_DAY])
                    .stats_csv("recordCount"),
            )
            .unwrap();

        let current = output.data.current.unwrap();
        assert_eq!(current.stats["recordCount"], json!({ "value": 8 }));
    }

    #[test]
    fn test_json_field_cmp() {
        assert_eq!(
            json_field_cmp(Some(&json!(1)), Some(&json!(2))),
            Ordering::Less
        );
        assert_eq!(
            json_field_cmp(Some(&json!("b")), Some(&json!("a"))),
            Ordering::Greater
        );
        assert_eq!(json_field_cmp(None, Some(&json!(1))), Ordering::Less);
        assert_eq!(json_field_cmp(None, None), Ordering::Equal);
    }
}

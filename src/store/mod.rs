//! Event store: the deduplicated collection and its dimensions
//!
//! `EventStore` owns the in-memory event collection and maintains four
//! always-current dimensions over it: absolute time, device time, UTC day
//! of week, and record type. Ingestion deduplicates by id and rebuilds the
//! dimensions wholesale.
//!
//! # Filtering model
//!
//! Filters are plain values. A [`FilterSet`] describes the active filters
//! and [`EventStore::view`] resolves it into an immutable [`View`]: the
//! AND of every per-dimension membership mask. Nothing on the store
//! mutates during a query, so any number of views can be built and read
//! concurrently; ingestion takes `&mut self` and is therefore exclusive
//! by construction.
//!
//! ```text
//! Query: "cbg readings, Mon/Wed/Fri, June"
//!        ↓
//! time dimension:  filter_range(jun1, jul1)   → mask A
//! day dimension:   filter_predicate({1,3,5})  → mask B
//! type dimension:  filter_exact("cbg")        → mask C
//!        ↓
//! View = A ∧ B ∧ C, iterated in time order
//! ```

mod dimension;

pub use dimension::{Dimension, SlotSet};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::datetime::day_of_week_utc;
use crate::event::{Event, EventType};

/// Resolution rule for duplicate ids inside one ingest batch
///
/// Duplicate ids across batches are not configurable: the record already
/// in the collection always wins and the incoming duplicate is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DedupPolicy {
    /// Keep the first occurrence of an id within a batch
    First,
    /// Keep the last occurrence of an id within a batch
    #[default]
    Last,
}

/// Named filters composing by logical AND
///
/// An unset field is the cleared state for that dimension. The orchestrator
/// drives `endpoints`, `active_days`, and `event_type`; `device_time` is
/// exposed for direct callers filtering on the device clock.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSet {
    /// Half-open [start, end) range on absolute time, epoch ms
    pub endpoints: Option<[i64; 2]>,
    /// Days of week to keep, 0 = Sunday .. 6 = Saturday
    pub active_days: Option<Vec<u8>>,
    /// Exact record type
    pub event_type: Option<EventType>,
    /// Half-open [start, end) range on the device clock, epoch ms
    pub device_time: Option<[i64; 2]>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: restrict to a half-open time range
    pub fn endpoints(mut self, range: [i64; 2]) -> Self {
        self.endpoints = Some(range);
        self
    }

    /// Builder: restrict to a set of weekdays
    pub fn active_days(mut self, days: impl Into<Vec<u8>>) -> Self {
        self.active_days = Some(days.into());
        self
    }

    /// Builder: restrict to one record type
    pub fn event_type(mut self, event_type: impl Into<EventType>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    /// Builder: restrict to a half-open device-clock range
    pub fn device_time(mut self, range: [i64; 2]) -> Self {
        self.device_time = Some(range);
        self
    }
}

/// The deduplicated event collection with its dimensions
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<Event>,
    ids: HashMap<String, usize>,
    dedup: DedupPolicy,

    by_time: Dimension<i64>,
    by_device_time: Dimension<Option<i64>>,
    by_day_of_week: Dimension<u8>,
    by_type: Dimension<String>,
}

impl EventStore {
    /// An empty store with the default dedup policy
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty store with an explicit dedup policy
    pub fn with_dedup(dedup: DedupPolicy) -> Self {
        Self {
            dedup,
            ..Self::default()
        }
    }

    /// Ingest a batch of events
    ///
    /// Within the batch, duplicate ids resolve per the configured
    /// [`DedupPolicy`]. Ids already present in the collection are dropped.
    /// Returns the number of events actually added.
    pub fn add(&mut self, batch: Vec<Event>) -> usize {
        let incoming = batch.len();

        let mut kept: Vec<Event> = Vec::with_capacity(batch.len());
        let mut batch_ids: HashMap<String, usize> = HashMap::new();

        for event in batch {
            if self.ids.contains_key(&event.id) {
                continue;
            }
            match batch_ids.get(&event.id).copied() {
                Some(pos) => {
                    if self.dedup == DedupPolicy::Last {
                        kept[pos] = event;
                    }
                }
                None => {
                    batch_ids.insert(event.id.clone(), kept.len());
                    kept.push(event);
                }
            }
        }

        let added = kept.len();
        for event in kept {
            self.ids.insert(event.id.clone(), self.events.len());
            self.events.push(event);
        }

        self.rebuild_dimensions();
        tracing::debug!(incoming, added, total = self.events.len(), "ingested batch");
        added
    }

    /// Ingest a batch of raw JSON records, dropping malformed entries
    ///
    /// Returns (added, rejected) counts. Rejection is silent by contract.
    pub fn add_raw(&mut self, raw: &[serde_json::Value]) -> (usize, usize) {
        let parsed: Vec<Event> = raw.iter().filter_map(Event::from_value).collect();
        let rejected = raw.len() - parsed.len();
        if rejected > 0 {
            tracing::debug!(rejected, "dropped malformed records");
        }
        (self.add(parsed), rejected)
    }

    /// Remove all events matching the predicate; returns the removed count
    pub fn remove(&mut self, mut predicate: impl FnMut(&Event) -> bool) -> usize {
        let before = self.events.len();
        self.events.retain(|event| !predicate(event));
        let removed = before - self.events.len();

        if removed > 0 {
            self.ids = self
                .events
                .iter()
                .enumerate()
                .map(|(slot, event)| (event.id.clone(), slot))
                .collect();
            self.rebuild_dimensions();
        }
        removed
    }

    /// Number of events in the collection
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the collection is empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// All events, unfiltered, in insertion slot order
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Look up an event by id
    pub fn get(&self, id: &str) -> Option<&Event> {
        self.ids.get(id).map(|&slot| &self.events[slot])
    }

    /// Resolve a filter set into an immutable view snapshot
    pub fn view(&self, filters: &FilterSet) -> View<'_> {
        let mut mask = SlotSet::full(self.events.len());

        if let Some([start, end]) = filters.endpoints {
            mask.intersect_with(&self.by_time.filter_range(&start, &end));
        }
        if let Some(days) = &filters.active_days {
            mask.intersect_with(&self.by_day_of_week.filter_predicate(|d| days.contains(d)));
        }
        if let Some(event_type) = &filters.event_type {
            mask.intersect_with(&self.by_type.filter_exact(&event_type.tag().to_string()));
        }
        if let Some([start, end]) = filters.device_time {
            mask.intersect_with(
                &self
                    .by_device_time
                    .filter_range(&Some(start), &Some(end)),
            );
        }

        View { store: self, mask }
    }

    /// The unfiltered view over the whole collection
    pub fn view_all(&self) -> View<'_> {
        self.view(&FilterSet::new())
    }

    fn rebuild_dimensions(&mut self) {
        self.by_time = Dimension::build(self.events.iter().map(|e| e.time).collect());
        self.by_device_time =
            Dimension::build(self.events.iter().map(Event::device_time_ms).collect());
        self.by_day_of_week =
            Dimension::build(self.events.iter().map(|e| day_of_week_utc(e.time)).collect());
        self.by_type =
            Dimension::build(self.events.iter().map(|e| e.event_type.tag().to_string()).collect());
    }
}

/// An immutable filtered snapshot of the collection
///
/// Views are cheap values tied to the store's borrow; narrowing one never
/// affects the store or any other view.
#[derive(Debug, Clone)]
pub struct View<'a> {
    store: &'a EventStore,
    mask: SlotSet,
}

impl<'a> View<'a> {
    /// Number of events visible through this view
    pub fn len(&self) -> usize {
        self.mask.count()
    }

    /// Whether the view is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visible events in ascending absolute-time order
    pub fn events(&self) -> impl Iterator<Item = &'a Event> + '_ {
        self.store
            .by_time
            .ordered_slots()
            .filter(move |&slot| self.mask.contains(slot))
            .map(move |slot| &self.store.events[slot])
    }

    /// Narrow the view to one record type
    pub fn of_type(&self, event_type: &EventType) -> View<'a> {
        let mut mask = self.mask.clone();
        mask.intersect_with(
            &self
                .store
                .by_type
                .filter_exact(&event_type.tag().to_string()),
        );
        View {
            store: self.store,
            mask,
        }
    }

    /// Membership test against the underlying slot mask
    pub fn contains(&self, event_id: &str) -> bool {
        self.store
            .ids
            .get(event_id)
            .is_some_and(|&slot| self.mask.contains(slot))
    }
}

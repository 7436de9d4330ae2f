//! # Diatrend
//!
//! Diabetes Time-Series Query Engine - in-memory multi-dimensional
//! indexing, filtering, and statistics over diabetes device data.
//!
//! ## Features
//!
//! - **Multi-dimensional index**: sorted dimensions over time, device
//!   time, day of week, and record type; filters AND-compose across all
//!   of them
//! - **Display normalization**: timezone- and DST-correct display times,
//!   mg/dL and mmol/L conversion
//! - **Windowed queries**: a requested window plus its equal-length
//!   previous and next neighbors, answered in one pass
//! - **Summary statistics**: average glucose, time in range, insulin
//!   totals, and friends, with open registration for custom stats
//! - **Safe concurrency**: queries build immutable view snapshots, so
//!   readers never coordinate; ingestion is exclusive by construction
//!
//! ## Modules
//!
//! - [`event`]: the event record model
//! - [`store`]: the deduplicated collection and its dimensions
//! - [`query`]: the windowed query pipeline
//! - [`stats`]: statistic dispatch and built-in computations
//! - [`normalize`]: display-time and display-unit derivation
//!
//! ## Quick Start
//!
//! ```rust
//! use diatrend::{DataSet, Event, Query, TypeQuery};
//!
//! fn main() -> Result<(), diatrend::QueryError> {
//!     let mut data = DataSet::new();
//!     data.add(vec![
//!         Event::new("r1", "cbg", 1_623_542_400_000).value(120.0, "mg/dL"),
//!     ]);
//!
//!     let day = 86_400_000;
//!     let output = data.query(
//!         &Query::new()
//!             .endpoints([1_623_542_400_000, 1_623_542_400_000 + 7 * day])
//!             .with_type(TypeQuery::new("cbg").select_csv("id,value,units,msPer24"))
//!             .stats_csv("averageGlucose,timeInRange"),
//!     )?;
//!
//!     let current = output.data.current.unwrap();
//!     println!("{} readings", current.data["cbg"].len());
//!
//!     Ok(())
//! }
//! ```

pub mod bg;
pub mod config;
pub mod datetime;
pub mod event;
pub mod metadata;
pub mod normalize;
pub mod query;
pub mod stats;
pub mod store;

// Re-export top-level types for convenience
pub use bg::{BgBounds, BgClass, BgPrefs, GlucoseUnit, MGDL_PER_MMOLL};

pub use datetime::{TimePrefs, MS_IN_DAY, MS_IN_HOUR, MS_IN_MIN};

pub use event::{Event, EventType};

pub use store::{DedupPolicy, Dimension, EventStore, FilterSet, SlotSet, View};

pub use query::{
    DataSet, EndpointWindow, Endpoints, ProjectedRecord, Query, QueryError, QueryOutput,
    QueryResult, ResultData, SortOrder, SortSpec, TypeQuery, WindowData,
};

pub use stats::{Stat, StatHandler, StatInput, StatRegistry};

pub use metadata::{BgSources, LatestPump, MetaData};

pub use config::{Config, ConfigError, DisplayConfig, EngineConfig, LoggingConfig};

//! Statistic dispatch
//!
//! Maps requested stat identifiers onto computation routines and runs
//! them against the current window's filtered view. The known statistics
//! form a closed enum so dispatch is exhaustively checked, while a
//! registration table keeps the set open: callers may register custom
//! handlers under new identifiers. Unknown identifiers are skipped
//! silently so stat lists stay forward-compatible.

mod compute;

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use crate::bg::BgPrefs;
use crate::event::EventType;
use crate::query::endpoints::EndpointWindow;
use crate::store::View;

/// Everything a stat computation may read; nothing it may mutate
pub struct StatInput<'a> {
    /// The current window's filtered view (endpoints + active days applied)
    pub view: &'a View<'a>,
    /// The current endpoint window
    pub window: &'a EndpointWindow,
    /// Display-unit preferences; glucose stats convert into these
    pub bg_prefs: &'a BgPrefs,
    /// Preferred glucose source for the collection (cbg over smbg)
    pub bg_source: Option<EventType>,
}

/// Handler type for registered custom statistics
pub type StatHandler = Box<dyn Fn(&StatInput) -> Value + Send + Sync>;

/// The known statistic kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stat {
    AverageGlucose,
    StandardDev,
    CoefficientOfVariation,
    GlucoseManagementIndicator,
    ReadingsInRange,
    TimeInRange,
    SensorUsage,
    TotalInsulin,
    AverageDailyDose,
    Carbs,
}

impl Stat {
    /// Parse a stat identifier; unknown ids yield `None`
    pub fn parse(id: &str) -> Option<Self> {
        match id {
            "averageGlucose" => Some(Stat::AverageGlucose),
            "standardDev" => Some(Stat::StandardDev),
            "coefficientOfVariation" => Some(Stat::CoefficientOfVariation),
            "glucoseManagementIndicator" => Some(Stat::GlucoseManagementIndicator),
            "readingsInRange" => Some(Stat::ReadingsInRange),
            "timeInRange" => Some(Stat::TimeInRange),
            "sensorUsage" => Some(Stat::SensorUsage),
            "totalInsulin" => Some(Stat::TotalInsulin),
            "averageDailyDose" => Some(Stat::AverageDailyDose),
            "carbs" => Some(Stat::Carbs),
            _ => None,
        }
    }

    /// The identifier this stat answers to
    pub fn id(self) -> &'static str {
        match self {
            Stat::AverageGlucose => "averageGlucose",
            Stat::StandardDev => "standardDev",
            Stat::CoefficientOfVariation => "coefficientOfVariation",
            Stat::GlucoseManagementIndicator => "glucoseManagementIndicator",
            Stat::ReadingsInRange => "readingsInRange",
            Stat::TimeInRange => "timeInRange",
            Stat::SensorUsage => "sensorUsage",
            Stat::TotalInsulin => "totalInsulin",
            Stat::AverageDailyDose => "averageDailyDose",
            Stat::Carbs => "carbs",
        }
    }

    /// All known stats
    pub fn all() -> &'static [Stat] {
        &[
            Stat::AverageGlucose,
            Stat::StandardDev,
            Stat::CoefficientOfVariation,
            Stat::GlucoseManagementIndicator,
            Stat::ReadingsInRange,
            Stat::TimeInRange,
            Stat::SensorUsage,
            Stat::TotalInsulin,
            Stat::AverageDailyDose,
            Stat::Carbs,
        ]
    }

    /// Run this stat's computation
    pub fn compute(self, input: &StatInput) -> Value {
        match self {
            Stat::AverageGlucose => compute::average_glucose(input),
            Stat::StandardDev => compute::standard_dev(input),
            Stat::CoefficientOfVariation => compute::coefficient_of_variation(input),
            Stat::GlucoseManagementIndicator => compute::glucose_management_indicator(input),
            Stat::ReadingsInRange => compute::readings_in_range(input),
            Stat::TimeInRange => compute::time_in_range(input),
            Stat::SensorUsage => compute::sensor_usage(input),
            Stat::TotalInsulin => compute::total_insulin(input),
            Stat::AverageDailyDose => compute::average_daily_dose(input),
            Stat::Carbs => compute::carbs(input),
        }
    }
}

/// Dispatch table: built-in stats plus registered custom handlers
///
/// Custom handlers are consulted first, so a registration may also
/// override a built-in id for a session.
#[derive(Default)]
pub struct StatRegistry {
    custom: HashMap<String, StatHandler>,
}

impl StatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a custom handler under an identifier
    pub fn register(&mut self, id: impl Into<String>, handler: StatHandler) {
        self.custom.insert(id.into(), handler);
    }

    /// Compute the requested stats; unknown ids are skipped
    pub fn dispatch(&self, ids: &[String], input: &StatInput) -> BTreeMap<String, Value> {
        let mut results = BTreeMap::new();

        for id in ids {
            if let Some(handler) = self.custom.get(id) {
                results.insert(id.clone(), handler(input));
            } else if let Some(stat) = Stat::parse(id) {
                results.insert(id.clone(), stat.compute(input));
            } else {
                tracing::debug!(stat = %id, "skipping unknown stat id");
            }
        }

        results
    }
}

//! Blood glucose units and clinical bounds
//!
//! Glucose values arrive in either mg/dL or mmol/L depending on the
//! source device and locale. This module provides the unit enum, the
//! canonical conversion between the two, and the clinical threshold
//! bounds used to classify readings for range statistics.

use serde::{Deserialize, Serialize};

/// Milligrams-per-deciliter in one millimole-per-liter of glucose
pub const MGDL_PER_MMOLL: f64 = 18.01559;

/// Display ceiling for mg/dL charts
pub const MGDL_CLAMP_TOP: f64 = 400.0;

/// Display ceiling for mmol/L charts
pub const MMOLL_CLAMP_TOP: f64 = 22.5;

/// Blood glucose measurement unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GlucoseUnit {
    #[serde(rename = "mg/dL")]
    #[default]
    MgDl,
    #[serde(rename = "mmol/L")]
    MmolL,
}

impl GlucoseUnit {
    /// Get the unit label as it appears on records
    pub fn label(self) -> &'static str {
        match self {
            GlucoseUnit::MgDl => "mg/dL",
            GlucoseUnit::MmolL => "mmol/L",
        }
    }

    /// Parse a unit label, accepting the common spelling variants
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "mg/dL" | "mg/dl" => Some(GlucoseUnit::MgDl),
            "mmol/L" | "mmol/l" => Some(GlucoseUnit::MmolL),
            _ => None,
        }
    }

    /// Convert a value expressed in this unit into the target unit
    pub fn convert(self, value: f64, target: GlucoseUnit) -> f64 {
        match (self, target) {
            (GlucoseUnit::MmolL, GlucoseUnit::MgDl) => convert_to_mgdl(value),
            (GlucoseUnit::MgDl, GlucoseUnit::MmolL) => convert_to_mmoll(value),
            _ => value,
        }
    }
}

impl std::fmt::Display for GlucoseUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Convert an mmol/L value to mg/dL
pub fn convert_to_mgdl(value: f64) -> f64 {
    value * MGDL_PER_MMOLL
}

/// Convert an mg/dL value to mmol/L
pub fn convert_to_mmoll(value: f64) -> f64 {
    value / MGDL_PER_MMOLL
}

/// Clinical threshold bounds for classifying glucose readings
///
/// All thresholds are expressed in the unit the bounds were built for;
/// callers are expected to keep bounds and values in the same unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BgBounds {
    /// Severe hypoglycemia threshold
    pub very_low_threshold: f64,
    /// Lower edge of the target range
    pub target_lower_bound: f64,
    /// Upper edge of the target range
    pub target_upper_bound: f64,
    /// Severe hyperglycemia threshold
    pub very_high_threshold: f64,
    /// Sensor clamp ceiling
    pub clamp_threshold: f64,
}

impl BgBounds {
    /// Default bounds for mg/dL: 54 / 70 / 180 / 250, clamp 600
    pub fn default_mgdl() -> Self {
        Self {
            very_low_threshold: 54.0,
            target_lower_bound: 70.0,
            target_upper_bound: 180.0,
            very_high_threshold: 250.0,
            clamp_threshold: 600.0,
        }
    }

    /// Default bounds for mmol/L: 3.0 / 3.9 / 10.0 / 13.9, clamp 33.3
    pub fn default_mmoll() -> Self {
        Self {
            very_low_threshold: 3.0,
            target_lower_bound: 3.9,
            target_upper_bound: 10.0,
            very_high_threshold: 13.9,
            clamp_threshold: 33.3,
        }
    }

    /// Default bounds for a given unit
    pub fn for_unit(unit: GlucoseUnit) -> Self {
        match unit {
            GlucoseUnit::MgDl => Self::default_mgdl(),
            GlucoseUnit::MmolL => Self::default_mmoll(),
        }
    }

    /// Classify a reading against these bounds
    pub fn classify(&self, value: f64) -> BgClass {
        if value < self.very_low_threshold {
            BgClass::VeryLow
        } else if value < self.target_lower_bound {
            BgClass::Low
        } else if value <= self.target_upper_bound {
            BgClass::Target
        } else if value <= self.very_high_threshold {
            BgClass::High
        } else {
            BgClass::VeryHigh
        }
    }
}

impl Default for BgBounds {
    fn default() -> Self {
        Self::default_mgdl()
    }
}

/// Caller blood-glucose preferences: display unit plus classification bounds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BgPrefs {
    #[serde(default)]
    pub bg_units: GlucoseUnit,
    #[serde(default)]
    pub bg_bounds: BgBounds,
}

impl BgPrefs {
    /// Preferences for a unit with that unit's default bounds
    pub fn for_unit(unit: GlucoseUnit) -> Self {
        Self {
            bg_units: unit,
            bg_bounds: BgBounds::for_unit(unit),
        }
    }
}

impl Default for BgPrefs {
    fn default() -> Self {
        Self::for_unit(GlucoseUnit::MgDl)
    }
}

/// Classification of a glucose reading against [`BgBounds`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BgClass {
    VeryLow,
    Low,
    Target,
    High,
    VeryHigh,
}

impl BgClass {
    /// All classes in ascending order, for iteration
    pub fn all() -> &'static [BgClass] {
        &[
            BgClass::VeryLow,
            BgClass::Low,
            BgClass::Target,
            BgClass::High,
            BgClass::VeryHigh,
        ]
    }

    /// Key used for this class in stat result structures
    pub fn key(self) -> &'static str {
        match self {
            BgClass::VeryLow => "veryLow",
            BgClass::Low => "low",
            BgClass::Target => "target",
            BgClass::High => "high",
            BgClass::VeryHigh => "veryHigh",
        }
    }
}

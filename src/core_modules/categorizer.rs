// THEORY:
// A merged exposure's duration says how long an opponent could have been shot.
// The categorizer buckets that duration into a tactical label: exposures that
// are too short to react to, ordinary peeks, and exposures long enough to be a
// real vulnerability.

use crate::error::{ExposureError, Result};
use serde::Serialize;
use std::fmt;

pub const DEFAULT_FLASH_BELOW: f64 = 0.2;
pub const DEFAULT_STANDARD_BELOW: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum TacticalCategory {
    /// Too brief to be actionable; usually a detector flicker.
    #[serde(rename = "Flash/Noise")]
    FlashNoise,
    Standard,
    #[serde(rename = "High Vulnerability")]
    HighVulnerability,
}

impl TacticalCategory {
    pub const ALL: [TacticalCategory; 3] = [
        TacticalCategory::FlashNoise,
        TacticalCategory::Standard,
        TacticalCategory::HighVulnerability,
    ];

    pub fn label(self) -> &'static str {
        match self {
            TacticalCategory::FlashNoise => "Flash/Noise",
            TacticalCategory::Standard => "Standard",
            TacticalCategory::HighVulnerability => "High Vulnerability",
        }
    }
}

impl fmt::Display for TacticalCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Duration boundaries, in seconds, between the tactical categories.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategoryThresholds {
    /// Durations strictly below this are `FlashNoise`.
    pub flash_below: f64,
    /// Durations strictly below this (and not flash) are `Standard`.
    pub standard_below: f64,
}

impl Default for CategoryThresholds {
    fn default() -> Self {
        Self {
            flash_below: DEFAULT_FLASH_BELOW,
            standard_below: DEFAULT_STANDARD_BELOW,
        }
    }
}

impl CategoryThresholds {
    pub fn new(flash_below: f64, standard_below: f64) -> Result<Self> {
        let thresholds = Self {
            flash_below,
            standard_below,
        };
        thresholds.validate()?;
        Ok(thresholds)
    }

    pub fn validate(&self) -> Result<()> {
        let ordered = 0.0 <= self.flash_below && self.flash_below <= self.standard_below;
        if !self.flash_below.is_finite() || !self.standard_below.is_finite() || !ordered {
            return Err(ExposureError::Configuration(format!(
                "category thresholds must satisfy 0 <= flash ({}) <= standard ({})",
                self.flash_below, self.standard_below
            )));
        }
        Ok(())
    }

    pub fn categorize(&self, duration: f64) -> TacticalCategory {
        if duration < self.flash_below {
            TacticalCategory::FlashNoise
        } else if duration < self.standard_below {
            TacticalCategory::Standard
        } else {
            TacticalCategory::HighVulnerability
        }
    }
}

/// Categorizes a duration with the default thresholds.
pub fn categorize(duration: f64) -> TacticalCategory {
    CategoryThresholds::default().categorize(duration)
}

use serde::{Deserialize, Serialize};

use super::{ensure_positive, Validate};
use crate::error::ConfigError;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TrackConfig {
    /// Centerline length in metres.
    pub length: f64,
    /// Share of the length taken by the two straights together.
    pub straight_fraction: f64,
    /// Posted speed limit in m/s.
    pub speed_limit: f64,
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self {
            length: 1200.0,
            straight_fraction: 0.4,
            speed_limit: 27.8,
        }
    }
}

impl Validate for TrackConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        ensure_positive("track.length", self.length)?;
        ensure_positive("track.speed_limit", self.speed_limit)?;

        // A fraction of 1.0 would leave no room for the arcs
        if !self.straight_fraction.is_finite() || !(0.0..1.0).contains(&self.straight_fraction) {
            return Err(ConfigError::invalid(
                "track.straight_fraction",
                format!("must be in range [0, 1), got {}", self.straight_fraction),
            ));
        }

        Ok(())
    }
}

use serde::{Deserialize, Serialize};

use super::{ensure_non_negative, ensure_positive, ensure_unit_interval, Validate};
use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationMode {
    /// Position tracked as arc-length along the centerline.
    ArcLength,
    /// Independent x/y integration, reprojected onto the track each sub-step.
    Planar,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Fixed physics sub-step in seconds.
    pub dt: f64,
    /// Simulated seconds per wall-clock second.
    pub speed_multiplier: f64,
    pub max_substeps_per_frame: u32,
    pub integration_mode: IntegrationMode,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            dt: 0.02,
            speed_multiplier: 1.0,
            max_substeps_per_frame: 16,
            integration_mode: IntegrationMode::ArcLength,
        }
    }
}

impl Validate for PhysicsConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        ensure_positive("physics.dt", self.dt)?;
        if self.dt > 0.25 {
            return Err(ConfigError::invalid("physics.dt", "must not exceed 0.25 s"));
        }
        ensure_positive("physics.speed_multiplier", self.speed_multiplier)?;
        if self.max_substeps_per_frame == 0 {
            return Err(ConfigError::invalid(
                "physics.max_substeps_per_frame",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Feature toggles, resolved once when the simulation is built.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineOptions {
    pub vectorized_engine_enabled: bool,
    pub adaptive_timestep_enabled: bool,
    pub event_scheduler_enabled: bool,
    /// Sight-line tests in perception. When off, the nearest vehicle ahead is the leader.
    pub occlusion_enabled: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            vectorized_engine_enabled: true,
            adaptive_timestep_enabled: false,
            event_scheduler_enabled: true,
            occlusion_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PerceptionConfig {
    /// Maximum centre-to-centre look-ahead distance in metres.
    pub visual_range: f64,
    /// Standstill buffer s0 in metres.
    pub standstill_gap: f64,
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            visual_range: 200.0,
            standstill_gap: 2.0,
        }
    }
}

impl Validate for PerceptionConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        ensure_positive("perception.visual_range", self.visual_range)?;
        ensure_non_negative("perception.standstill_gap", self.standstill_gap)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// IDM free-road exponent.
    pub delta: f64,
    /// Smallest gap used when forming s*/s.
    pub gap_epsilon: f64,
    /// Share of tire friction drivers use for cornering when picking curve speeds.
    pub curve_friction_share: f64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            delta: 4.0,
            gap_epsilon: 0.1,
            curve_friction_share: 0.6,
        }
    }
}

impl Validate for ControllerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        ensure_positive("controller.delta", self.delta)?;
        ensure_positive("controller.gap_epsilon", self.gap_epsilon)?;
        ensure_unit_interval("controller.curve_friction_share", self.curve_friction_share)?;
        if self.curve_friction_share == 0.0 {
            return Err(ConfigError::invalid(
                "controller.curve_friction_share",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CollisionConfig {
    /// Look-ahead horizon of the contact predictor in seconds.
    pub horizon: f64,
    /// Distance margin at which a predicted approach counts as contact.
    pub guard_band: f64,
    /// Coefficient of restitution of the contact impulse.
    pub restitution: f64,
    /// Seconds a vehicle stays disabled after a collision.
    pub disable_duration: f64,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            horizon: 5.0,
            guard_band: 0.25,
            restitution: 0.2,
            disable_duration: 8.0,
        }
    }
}

impl Validate for CollisionConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        ensure_positive("collision.horizon", self.horizon)?;
        ensure_non_negative("collision.guard_band", self.guard_band)?;
        ensure_unit_interval("collision.restitution", self.restitution)?;
        ensure_non_negative("collision.disable_duration", self.disable_duration)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integration_mode_parses_snake_case() {
        let physics: PhysicsConfig = toml::from_str("integration_mode = \"planar\"").unwrap();
        assert_eq!(physics.integration_mode, IntegrationMode::Planar);
    }

    #[test]
    fn rejects_zero_substep_budget() {
        let physics = PhysicsConfig {
            max_substeps_per_frame: 0,
            ..PhysicsConfig::default()
        };
        assert_eq!(
            physics.validate().unwrap_err().field(),
            Some("physics.max_substeps_per_frame")
        );
    }
}

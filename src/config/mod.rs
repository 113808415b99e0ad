use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

pub mod drivers;
pub mod engine;
pub mod track;
pub mod vehicles;

pub use drivers::*;
pub use engine::*;
pub use track::*;
pub use vehicles::*;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub seed: u64,
    pub population: PopulationConfig,
    pub track: TrackConfig,
    pub physics: PhysicsConfig,
    pub options: EngineOptions,
    pub perception: PerceptionConfig,
    pub controller: ControllerConfig,
    pub collision: CollisionConfig,
    pub speeding: SpeedingConfig,
    pub drivers: DriverDistribution,
    pub vehicle_classes: Vec<VehicleSpec>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            population: PopulationConfig::default(),
            track: TrackConfig::default(),
            physics: PhysicsConfig::default(),
            options: EngineOptions::default(),
            perception: PerceptionConfig::default(),
            controller: ControllerConfig::default(),
            collision: CollisionConfig::default(),
            speeding: SpeedingConfig::default(),
            drivers: DriverDistribution::default(),
            vehicle_classes: default_vehicle_classes(),
        }
    }
}

impl SimulationConfig {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: SimulationConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }
}

impl Validate for SimulationConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.population.validate()?;
        self.track.validate()?;
        self.physics.validate()?;
        self.perception.validate()?;
        self.controller.validate()?;
        self.collision.validate()?;
        self.speeding.validate()?;
        self.drivers.validate()?;

        if self.vehicle_classes.is_empty() {
            return Err(ConfigError::invalid(
                "vehicle_classes",
                "at least one vehicle class must be defined",
            ));
        }
        for spec in &self.vehicle_classes {
            spec.validate()?;
        }

        // Vehicles are spawned evenly spaced, so the longest class must fit
        let longest = self
            .vehicle_classes
            .iter()
            .map(|spec| spec.length)
            .fold(0.0, f64::max);
        let needed = longest * self.population.count as f64;
        if needed >= self.track.length {
            return Err(ConfigError::invalid(
                "population.count",
                format!(
                    "{} vehicles of up to {:.1} m do not fit on a {:.1} m track",
                    self.population.count, longest, self.track.length
                ),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PopulationConfig {
    pub count: u32,
    /// Initial speed as a fraction of each driver's desired speed, drawn uniformly.
    pub initial_speed_range: [f64; 2],
    /// Half-width of the uniform lane offset drawn at spawn, in metres. With
    /// zero every vehicle shares one corridor and nothing is ever hidden.
    pub lateral_jitter: f64,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            count: 40,
            initial_speed_range: [0.6, 0.9],
            lateral_jitter: 0.0,
        }
    }
}

impl Validate for PopulationConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.count == 0 {
            return Err(ConfigError::invalid("population.count", "must be greater than zero"));
        }
        let [lo, hi] = self.initial_speed_range;
        if !(lo.is_finite() && hi.is_finite()) || lo < 0.0 || hi < lo {
            return Err(ConfigError::invalid(
                "population.initial_speed_range",
                format!("expected 0 <= min <= max, got [{}, {}]", lo, hi),
            ));
        }
        ensure_non_negative("population.lateral_jitter", self.lateral_jitter)?;
        Ok(())
    }
}

pub trait Validate {
    fn validate(&self) -> Result<(), ConfigError>;
}

pub(crate) fn ensure_positive(field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("must be positive, got {}", value)))
    }
}

pub(crate) fn ensure_non_negative(field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("must be non-negative, got {}", value)))
    }
}

pub(crate) fn ensure_unit_interval(field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("must be in range [0, 1], got {}", value)))
    }
}

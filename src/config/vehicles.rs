use serde::{Deserialize, Serialize};

use super::{ensure_positive, ensure_unit_interval, Validate};
use crate::error::ConfigError;

pub const GRAVITY: f64 = 9.81;
pub const AIR_DENSITY: f64 = 1.225;

// Speed at which peak power is converted into the nominal acceleration cap
const POWER_REFERENCE_SPEED: f64 = 20.0;

/// Static description of a vehicle class. Shared by every vehicle of the class.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VehicleSpec {
    pub id: String,
    pub weight: u32,
    pub mass: f64,
    pub length: f64,
    pub width: f64,
    pub peak_power: f64,
    pub drag_area: f64,
    pub tire_friction: f64,
    pub braking_efficiency: f64,
    pub comfort_decel_cap: f64,
    pub max_decel_cap: f64,
}

impl VehicleSpec {
    /// Traction- and power-limited acceleration cap in m/s^2.
    pub fn max_acceleration(&self) -> f64 {
        let traction = self.tire_friction * GRAVITY;
        let power = self.peak_power / (self.mass * POWER_REFERENCE_SPEED);
        traction.min(power)
    }

    /// Hardest physically possible deceleration, as a negative acceleration.
    pub fn braking_floor(&self) -> f64 {
        -self.braking_efficiency * self.tire_friction * GRAVITY
    }

    /// Speed at which aerodynamic drag absorbs all of the peak power.
    pub fn top_speed(&self) -> f64 {
        (2.0 * self.peak_power / (AIR_DENSITY * self.drag_area)).cbrt()
    }
}

impl Validate for VehicleSpec {
    fn validate(&self) -> Result<(), ConfigError> {
        let field = |name: &str| format!("vehicle_classes.{}.{}", self.id, name);

        if self.id.is_empty() {
            return Err(ConfigError::invalid("vehicle_classes.id", "must not be empty"));
        }
        if self.weight == 0 {
            return Err(ConfigError::invalid(field("weight"), "must be greater than zero"));
        }
        ensure_positive(&field("mass"), self.mass)?;
        ensure_positive(&field("length"), self.length)?;
        ensure_positive(&field("width"), self.width)?;
        ensure_positive(&field("peak_power"), self.peak_power)?;
        ensure_positive(&field("drag_area"), self.drag_area)?;
        ensure_positive(&field("tire_friction"), self.tire_friction)?;
        ensure_unit_interval(&field("braking_efficiency"), self.braking_efficiency)?;
        if self.braking_efficiency == 0.0 {
            return Err(ConfigError::invalid(field("braking_efficiency"), "must be greater than zero"));
        }
        ensure_positive(&field("comfort_decel_cap"), self.comfort_decel_cap)?;
        ensure_positive(&field("max_decel_cap"), self.max_decel_cap)?;
        if self.comfort_decel_cap > self.max_decel_cap {
            return Err(ConfigError::invalid(
                field("comfort_decel_cap"),
                "must not exceed max_decel_cap",
            ));
        }

        Ok(())
    }
}

pub fn default_vehicle_classes() -> Vec<VehicleSpec> {
    vec![
        VehicleSpec {
            id: "sedan".to_string(),
            weight: 60,
            mass: 1500.0,
            length: 4.6,
            width: 1.8,
            peak_power: 110_000.0,
            drag_area: 0.68,
            tire_friction: 0.9,
            braking_efficiency: 0.85,
            comfort_decel_cap: 3.5,
            max_decel_cap: 8.0,
        },
        VehicleSpec {
            id: "suv".to_string(),
            weight: 30,
            mass: 2100.0,
            length: 4.9,
            width: 2.0,
            peak_power: 150_000.0,
            drag_area: 0.95,
            tire_friction: 0.85,
            braking_efficiency: 0.8,
            comfort_decel_cap: 3.0,
            max_decel_cap: 7.0,
        },
        VehicleSpec {
            id: "truck".to_string(),
            weight: 10,
            mass: 9000.0,
            length: 8.5,
            width: 2.5,
            peak_power: 220_000.0,
            drag_area: 4.5,
            tire_friction: 0.75,
            braking_efficiency: 0.7,
            comfort_decel_cap: 2.0,
            max_decel_cap: 5.0,
        },
    ]
}

pub mod compute;
pub mod config;
pub mod error;
pub mod simulation;

pub use config::{SimulationConfig, Validate};
pub use error::ConfigError;
pub use simulation::{CollisionRecord, Simulation, TickReport, VehicleId, VehicleSnapshot};

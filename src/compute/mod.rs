use anyhow::Result;
use std::sync::Once;

use crate::config::{EngineOptions, IntegrationMode};
use crate::simulation::{ControlOutput, Track, VehicleStates};

pub mod kernel;
pub mod scalar;

#[cfg(feature = "batched")]
pub mod batched;

pub use scalar::*;

#[cfg(feature = "batched")]
pub use batched::*;

static BATCHED_FALLBACK: Once = Once::new();

pub trait IntegrationBackend {
    /// Stores `commands` as the applied accelerations and advances every
    /// vehicle by `dt`. Returns the highest speed after the step.
    fn integrate(&mut self, states: &mut VehicleStates, commands: &[ControlOutput], track: &Track, dt: f64) -> f64;
    fn get_name(&self) -> &'static str;
    fn is_batched(&self) -> bool;
}

pub enum ComputeBackend {
    Scalar(ScalarBackend),
    #[cfg(feature = "batched")]
    Batched(BatchedBackend),
}

impl ComputeBackend {
    pub fn new_scalar(mode: IntegrationMode) -> Self {
        ComputeBackend::Scalar(ScalarBackend::new(mode))
    }

    #[cfg(feature = "batched")]
    pub fn new_batched(mode: IntegrationMode) -> Result<Self> {
        Ok(ComputeBackend::Batched(BatchedBackend::new(mode)))
    }

    #[cfg(not(feature = "batched"))]
    pub fn new_batched(_mode: IntegrationMode) -> Result<Self> {
        anyhow::bail!("Batched integration not compiled in. Enable 'batched' feature.")
    }

    /// Picks the backend once, at construction. A missing batched backend
    /// degrades to scalar integration and warns a single time per process.
    pub fn resolve(options: &EngineOptions, mode: IntegrationMode) -> Self {
        if !options.vectorized_engine_enabled {
            return Self::new_scalar(mode);
        }
        match Self::new_batched(mode) {
            Ok(backend) => backend,
            Err(e) => {
                BATCHED_FALLBACK.call_once(|| {
                    log::warn!("{e}; falling back to scalar integration");
                });
                Self::new_scalar(mode)
            }
        }
    }
}

impl IntegrationBackend for ComputeBackend {
    fn integrate(&mut self, states: &mut VehicleStates, commands: &[ControlOutput], track: &Track, dt: f64) -> f64 {
        match self {
            ComputeBackend::Scalar(backend) => backend.integrate(states, commands, track, dt),
            #[cfg(feature = "batched")]
            ComputeBackend::Batched(backend) => backend.integrate(states, commands, track, dt),
        }
    }

    fn get_name(&self) -> &'static str {
        match self {
            ComputeBackend::Scalar(backend) => backend.get_name(),
            #[cfg(feature = "batched")]
            ComputeBackend::Batched(backend) => backend.get_name(),
        }
    }

    fn is_batched(&self) -> bool {
        match self {
            ComputeBackend::Scalar(backend) => backend.is_batched(),
            #[cfg(feature = "batched")]
            ComputeBackend::Batched(backend) => backend.is_batched(),
        }
    }
}

// Deterministic reduction in index order
pub(crate) fn max_speed(states: &VehicleStates) -> f64 {
    states.v.iter().copied().fold(0.0, f64::max)
}

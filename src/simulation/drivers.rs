use nalgebra::{DMatrix, DVector};
use rand::Rng;
use rand_distr::StandardNormal;

use super::stats::normal_cdf;
use super::{driver_rng, RngPurpose};
use crate::config::{DriverDistribution, Marginal, Validate, LATENT_COUNT};
use crate::error::ConfigError;

/// Behavioural parameters of one driver, fixed for the driver's lifetime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriverParams {
    pub reaction_time: f64,
    pub time_headway: f64,
    pub comfort_decel: f64,
    pub max_decel: f64,
    pub jerk_limit: f64,
    pub throttle_tau: f64,
    pub brake_tau: f64,
    pub aggression: f64,
    pub rule_adherence: f64,
    pub desired_speed: f64,
}

impl DriverParams {
    fn from_latents(values: [f64; LATENT_COUNT], max_decel_bounds: &Marginal) -> Self {
        let comfort_decel = values[2];
        // Hard braking is never gentler than comfortable braking
        let max_decel = values[3].max(comfort_decel).clamp(max_decel_bounds.min, max_decel_bounds.max);

        Self {
            reaction_time: values[0],
            time_headway: values[1],
            comfort_decel,
            max_decel,
            jerk_limit: values[4],
            throttle_tau: values[5],
            brake_tau: values[6],
            aggression: values[7],
            rule_adherence: values[8],
            desired_speed: values[9],
        }
    }
}

/// Samples correlated driver parameters through a Gaussian copula.
#[derive(Debug, Clone)]
pub struct DriverGenerator {
    marginals: [Marginal; LATENT_COUNT],
    cholesky: DMatrix<f64>,
}

impl DriverGenerator {
    pub fn new(distribution: &DriverDistribution) -> Result<Self, ConfigError> {
        distribution.validate()?;
        Ok(Self {
            marginals: distribution.marginals(),
            cholesky: distribution.cholesky_factor()?,
        })
    }

    /// Parameters for drivers `0..n`. Driver `i` depends only on `(seed, i)`.
    pub fn generate(&self, seed: u64, n: usize) -> Vec<DriverParams> {
        (0..n).map(|index| self.sample(seed, index)).collect()
    }

    pub fn sample(&self, seed: u64, index: usize) -> DriverParams {
        let mut rng = driver_rng(seed, index, RngPurpose::Params);
        let independent = DVector::<f64>::from_fn(LATENT_COUNT, |_, _| rng.sample(StandardNormal));
        let correlated = &self.cholesky * independent;

        let mut values = [0.0; LATENT_COUNT];
        for (k, value) in values.iter_mut().enumerate() {
            *value = self.marginals[k].quantile(normal_cdf(correlated[k]));
        }

        DriverParams::from_latents(values, &self.marginals[3])
    }
}

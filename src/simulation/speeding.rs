use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;

use super::{driver_rng, DriverParams, RngPurpose};
use crate::config::SpeedingConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedingMode {
    Compliant,
    Speeding,
}

/// Two-state continuous-time Markov process deciding when a driver speeds.
#[derive(Debug, Clone)]
pub struct SpeedingState {
    mode: SpeedingMode,
    lambda_on: f64,
    lambda_off: f64,
    offset: f64,
    offset_mean: f64,
    offset_std: f64,
    offset_max: f64,
    rule_adherence: f64,
    rng: ChaCha8Rng,
}

impl SpeedingState {
    pub fn new(config: &SpeedingConfig, driver: &DriverParams, seed: u64, index: usize) -> Self {
        let (lambda_on, lambda_off) = Self::rates(config, driver);
        let mut state = Self {
            mode: SpeedingMode::Compliant,
            lambda_on,
            lambda_off,
            offset: 0.0,
            offset_mean: config.offset_mean,
            offset_std: config.offset_std,
            offset_max: config.offset_max,
            rule_adherence: driver.rule_adherence,
            rng: driver_rng(seed, index, RngPurpose::Speeding),
        };

        // Start from the stationary distribution rather than all-compliant
        if state.rng.gen::<f64>() < config.target_fraction {
            state.enter_speeding();
        }
        state
    }

    /// Transition rates `(λ_on, λ_off)` per second.
    ///
    /// Aggression and rule adherence scale both rates by the same factor, which
    /// changes how long episodes last but keeps the long-run speeding share at
    /// `target_fraction`.
    pub fn rates(config: &SpeedingConfig, driver: &DriverParams) -> (f64, f64) {
        let tempo = (1.0 + driver.aggression) / (1.0 + driver.rule_adherence);
        let lambda_off = tempo / config.mean_episode_duration;
        let p = config.target_fraction;
        let lambda_on = p / (1.0 - p) * lambda_off;
        (lambda_on, lambda_off)
    }

    /// Advances the chain by one exposure window of `dt` seconds.
    /// Returns true when the mode changed.
    pub fn update(&mut self, dt: f64) -> bool {
        let rate = match self.mode {
            SpeedingMode::Compliant => self.lambda_on,
            SpeedingMode::Speeding => self.lambda_off,
        };
        let switch_probability = 1.0 - (-rate * dt).exp();
        let roll: f64 = self.rng.gen();

        if roll >= switch_probability {
            return false;
        }

        match self.mode {
            SpeedingMode::Compliant => self.enter_speeding(),
            SpeedingMode::Speeding => {
                self.mode = SpeedingMode::Compliant;
                self.offset = 0.0;
            }
        }
        true
    }

    fn enter_speeding(&mut self) {
        let z: f64 = self.rng.sample(StandardNormal);
        let raw = (self.offset_mean + self.offset_std * z).max(0.0);
        self.offset = (raw * (1.0 - 0.5 * self.rule_adherence)).min(self.offset_max);
        self.mode = SpeedingMode::Speeding;
    }

    pub fn mode(&self) -> SpeedingMode {
        self.mode
    }

    pub fn is_speeding(&self) -> bool {
        self.mode == SpeedingMode::Speeding
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Desired speed after applying the current mode.
    pub fn desired_speed(&self, preferred: f64, speed_limit: f64) -> f64 {
        match self.mode {
            SpeedingMode::Compliant => preferred.min(speed_limit),
            SpeedingMode::Speeding => speed_limit + self.offset,
        }
    }
}

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use super::{ensure_non_negative, ensure_positive, Validate};
use crate::error::ConfigError;

/// Number of correlated latent variables per driver.
pub const LATENT_COUNT: usize = 10;

/// Latent order used by the correlation matrix rows and columns.
pub const LATENT_NAMES: [&str; LATENT_COUNT] = [
    "reaction_time",
    "time_headway",
    "comfort_decel",
    "max_decel",
    "jerk_limit",
    "throttle_tau",
    "brake_tau",
    "aggression",
    "rule_adherence",
    "desired_speed",
];

const AGGRESSION: usize = 7;

/// Truncated normal marginal for one driver parameter.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct Marginal {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl Marginal {
    pub const fn new(mean: f64, std: f64, min: f64, max: f64) -> Self {
        Self { mean, std, min, max }
    }

    fn validate_named(&self, name: &str) -> Result<(), ConfigError> {
        let field = format!("drivers.{}", name);
        if !self.mean.is_finite() || !self.min.is_finite() || !self.max.is_finite() {
            return Err(ConfigError::invalid(field, "mean and bounds must be finite"));
        }
        ensure_positive(&format!("{}.std", field), self.std)?;
        if self.min > self.max {
            return Err(ConfigError::invalid(
                format!("{}.min", field),
                format!("min {} exceeds max {}", self.min, self.max),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DriverDistribution {
    pub reaction_time: Marginal,
    pub time_headway: Marginal,
    pub comfort_decel: Marginal,
    pub max_decel: Marginal,
    pub jerk_limit: Marginal,
    pub throttle_tau: Marginal,
    pub brake_tau: Marginal,
    pub aggression: Marginal,
    pub rule_adherence: Marginal,
    pub desired_speed: Marginal,
    /// Row-major correlation matrix in `LATENT_NAMES` order. Built-in pairings when absent.
    pub correlation: Option<Vec<Vec<f64>>>,
}

impl Default for DriverDistribution {
    fn default() -> Self {
        Self {
            reaction_time: Marginal::new(1.0, 0.3, 0.4, 2.0),
            time_headway: Marginal::new(1.5, 0.4, 0.7, 3.0),
            comfort_decel: Marginal::new(2.5, 0.5, 1.5, 4.0),
            max_decel: Marginal::new(6.0, 1.0, 4.0, 9.0),
            jerk_limit: Marginal::new(8.0, 2.0, 3.0, 15.0),
            throttle_tau: Marginal::new(0.4, 0.1, 0.15, 0.8),
            brake_tau: Marginal::new(0.25, 0.08, 0.1, 0.6),
            aggression: Marginal::new(0.5, 0.2, 0.0, 1.0),
            rule_adherence: Marginal::new(0.7, 0.2, 0.0, 1.0),
            desired_speed: Marginal::new(26.0, 3.0, 18.0, 36.0),
            correlation: None,
        }
    }
}

impl DriverDistribution {
    pub fn marginals(&self) -> [Marginal; LATENT_COUNT] {
        [
            self.reaction_time,
            self.time_headway,
            self.comfort_decel,
            self.max_decel,
            self.jerk_limit,
            self.throttle_tau,
            self.brake_tau,
            self.aggression,
            self.rule_adherence,
            self.desired_speed,
        ]
    }

    pub fn correlation_matrix(&self) -> Result<DMatrix<f64>, ConfigError> {
        let Some(rows) = &self.correlation else {
            return Ok(default_correlation());
        };

        if rows.len() != LATENT_COUNT || rows.iter().any(|row| row.len() != LATENT_COUNT) {
            return Err(ConfigError::Correlation {
                reason: format!("expected a {0}x{0} matrix", LATENT_COUNT),
            });
        }

        let matrix = DMatrix::from_fn(LATENT_COUNT, LATENT_COUNT, |i, j| rows[i][j]);
        for i in 0..LATENT_COUNT {
            if (matrix[(i, i)] - 1.0).abs() > 1e-9 {
                return Err(ConfigError::Correlation {
                    reason: format!("diagonal entry for {} must be 1", LATENT_NAMES[i]),
                });
            }
            for j in 0..i {
                let value = matrix[(i, j)];
                if !value.is_finite() || value.abs() > 1.0 {
                    return Err(ConfigError::Correlation {
                        reason: format!(
                            "entry ({}, {}) must lie in [-1, 1]",
                            LATENT_NAMES[i], LATENT_NAMES[j]
                        ),
                    });
                }
                if (value - matrix[(j, i)]).abs() > 1e-9 {
                    return Err(ConfigError::Correlation {
                        reason: format!(
                            "matrix is not symmetric at ({}, {})",
                            LATENT_NAMES[i], LATENT_NAMES[j]
                        ),
                    });
                }
            }
        }
        Ok(matrix)
    }

    /// Lower-triangular Cholesky factor of the correlation matrix.
    pub fn cholesky_factor(&self) -> Result<DMatrix<f64>, ConfigError> {
        let matrix = self.correlation_matrix()?;
        nalgebra::Cholesky::new(matrix)
            .map(|chol| chol.l())
            .ok_or_else(|| ConfigError::Correlation {
                reason: "matrix is not positive definite".to_string(),
            })
    }
}

fn default_correlation() -> DMatrix<f64> {
    let mut matrix = DMatrix::identity(LATENT_COUNT, LATENT_COUNT);
    let pairs = [
        (1, -0.5), // headway
        (2, 0.4),  // comfortable braking
        (8, -0.5), // rule adherence
        (9, 0.4),  // desired speed
        (0, -0.2), // reaction time
    ];
    for (other, rho) in pairs {
        matrix[(AGGRESSION, other)] = rho;
        matrix[(other, AGGRESSION)] = rho;
    }
    matrix
}

impl Validate for DriverDistribution {
    fn validate(&self) -> Result<(), ConfigError> {
        for (name, marginal) in LATENT_NAMES.iter().zip(self.marginals()) {
            marginal.validate_named(name)?;
        }

        for (name, marginal) in [
            ("reaction_time", self.reaction_time),
            ("time_headway", self.time_headway),
            ("comfort_decel", self.comfort_decel),
            ("max_decel", self.max_decel),
            ("jerk_limit", self.jerk_limit),
            ("throttle_tau", self.throttle_tau),
            ("brake_tau", self.brake_tau),
            ("desired_speed", self.desired_speed),
        ] {
            ensure_positive(&format!("drivers.{}.min", name), marginal.min)?;
        }

        for (name, marginal) in [
            ("aggression", self.aggression),
            ("rule_adherence", self.rule_adherence),
        ] {
            if marginal.min < 0.0 || marginal.max > 1.0 {
                return Err(ConfigError::invalid(
                    format!("drivers.{}", name),
                    "bounds must lie within [0, 1]",
                ));
            }
        }

        self.cholesky_factor()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SpeedingConfig {
    /// Long-run fraction of time each driver spends speeding.
    pub target_fraction: f64,
    /// Mean duration of one speeding episode in seconds.
    pub mean_episode_duration: f64,
    pub offset_mean: f64,
    pub offset_std: f64,
    pub offset_max: f64,
}

impl Default for SpeedingConfig {
    fn default() -> Self {
        Self {
            target_fraction: 0.3,
            mean_episode_duration: 30.0,
            offset_mean: 3.0,
            offset_std: 1.5,
            offset_max: 8.0,
        }
    }
}

impl Validate for SpeedingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !self.target_fraction.is_finite() || !(0.0..1.0).contains(&self.target_fraction) {
            return Err(ConfigError::invalid(
                "speeding.target_fraction",
                format!("must be in range [0, 1), got {}", self.target_fraction),
            ));
        }
        ensure_positive("speeding.mean_episode_duration", self.mean_episode_duration)?;
        ensure_non_negative("speeding.offset_mean", self.offset_mean)?;
        ensure_non_negative("speeding.offset_std", self.offset_std)?;
        ensure_non_negative("speeding.offset_max", self.offset_max)?;
        Ok(())
    }
}

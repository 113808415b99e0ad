//! Normal distribution helpers for the Gaussian copula.

use std::f64::consts::SQRT_2;

use statrs::function::erf::{erfc, erfc_inv};

use crate::config::Marginal;

// Keeps the inverse CDF away from its poles
const PROBABILITY_EPSILON: f64 = 1e-12;

/// Standard normal cumulative distribution function.
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / SQRT_2)
}

/// Inverse of the standard normal CDF.
pub fn inverse_normal_cdf(p: f64) -> f64 {
    let p = p.clamp(PROBABILITY_EPSILON, 1.0 - PROBABILITY_EPSILON);
    -SQRT_2 * erfc_inv(2.0 * p)
}

impl Marginal {
    /// Maps a uniform quantile through this truncated normal and clamps to bounds.
    pub fn quantile(&self, u: f64) -> f64 {
        let lower = normal_cdf((self.min - self.mean) / self.std);
        let upper = normal_cdf((self.max - self.mean) / self.std);
        let p = lower + u.clamp(0.0, 1.0) * (upper - lower);
        let x = self.mean + self.std * inverse_normal_cdf(p);
        x.clamp(self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn cdf_reference_values() {
        assert_abs_diff_eq!(normal_cdf(0.0), 0.5, epsilon = 1e-7);
        assert_abs_diff_eq!(normal_cdf(1.959_964), 0.975, epsilon = 1e-6);
        assert_abs_diff_eq!(normal_cdf(-1.0), 0.158_655_25, epsilon = 1e-6);
    }

    #[test]
    fn inverse_matches_cdf() {
        for p in [0.001, 0.02, 0.3, 0.5, 0.77, 0.99, 0.9995] {
            assert_abs_diff_eq!(normal_cdf(inverse_normal_cdf(p)), p, epsilon = 1e-6);
        }
    }

    #[test]
    fn quantile_reference_values_and_poles() {
        assert_abs_diff_eq!(inverse_normal_cdf(0.975), 1.959_963_984_540_054, epsilon = 1e-9);
        assert_abs_diff_eq!(inverse_normal_cdf(0.5), 0.0, epsilon = 1e-12);
        for p in [0.0, 1.0] {
            assert!(inverse_normal_cdf(p).is_finite());
        }
        assert!(inverse_normal_cdf(0.0) < -7.0);
    }

    #[test]
    fn truncated_quantile_respects_bounds() {
        let marginal = Marginal::new(1.0, 0.5, 0.6, 1.2);
        assert_abs_diff_eq!(marginal.quantile(0.0), 0.6, epsilon = 1e-6);
        assert_abs_diff_eq!(marginal.quantile(1.0), 1.2, epsilon = 1e-6);
        let mid = marginal.quantile(0.5);
        assert!(mid > 0.6 && mid < 1.2);
    }
}

//! Generating functions for the carbon price path.
use anyhow::{Result, ensure};
use serde::Deserialize;

/// A parametrised carbon price curve, evaluated once per timestep
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PriceCurve {
    /// A logistic curve rising from `lower_bound` towards `upper_bound`
    Sigmoid {
        /// The asymptotic price as time goes to infinity
        upper_bound: f64,
        /// The price at the first timestep
        lower_bound: f64,
        /// The inflection point as a fraction of the number of timesteps
        inflection: f64,
        /// How quickly the curve rises around the inflection point
        steepness: f64,
    },
    /// A straight line in the timestep index
    Line {
        /// Price increase per timestep
        slope: f64,
        /// Price at the first timestep
        intercept: f64,
    },
    /// A linear ramp between a starting and a final price
    Minmax {
        /// Price at the first timestep
        starting_price: f64,
        /// Price at the final timestep
        total_increase_in_price: f64,
    },
}

/// Evaluate a sigmoid curve at `x`
fn sigmoid(x: f64, upper_bound: f64, lower_bound: f64, inflection: f64, steepness: f64) -> f64 {
    upper_bound + (lower_bound - upper_bound) / (1.0 + (x / inflection).powf(steepness))
}

impl PriceCurve {
    /// Evaluate the curve for every timestep from 0 to `n_steps` inclusive.
    ///
    /// # Returns
    ///
    /// A vector of length `n_steps + 1` or an error if the curve parameters are invalid.
    pub fn evaluate(&self, n_steps: u32) -> Result<Vec<f64>> {
        let times = (0..=n_steps).map(f64::from);
        let prices: Vec<f64> = match *self {
            Self::Sigmoid {
                upper_bound,
                lower_bound,
                inflection,
                steepness,
            } => {
                ensure!(
                    inflection > 0.0,
                    "Sigmoid price curve inflection must be greater than zero"
                );
                let inflection = inflection * f64::from(n_steps);
                times
                    .map(|t| sigmoid(t, upper_bound, lower_bound, inflection, steepness))
                    .collect()
            }
            Self::Line { slope, intercept } => times.map(|t| slope * t + intercept).collect(),
            Self::Minmax {
                starting_price,
                total_increase_in_price,
            } => {
                let increment = (total_increase_in_price - starting_price) / f64::from(n_steps);
                times.map(|t| starting_price + increment * t).collect()
            }
        };

        ensure!(
            prices.iter().all(|p| p.is_finite()),
            "Carbon price curve produced non-finite values"
        );

        Ok(prices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[test]
    fn test_line() {
        let curve = PriceCurve::Line {
            slope: 10.0,
            intercept: 0.0,
        };
        assert_eq!(curve.evaluate(3).unwrap(), [0.0, 10.0, 20.0, 30.0]);
    }

    #[test]
    fn test_minmax() {
        let curve = PriceCurve::Minmax {
            starting_price: 5.0,
            total_increase_in_price: 35.0,
        };
        let prices = curve.evaluate(5).unwrap();
        assert_eq!(prices.len(), 6);
        for (t, price) in prices.iter().enumerate() {
            assert_approx_eq!(f64, *price, 5.0 + 6.0 * t as f64);
        }
    }

    #[test]
    fn test_sigmoid() {
        let curve = PriceCurve::Sigmoid {
            upper_bound: 200.0,
            lower_bound: 0.0,
            inflection: 0.5,
            steepness: 4.0,
        };
        let prices = curve.evaluate(10).unwrap();

        // Starts at the lower bound, passes through the midpoint at the inflection point
        assert_approx_eq!(f64, prices[0], 0.0);
        assert_approx_eq!(f64, prices[5], 100.0);
        assert!(prices.windows(2).all(|w| w[1] >= w[0]));
        assert!(prices[10] < 200.0);
    }

    #[rstest]
    #[case(0.0)]
    #[case(-0.5)]
    fn test_sigmoid_bad_inflection(#[case] inflection: f64) {
        let curve = PriceCurve::Sigmoid {
            upper_bound: 200.0,
            lower_bound: 0.0,
            inflection,
            steepness: 4.0,
        };
        assert!(curve.evaluate(10).is_err());
    }

    #[test]
    fn test_deserialise() {
        let curve: PriceCurve =
            toml::from_str("type = \"line\"\nslope = 10\nintercept = 0").unwrap();
        assert_eq!(
            curve,
            PriceCurve::Line {
                slope: 10.0,
                intercept: 0.0
            }
        );
    }
}

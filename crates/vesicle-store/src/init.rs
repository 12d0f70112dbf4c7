//! Variable initialisers.
//!
//! Random initialisers draw from the store's seeded `ChaCha8Rng`, so a
//! model built twice from the same seed starts from identical state.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use vesicle_core::{ScalarType, VarShape};

use crate::error::StoreError;

/// Initial value of a variable.
#[derive(Clone, Debug, PartialEq)]
pub enum VarInit {
    /// Every value equal.
    Constant(f64),
    /// Explicit values: either the full flat storage, or one lane's worth
    /// broadcast to every lane.
    Values(Vec<f64>),
    /// Uniform draw from `[min, max)`.
    Uniform {
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
    },
    /// Normal draw.
    Normal {
        /// Mean.
        mean: f64,
        /// Standard deviation.
        sd: f64,
    },
}

impl Default for VarInit {
    fn default() -> Self {
        Self::Constant(0.0)
    }
}

impl From<f64> for VarInit {
    fn from(v: f64) -> Self {
        Self::Constant(v)
    }
}

impl From<Vec<f64>> for VarInit {
    fn from(v: Vec<f64>) -> Self {
        Self::Values(v)
    }
}

impl VarInit {
    /// Produce the flat storage for `shape`, quantized to `ty`.
    ///
    /// `target` names the variable in length errors.
    pub fn fill(
        &self,
        target: &str,
        shape: VarShape,
        ty: ScalarType,
        rng: &mut ChaCha8Rng,
    ) -> Result<Vec<f64>, StoreError> {
        let len = shape.len();
        let mut data = match self {
            Self::Constant(v) => vec![*v; len],
            Self::Values(values) => {
                if values.len() == len {
                    values.clone()
                } else if values.len() == shape.count && shape.lanes > 1 {
                    values.repeat(shape.lanes)
                } else {
                    return Err(StoreError::LengthMismatch {
                        target: target.to_string(),
                        expected: len,
                        found: values.len(),
                    });
                }
            }
            Self::Uniform { min, max } => (0..len)
                .map(|_| min + (max - min) * rng.random::<f64>())
                .collect(),
            Self::Normal { mean, sd } => (0..len).map(|_| mean + sd * box_muller(rng)).collect(),
        };
        for v in &mut data {
            *v = ty.quantize(*v);
        }
        Ok(data)
    }
}

/// Standard normal sample via the Box–Muller transform.
fn box_muller(rng: &mut ChaCha8Rng) -> f64 {
    let u1: f64 = rng.random::<f64>().max(1e-300);
    let u2: f64 = rng.random();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(42)
    }

    #[test]
    fn constant_fills_every_lane() {
        let data = VarInit::Constant(1.5)
            .fill("X", VarShape::new(3, 2), ScalarType::Double, &mut rng())
            .unwrap();
        assert_eq!(data, vec![1.5; 6]);
    }

    #[test]
    fn per_lane_values_broadcast() {
        let data = VarInit::Values(vec![1.0, 2.0])
            .fill("X", VarShape::new(2, 3), ScalarType::Double, &mut rng())
            .unwrap();
        assert_eq!(data, vec![1.0, 2.0, 1.0, 2.0, 1.0, 2.0]);
    }

    #[test]
    fn wrong_length_values_rejected() {
        let err = VarInit::Values(vec![1.0, 2.0, 3.0])
            .fill("Pop.X", VarShape::new(2, 3), ScalarType::Double, &mut rng())
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::LengthMismatch {
                target: "Pop.X".into(),
                expected: 6,
                found: 3,
            }
        );
    }

    #[test]
    fn float_values_are_quantized() {
        let data = VarInit::Constant(0.1)
            .fill("X", VarShape::new(1, 1), ScalarType::Float, &mut rng())
            .unwrap();
        assert_eq!(data[0], 0.1f32 as f64);
    }

    #[test]
    fn normal_draws_have_plausible_moments() {
        let data = VarInit::Normal { mean: 2.0, sd: 0.5 }
            .fill("g", VarShape::new(10_000, 1), ScalarType::Double, &mut rng())
            .unwrap();
        let mean = data.iter().sum::<f64>() / data.len() as f64;
        let var = data.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / data.len() as f64;
        assert!((mean - 2.0).abs() < 0.05, "mean {mean}");
        assert!((var.sqrt() - 0.5).abs() < 0.05, "sd {}", var.sqrt());
    }

    proptest! {
        #[test]
        fn uniform_stays_in_range(
            seed in any::<u64>(),
            min in -100.0f64..0.0,
            width in 0.001f64..100.0,
        ) {
            let mut r = ChaCha8Rng::seed_from_u64(seed);
            let data = VarInit::Uniform { min, max: min + width }
                .fill("X", VarShape::new(64, 1), ScalarType::Double, &mut r)
                .unwrap();
            for v in data {
                prop_assert!(v >= min && v <= min + width);
            }
        }
    }
}

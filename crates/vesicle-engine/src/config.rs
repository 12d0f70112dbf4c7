//! Model configuration, validation, and error types.
//!
//! [`ModelConfig`] is the input to [`ModelBuilder::new`](crate::ModelBuilder::new).
//! [`validate()`](ModelConfig::validate) checks it before anything is
//! registered; batch size and precision are fixed for the model's
//! lifetime.

use std::error::Error;
use std::fmt;

use vesicle_core::Precision;

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected during [`ModelConfig::validate()`].
#[derive(Debug, PartialEq)]
pub enum ConfigError {
    /// `batch_size` is zero.
    ZeroBatch,
    /// `dt` is NaN, infinite, zero, or negative.
    InvalidDt {
        /// The invalid value.
        value: f64,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroBatch => write!(f, "batch_size must be at least 1"),
            Self::InvalidDt { value } => {
                write!(f, "dt must be finite and positive, got {value}")
            }
        }
    }
}

impl Error for ConfigError {}

// ── ModelConfig ────────────────────────────────────────────────────

/// Configuration of a model.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelConfig {
    /// Resolution of the `scalar` type alias. Default: `Float`.
    pub precision: Precision,
    /// Simulation timestep. Update code sees `t = timestep × dt`. Default: 1.0.
    pub dt: f64,
    /// Lanes of batch-duplicated storage. Default: 1.
    pub batch_size: usize,
    /// Seed of every random initialiser and connectivity generator. Default: 0.
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            precision: Precision::Float,
            dt: 1.0,
            batch_size: 1,
            seed: 0,
        }
    }
}

impl ModelConfig {
    /// Set the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the precision.
    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    /// Set the timestep.
    pub fn with_dt(mut self, dt: f64) -> Self {
        self.dt = dt;
        self
    }

    /// Set the seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Validate all invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // 1. At least one lane.
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatch);
        }
        // 2. dt must be finite, positive and normal.
        if !self.dt.is_finite() || self.dt <= 0.0 || !self.dt.is_normal() {
            return Err(ConfigError::InvalidDt { value: self.dt });
        }
        Ok(())
    }
}

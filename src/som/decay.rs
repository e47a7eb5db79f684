//! Bounded exponential decay for the neighborhood radius and learning rate.
//!
//! A schedule holds `max_value` up to `start_iter`, falls exponentially to
//! `min_value` at `stop_iter`, then holds `min_value`:
//!
//! ```text
//! value
//!   max |--------.
//!       |         `.
//!       |           `-.
//!   min |              `-----------
//!       +--------+-----+----------> iteration
//!              start  stop
//! ```

use crate::error::{KohonenError, Result};
use serde::{Deserialize, Serialize};

/// Evaluates a bounded exponential decay at `curr_iter`.
///
/// Returns `max_value` for `curr_iter <= start_iter`, `min_value` for
/// `curr_iter >= stop_iter` (when `curr_iter > start_iter`), and a point on
/// the exponential through both boundary values in between.
///
/// # Errors
/// Returns [`KohonenError::Config`] if `start_iter > stop_iter`,
/// `max_value < min_value`, a value is not finite, or a decaying schedule
/// has a non-positive `min_value`.
pub fn decay(
    curr_iter: u64,
    start_iter: u64,
    stop_iter: u64,
    max_value: f64,
    min_value: f64,
) -> Result<f64> {
    validate(start_iter, stop_iter, max_value, min_value)?;
    Ok(evaluate(curr_iter, start_iter, stop_iter, max_value, min_value))
}

fn validate(start_iter: u64, stop_iter: u64, max_value: f64, min_value: f64) -> Result<()> {
    if start_iter > stop_iter {
        return Err(KohonenError::Config(format!(
            "start_iter ({}) must not exceed stop_iter ({})",
            start_iter, stop_iter
        )));
    }
    if !max_value.is_finite() || !min_value.is_finite() {
        return Err(KohonenError::Config(format!(
            "decay bounds must be finite (max_value = {}, min_value = {})",
            max_value, min_value
        )));
    }
    if max_value < min_value {
        return Err(KohonenError::Config(format!(
            "max_value ({}) must not be less than min_value ({})",
            max_value, min_value
        )));
    }
    if max_value > min_value && min_value <= 0.0 {
        return Err(KohonenError::Config(format!(
            "min_value ({}) must be positive for an exponential decay",
            min_value
        )));
    }
    Ok(())
}

#[inline]
fn evaluate(curr_iter: u64, start_iter: u64, stop_iter: u64, max_value: f64, min_value: f64) -> f64 {
    if curr_iter <= start_iter {
        return max_value;
    }
    // Also covers start_iter == stop_iter, so the span below is never zero.
    if curr_iter >= stop_iter {
        return min_value;
    }
    if max_value == min_value {
        return max_value;
    }

    let t = (curr_iter - start_iter) as f64 / (stop_iter - start_iter) as f64;
    max_value * (min_value / max_value).powf(t)
}

/// An immutable, validated decay schedule for one control parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecaySchedule {
    /// Last iteration of the initial plateau.
    pub start_iter: u64,
    /// Iteration at which the final plateau is reached.
    pub stop_iter: u64,
    /// Initial plateau value.
    pub max_value: f64,
    /// Final plateau value.
    pub min_value: f64,
}

impl DecaySchedule {
    /// Creates a schedule, rejecting malformed parameters.
    pub fn new(start_iter: u64, stop_iter: u64, max_value: f64, min_value: f64) -> Result<Self> {
        validate(start_iter, stop_iter, max_value, min_value)?;
        Ok(Self {
            start_iter,
            stop_iter,
            max_value,
            min_value,
        })
    }

    /// Creates a schedule that holds `value` for every iteration.
    pub fn constant(value: f64) -> Result<Self> {
        Self::new(0, 0, value, value)
    }

    /// Re-checks the invariants, e.g. after deserialization.
    pub fn validate(&self) -> Result<()> {
        validate(self.start_iter, self.stop_iter, self.max_value, self.min_value)
    }

    /// Returns the scheduled value at `iteration`.
    #[inline]
    pub fn value_at(&self, iteration: u64) -> f64 {
        evaluate(
            iteration,
            self.start_iter,
            self.stop_iter,
            self.max_value,
            self.min_value,
        )
    }
}

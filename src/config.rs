//! Configuration for the Kohonen training engine.

use crate::error::{KohonenError, Result};
use crate::som::{DecaySchedule, Topology};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// SOM training configuration.
    pub som: SomConfig,

    /// Checkpoint storage configuration.
    pub storage: StorageConfig,

    /// Post-training labeling configuration.
    pub labeling: LabelingConfig,
}

/// When the training loop snapshots the prototype map.
///
/// The final iteration is always checkpointed in addition to these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckpointCadence {
    /// `n` equally spaced checkpoints over the run, the last one being the final map.
    Count(usize),
    /// Checkpoint after each listed iteration.
    Iterations(Vec<u64>),
}

impl CheckpointCadence {
    /// Resolves the cadence to a sorted, deduplicated list of iterations
    /// strictly before `total_iterations`.
    pub fn resolve(&self, total_iterations: u64) -> Result<Vec<u64>> {
        let mut points: Vec<u64> = match self {
            CheckpointCadence::Count(n) => {
                let n = *n as u64;
                (1..n)
                    .map(|k| k * total_iterations / n)
                    .filter(|&it| it < total_iterations)
                    .collect()
            }
            CheckpointCadence::Iterations(list) => {
                if let Some(&bad) = list.iter().find(|&&it| it >= total_iterations) {
                    return Err(KohonenError::Config(format!(
                        "checkpoint iteration {} is not below total_iterations ({})",
                        bad, total_iterations
                    )));
                }
                list.clone()
            }
        };
        points.sort_unstable();
        points.dedup();
        Ok(points)
    }
}

impl Default for CheckpointCadence {
    fn default() -> Self {
        CheckpointCadence::Count(4)
    }
}

/// Self-Organizing Map training configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SomConfig {
    /// Grid rows.
    /// Default: 10.
    pub rows: usize,

    /// Grid columns.
    /// Default: 10.
    pub cols: usize,

    /// Dimensionality of the prototype and input vectors.
    /// Default: 784 (28x28 images).
    pub vector_dim: usize,

    /// Number of training iterations (one sample each).
    /// Default: 10,000.
    pub total_iterations: u64,

    /// Neighborhood radius schedule.
    /// Default: 2.0 -> 0.9 between iterations 2,000 and 6,000.
    pub sigma: DecaySchedule,

    /// Learning rate schedule.
    /// Default: 0.2 -> 0.001 between iterations 2,000 and 6,000.
    pub eta: DecaySchedule,

    /// Checkpoint cadence.
    /// Default: 4 equally spaced checkpoints.
    pub checkpoints: CheckpointCadence,

    /// Random seed for reproducibility.
    /// Default: None (random).
    pub seed: Option<u64>,

    /// Log progress every this many iterations (0 disables).
    /// Default: 1,000.
    pub log_interval: u64,
}

impl Default for SomConfig {
    fn default() -> Self {
        Self {
            rows: 10,
            cols: 10,
            vector_dim: 784,
            total_iterations: 10_000,
            sigma: DecaySchedule {
                start_iter: 2_000,
                stop_iter: 6_000,
                max_value: 2.0,
                min_value: 0.9,
            },
            eta: DecaySchedule {
                start_iter: 2_000,
                stop_iter: 6_000,
                max_value: 0.2,
                min_value: 0.001,
            },
            checkpoints: CheckpointCadence::default(),
            seed: None,
            log_interval: 1_000,
        }
    }
}

impl SomConfig {
    /// Returns the total number of units in the map.
    #[inline]
    pub fn total_units(&self) -> usize {
        self.rows * self.cols
    }

    /// Returns the grid topology.
    pub fn topology(&self) -> Result<Topology> {
        Topology::new(self.rows, self.cols)
    }

    /// Checks every invariant the training loop relies on.
    pub fn validate(&self) -> Result<()> {
        self.topology()?;
        if self.vector_dim == 0 {
            return Err(KohonenError::Config(
                "vector_dim must be positive".to_string(),
            ));
        }
        if self.total_iterations == 0 {
            return Err(KohonenError::Config(
                "total_iterations must be positive".to_string(),
            ));
        }
        self.sigma.validate()?;
        self.eta.validate()?;
        if self.sigma.min_value <= 0.0 {
            return Err(KohonenError::Config(format!(
                "sigma must stay positive (min_value = {})",
                self.sigma.min_value
            )));
        }
        self.checkpoints.resolve(self.total_iterations)?;
        Ok(())
    }
}

/// Checkpoint storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory receiving checkpoint files.
    /// Default: "weights".
    pub checkpoint_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            checkpoint_dir: PathBuf::from("weights"),
        }
    }
}

/// Post-training labeling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelingConfig {
    /// Bandwidth of the Gaussian vote spread around each BMU.
    /// Default: 0.5.
    pub sigma: f64,
}

impl Default for LabelingConfig {
    fn default() -> Self {
        Self {
            sigma: crate::DEFAULT_LABEL_SIGMA,
        }
    }
}

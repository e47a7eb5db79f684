//! # Kohonen - Self-Organizing Map Training Engine
//!
//! An online Self-Organizing Map (SOM): a 2D grid of prototype vectors
//! trained so that nearby units respond to similar inputs.
//!
//! ## Overview
//!
//! Each training iteration draws one sample, finds its Best Matching Unit
//! (BMU), and pulls every prototype toward the sample, weighted by a
//! Gaussian field centered on the BMU. The field bandwidth (sigma) and the
//! learning rate (eta) follow bounded exponential decay schedules.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use kohonen::{SomConfig, SomTrainer, DirectoryStore};
//!
//! let config = SomConfig {
//!     vector_dim: 64,
//!     seed: Some(42),
//!     ..Default::default()
//! };
//!
//! let mut trainer = SomTrainer::new(config)?;
//! let mut store = DirectoryStore::create("weights")?;
//! let report = trainer.run(&training_vectors, &mut store)?;
//! ```
//!
//! ## Architecture
//!
//! - [`som`] - decay schedules, neighborhood kernel, BMU search, update rule, training loop
//! - [`dataset`] - input vector sets
//! - [`storage`] - checkpoint persistence
//! - [`labeling`] - post-training unit labeling
//! - [`decision`] - classification and error rate on held-out data

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod dataset;
pub mod decision;
pub mod error;
pub mod labeling;
pub mod som;
pub mod storage;

// Re-export commonly used types
pub use config::{CheckpointCadence, Config, LabelingConfig, SomConfig, StorageConfig};
pub use dataset::{Dataset, LabeledDataset, VectorSet};
pub use decision::{evaluate, evaluate_checkpoints, Evaluation};
pub use error::{KohonenError, Result};
pub use labeling::{label_checkpoints, label_units, UnitLabels};
pub use som::{
    decay, gaussian_field, nearest, update, Bmu, DecaySchedule, GridPosition, PrototypeMap,
    RandomSampler, Sampler, SequentialSampler, SomTrainer, StopSignal, Topology, TrainerState,
    TrainingReport,
};
pub use storage::{Checkpoint, CheckpointSink, CheckpointStore, DirectoryStore, MemoryStore, NullSink};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default Gaussian bandwidth used when labeling units.
pub const DEFAULT_LABEL_SIGMA: f64 = 0.5;

//! Self-Organizing Map (SOM) training engine.
//!
//! - **Decay**: bounded exponential schedules for sigma and eta (decay.rs)
//! - **Kernel**: Gaussian neighborhood field over the grid (kernel.rs)
//! - **Map**: prototype matrix, BMU search and the update rule (map.rs)
//! - **Training**: the online training loop (training.rs)

mod decay;
mod kernel;
mod map;
pub mod training;

pub use decay::{decay, DecaySchedule};
pub use kernel::{fill_gaussian_field, gaussian_field};
pub use map::{nearest, nearest_parallel, update, Bmu, GridPosition, PrototypeMap, Topology};
pub use training::{
    RandomSampler, Sampler, SequentialSampler, SomTrainer, StopSignal, TrainerState,
    TrainingProgress, TrainingReport,
};

//! Online SOM training loop.
//!
//! Each iteration draws one sample, evaluates the sigma and eta schedules,
//! finds the BMU, builds the Gaussian field around it and applies the
//! Kohonen update. Checkpoints are emitted at the configured cadence and
//! after the last iteration.

use crate::config::SomConfig;
use crate::dataset::Dataset;
use crate::error::{KohonenError, Result};
use crate::som::kernel::fill_gaussian_field;
use crate::som::map::{self, Bmu, PrototypeMap};
use crate::storage::{Checkpoint, CheckpointSink};
use log::{error, info, warn};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Maps with at least this many units use the parallel BMU search.
pub const PARALLEL_BMU_THRESHOLD: usize = 4096;

/// Source of sample indices for the training loop.
pub trait Sampler {
    /// Returns the index of the next sample in `0..len`. `len` is never zero.
    fn next_index(&mut self, len: usize) -> usize;
}

/// Uniform sampling with replacement.
#[derive(Debug, Clone)]
pub struct RandomSampler {
    rng: ChaCha8Rng,
}

impl RandomSampler {
    /// Creates a sampler. `None` seeds from system entropy.
    pub fn new(seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        // Keep sampling independent of the stream used for map initialization.
        rng.set_stream(1);
        Self { rng }
    }
}

impl Sampler for RandomSampler {
    fn next_index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }
}

/// Cyclic sampling `0, 1, 2, ..., len-1, 0, ...`.
#[derive(Debug, Clone, Default)]
pub struct SequentialSampler {
    next: usize,
}

impl SequentialSampler {
    /// Creates a sampler starting at index 0.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Sampler for SequentialSampler {
    fn next_index(&mut self, len: usize) -> usize {
        let idx = self.next % len;
        self.next = idx + 1;
        idx
    }
}

/// Cooperative cancellation flag shared with the training loop.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    /// Creates a lowered signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks the loop to stop before its next iteration.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once `stop` has been called.
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Lifecycle of a trainer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainerState {
    /// Constructed, not yet run.
    Idle,
    /// Inside `run`.
    Running,
    /// All iterations applied and the final checkpoint emitted.
    Completed,
    /// Stopped early through a [`StopSignal`].
    Stopped,
    /// A component failed; the map holds the last fully applied update.
    Failed,
}

/// Per-iteration progress passed to the callback of
/// [`SomTrainer::run_with_progress`].
#[derive(Debug, Clone, Copy)]
pub struct TrainingProgress {
    /// Iteration just applied.
    pub iteration: u64,
    /// Total iterations of the run.
    pub total: u64,
    /// Neighborhood radius used.
    pub sigma: f64,
    /// Learning rate used.
    pub eta: f64,
    /// BMU of the sample.
    pub bmu: Bmu,
}

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct TrainingReport {
    /// Number of updates applied.
    pub iterations_completed: u64,
    /// Tags of every checkpoint emitted, in order.
    pub checkpoints: Vec<u64>,
    /// Sigma of the last applied iteration.
    pub final_sigma: f64,
    /// Eta of the last applied iteration.
    pub final_eta: f64,
    /// Mean BMU distance over all applied iterations.
    pub mean_quantization_error: f64,
    /// Terminal state.
    pub state: TrainerState,
}

/// SOM trainer owning the prototype map for the duration of a run.
pub struct SomTrainer {
    config: SomConfig,
    map: PrototypeMap,
    sampler: Box<dyn Sampler + Send>,
    stop: StopSignal,
    state: TrainerState,
}

impl SomTrainer {
    /// Creates a trainer with a randomly initialized map.
    ///
    /// Weights are uniform in `[0, 1)`, drawn from the configured seed.
    pub fn new(config: SomConfig) -> Result<Self> {
        config.validate()?;
        let mut rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let map = PrototypeMap::random(config.topology()?, config.vector_dim, &mut rng)?;
        Ok(Self::assemble(config, map))
    }

    /// Creates a trainer starting from an existing map.
    pub fn with_map(config: SomConfig, map: PrototypeMap) -> Result<Self> {
        config.validate()?;
        if map.topology() != config.topology()? {
            return Err(KohonenError::Config(format!(
                "map topology {}x{} does not match configured {}x{}",
                map.topology().rows(),
                map.topology().cols(),
                config.rows,
                config.cols
            )));
        }
        if map.dim() != config.vector_dim {
            return Err(KohonenError::DimensionMismatch {
                expected: config.vector_dim,
                actual: map.dim(),
            });
        }
        Ok(Self::assemble(config, map))
    }

    fn assemble(config: SomConfig, map: PrototypeMap) -> Self {
        let sampler = Box::new(RandomSampler::new(config.seed));
        Self {
            config,
            map,
            sampler,
            stop: StopSignal::new(),
            state: TrainerState::Idle,
        }
    }

    /// Replaces the sample index source.
    pub fn with_sampler<S: Sampler + Send + 'static>(mut self, sampler: S) -> Self {
        self.sampler = Box::new(sampler);
        self
    }

    /// Installs a cancellation signal.
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// The training configuration.
    pub fn config(&self) -> &SomConfig {
        &self.config
    }

    /// Current state.
    pub fn state(&self) -> TrainerState {
        self.state
    }

    /// Read access to the map. After a failure this is the last valid state.
    pub fn map(&self) -> &PrototypeMap {
        &self.map
    }

    /// Consumes the trainer, returning the map.
    pub fn into_map(self) -> PrototypeMap {
        self.map
    }

    /// Neighborhood radius at `iteration`.
    #[inline]
    pub fn sigma(&self, iteration: u64) -> f64 {
        self.config.sigma.value_at(iteration)
    }

    /// Learning rate at `iteration`.
    #[inline]
    pub fn eta(&self, iteration: u64) -> f64 {
        self.config.eta.value_at(iteration)
    }

    /// Runs the full training loop.
    pub fn run<D, S>(&mut self, dataset: &D, sink: &mut S) -> Result<TrainingReport>
    where
        D: Dataset + ?Sized,
        S: CheckpointSink + ?Sized,
    {
        self.run_with_progress(dataset, sink, |_| {})
    }

    /// Runs the full training loop, calling `progress` after every update.
    pub fn run_with_progress<D, S, F>(
        &mut self,
        dataset: &D,
        sink: &mut S,
        mut progress: F,
    ) -> Result<TrainingReport>
    where
        D: Dataset + ?Sized,
        S: CheckpointSink + ?Sized,
        F: FnMut(&TrainingProgress),
    {
        if self.state != TrainerState::Idle {
            return Err(KohonenError::InvalidState(format!(
                "run requires an idle trainer, state is {:?}",
                self.state
            )));
        }
        if dataset.is_empty() {
            return Err(KohonenError::EmptyInput(
                "No training vectors provided".to_string(),
            ));
        }

        let total = self.config.total_iterations;
        let checkpoint_points = self.config.checkpoints.resolve(total)?;

        info!(
            "Starting SOM training: {} iterations, {} samples, {}x{} units, {} dim",
            total,
            dataset.len(),
            self.config.rows,
            self.config.cols,
            self.config.vector_dim
        );

        self.state = TrainerState::Running;
        match self.train_loop(dataset, sink, &checkpoint_points, &mut progress) {
            Ok(report) => {
                self.state = report.state;
                Ok(report)
            }
            Err(e) => {
                self.state = TrainerState::Failed;
                error!("SOM training failed: {}", e);
                Err(e)
            }
        }
    }

    fn train_loop<D, S, F>(
        &mut self,
        dataset: &D,
        sink: &mut S,
        checkpoint_points: &[u64],
        progress: &mut F,
    ) -> Result<TrainingReport>
    where
        D: Dataset + ?Sized,
        S: CheckpointSink + ?Sized,
        F: FnMut(&TrainingProgress),
    {
        let total = self.config.total_iterations;
        let topology = self.map.topology();
        let use_parallel = self.map.units() >= PARALLEL_BMU_THRESHOLD;
        let log_interval = self.config.log_interval;

        let mut field = vec![0.0; self.map.units()];
        let mut next_checkpoint = checkpoint_points.iter().peekable();
        let mut emitted = Vec::with_capacity(checkpoint_points.len() + 1);
        let mut distance_sum = 0.0;
        let mut sigma = self.sigma(0);
        let mut eta = self.eta(0);
        let mut completed = 0u64;

        for iteration in 0..total {
            if self.stop.is_stopped() {
                warn!("SOM training stopped after {} of {} iterations", completed, total);
                self.emit(sink, completed, &mut emitted)?;
                return Ok(TrainingReport {
                    iterations_completed: completed,
                    checkpoints: emitted,
                    final_sigma: sigma,
                    final_eta: eta,
                    mean_quantization_error: mean(distance_sum, completed),
                    state: TrainerState::Stopped,
                });
            }

            let idx = self.sampler.next_index(dataset.len());
            if idx >= dataset.len() {
                return Err(KohonenError::OutOfRange {
                    index: idx,
                    max: dataset.len(),
                });
            }
            let sample = dataset.sample(idx);

            sigma = self.sigma(iteration);
            eta = self.eta(iteration);

            let bmu = if use_parallel {
                map::nearest_parallel(sample, &self.map)?
            } else {
                map::nearest(sample, &self.map)?
            };
            let center = topology.to_2d(bmu.index)?;
            fill_gaussian_field(topology, center, sigma, &mut field)?;
            map::update(&mut self.map, sample, eta, &field)?;

            completed = iteration + 1;
            distance_sum += bmu.distance;

            progress(&TrainingProgress {
                iteration,
                total,
                sigma,
                eta,
                bmu,
            });

            if log_interval > 0 && iteration % log_interval == 0 {
                info!(
                    "Iteration {}/{}: sigma={:.4}, eta={:.4}, bmu={} (distance {:.4})",
                    iteration, total, sigma, eta, bmu.index, bmu.distance
                );
            }

            if next_checkpoint.peek() == Some(&&iteration) {
                next_checkpoint.next();
                self.emit(sink, iteration, &mut emitted)?;
            }
        }

        self.emit(sink, total, &mut emitted)?;
        info!(
            "SOM training completed: {} checkpoints, mean quantization error {:.4}",
            emitted.len(),
            mean(distance_sum, completed)
        );

        Ok(TrainingReport {
            iterations_completed: completed,
            checkpoints: emitted,
            final_sigma: sigma,
            final_eta: eta,
            mean_quantization_error: mean(distance_sum, completed),
            state: TrainerState::Completed,
        })
    }

    fn emit<S: CheckpointSink + ?Sized>(
        &self,
        sink: &mut S,
        tag: u64,
        emitted: &mut Vec<u64>,
    ) -> Result<()> {
        sink.store(Checkpoint {
            tag,
            map: self.map.clone(),
        })?;
        emitted.push(tag);
        Ok(())
    }
}

#[inline]
fn mean(sum: f64, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

//! Integration tests for the Kohonen training engine.

use approx::assert_abs_diff_eq;
use kohonen::{
    decay, evaluate, evaluate_checkpoints, gaussian_field, label_checkpoints, label_units,
    nearest, update, CheckpointCadence, CheckpointStore, DecaySchedule, DirectoryStore,
    GridPosition, KohonenError, MemoryStore, NullSink, PrototypeMap, SequentialSampler,
    SomConfig, SomTrainer, Topology, TrainerState, UnitLabels, VectorSet,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tempfile::tempdir;

/// Four well separated clusters in 4 dimensions, labeled 0..4.
fn clustered_set(per_class: usize, seed: u64) -> VectorSet {
    let centers = [
        [0.1, 0.1, 0.1, 0.1],
        [0.9, 0.1, 0.9, 0.1],
        [0.1, 0.9, 0.1, 0.9],
        [0.9, 0.9, 0.9, 0.9],
    ];
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut vectors = Vec::new();
    let mut labels = Vec::new();

    for (class, center) in centers.iter().enumerate() {
        for _ in 0..per_class {
            let v: Vec<f64> = center
                .iter()
                .map(|c| c + rng.gen_range(-0.05..0.05))
                .collect();
            vectors.push(v);
            labels.push(class);
        }
    }

    VectorSet::with_labels(vectors, labels).unwrap()
}

fn small_config(seed: u64) -> SomConfig {
    SomConfig {
        rows: 5,
        cols: 5,
        vector_dim: 4,
        total_iterations: 2_000,
        sigma: DecaySchedule::new(400, 1_200, 2.0, 0.5).unwrap(),
        eta: DecaySchedule::new(400, 1_200, 0.3, 0.01).unwrap(),
        checkpoints: CheckpointCadence::Count(4),
        seed: Some(seed),
        log_interval: 0,
    }
}

#[test]
fn test_decay_reference_values() {
    assert_eq!(decay(0, 60, 60, 50.0, 10.0).unwrap(), 50.0);
    assert_eq!(decay(100, 60, 60, 50.0, 10.0).unwrap(), 10.0);
    assert!(matches!(
        decay(0, 80, 60, 50.0, 10.0),
        Err(KohonenError::Config(_))
    ));
    assert!(matches!(
        decay(0, 200, 60, 10.0, 50.0),
        Err(KohonenError::Config(_))
    ));
}

#[test]
fn test_nearest_reference_values() {
    let topology = Topology::new(4, 1).unwrap();
    let map = PrototypeMap::from_rows(
        topology,
        &[
            vec![0.0, 1.0],
            vec![3.0, 3.0],
            vec![0.0, 0.0],
            vec![1.0, 1.0],
        ],
    )
    .unwrap();

    let bmu = nearest(&[2.0, 2.0], &map).unwrap();
    assert_eq!(bmu.index, 1);
    assert_abs_diff_eq!(bmu.distance, 1.41421356, epsilon = 1e-8);

    assert!(matches!(
        nearest(&[2.0, 2.0, 2.0], &map),
        Err(KohonenError::DimensionMismatch {
            expected: 2,
            actual: 3
        })
    ));
}

#[test]
fn test_kernel_peak_matches_center_for_every_unit() {
    let topology = Topology::new(4, 6).unwrap();
    for index in 0..topology.units() {
        let center = topology.to_2d(index).unwrap();
        let field = gaussian_field(topology, center, 1.3).unwrap();
        let max = field.iter().cloned().fold(f64::MIN, f64::max);
        assert_eq!(max, 1.0);
        assert_eq!(field[index], 1.0);
        assert_eq!(field.iter().filter(|&&v| v == 1.0).count(), 1);
    }
}

#[test]
fn test_single_step_by_hand() {
    let topology = Topology::new(2, 2).unwrap();
    let mut map = PrototypeMap::zeros(topology, 2).unwrap();
    let sample = [1.0, 0.5];

    let bmu = nearest(&sample, &map).unwrap();
    assert_eq!(bmu.index, 0);

    let field = gaussian_field(topology, GridPosition::new(0, 0), 1.0).unwrap();
    update(&mut map, &sample, 0.5, &field).unwrap();

    let diag = (-1.0f64).exp();
    let side = (-0.5f64).exp();
    assert_abs_diff_eq!(map.prototype(0).unwrap()[0], 0.5, epsilon = 1e-12);
    assert_abs_diff_eq!(map.prototype(1).unwrap()[0], 0.5 * side, epsilon = 1e-12);
    assert_abs_diff_eq!(map.prototype(3).unwrap()[1], 0.25 * diag, epsilon = 1e-12);
}

#[test]
fn test_training_is_bit_reproducible() {
    let data = clustered_set(20, 1);

    let mut first = SomTrainer::new(small_config(7)).unwrap();
    let mut first_store = MemoryStore::new();
    let first_report = first.run(&data, &mut first_store).unwrap();

    let mut second = SomTrainer::new(small_config(7)).unwrap();
    let mut second_store = MemoryStore::new();
    let second_report = second.run(&data, &mut second_store).unwrap();

    assert_eq!(first.map().as_slice(), second.map().as_slice());
    assert_eq!(first_report.checkpoints, second_report.checkpoints);
    for tag in first_store.tags().unwrap() {
        assert_eq!(first_store.load(tag).unwrap(), second_store.load(tag).unwrap());
    }
    assert_eq!(
        first_report.mean_quantization_error.to_bits(),
        second_report.mean_quantization_error.to_bits()
    );

    let mut other = SomTrainer::new(small_config(8)).unwrap();
    other.run(&data, &mut NullSink).unwrap();
    assert_ne!(first.map().as_slice(), other.map().as_slice());
}

#[test]
fn test_sequential_sampler_is_reproducible_from_given_map() {
    let data = clustered_set(5, 2);
    let start = PrototypeMap::zeros(Topology::new(5, 5).unwrap(), 4).unwrap();

    let run = || {
        let mut trainer = SomTrainer::with_map(small_config(0), start.clone())
            .unwrap()
            .with_sampler(SequentialSampler::new());
        trainer.run(&data, &mut NullSink).unwrap();
        trainer.into_map()
    };

    assert_eq!(run(), run());
}

#[test]
fn test_checkpoints_written_to_directory() {
    let dir = tempdir().unwrap();
    let data = clustered_set(10, 3);

    let mut store = DirectoryStore::create(dir.path().join("weights")).unwrap();
    let mut trainer = SomTrainer::new(small_config(11)).unwrap();
    let report = trainer.run(&data, &mut store).unwrap();

    assert_eq!(report.state, TrainerState::Completed);
    assert_eq!(report.checkpoints, vec![500, 1_000, 1_500, 2_000]);
    assert_eq!(store.tags().unwrap(), vec![500, 1_000, 1_500, 2_000]);

    let final_map = store.load(2_000).unwrap();
    assert_eq!(&final_map, trainer.map());

    // Earlier snapshots differ from the final map.
    assert_ne!(store.load(500).unwrap(), final_map);
}

#[test]
fn test_explicit_checkpoint_iterations() {
    let data = clustered_set(5, 4);
    let mut config = small_config(5);
    config.checkpoints = CheckpointCadence::Iterations(vec![0, 999]);

    let mut store = MemoryStore::new();
    let report = SomTrainer::new(config).unwrap().run(&data, &mut store).unwrap();
    assert_eq!(report.checkpoints, vec![0, 999, 2_000]);
}

#[test]
fn test_label_and_evaluate_pipeline() {
    let train = clustered_set(40, 10);
    let reference = clustered_set(15, 20);
    let test = clustered_set(15, 30);

    let mut trainer = SomTrainer::new(small_config(99)).unwrap();
    trainer.run(&train, &mut NullSink).unwrap();
    let map = trainer.into_map();

    let labels = label_units(&map, &reference, 4, 0.5).unwrap();
    let evaluation = evaluate(&map, &labels, &test).unwrap();

    assert_eq!(evaluation.total, 60);
    assert!(
        evaluation.error_rate() < 0.1,
        "error rate too high: {}",
        evaluation.error_rate()
    );
}

#[test]
fn test_error_rate_for_every_checkpoint() {
    let dir = tempdir().unwrap();
    let train = clustered_set(40, 40);
    let reference = clustered_set(15, 41);
    let test = clustered_set(15, 42);

    let mut store = DirectoryStore::create(dir.path().join("weights")).unwrap();
    SomTrainer::new(small_config(3))
        .unwrap()
        .run(&train, &mut store)
        .unwrap();

    // Label every checkpoint to disk, then read the labels back.
    let labels_dir = dir.path().join("labels");
    std::fs::create_dir_all(&labels_dir).unwrap();
    for (tag, labels) in label_checkpoints(&store, &reference, 4, 0.5).unwrap() {
        labels.save(UnitLabels::path_for(&labels_dir, tag)).unwrap();
    }

    let store = DirectoryStore::open(dir.path().join("weights")).unwrap();
    let labels: Vec<(u64, UnitLabels)> = store
        .tags()
        .unwrap()
        .into_iter()
        .map(|tag| (tag, UnitLabels::load(UnitLabels::path_for(&labels_dir, tag)).unwrap()))
        .collect();

    let series = evaluate_checkpoints(&store, &labels, &test).unwrap();
    let tags: Vec<u64> = series.iter().map(|(tag, _)| *tag).collect();
    assert_eq!(tags, vec![500, 1_000, 1_500, 2_000]);
    for (_, evaluation) in &series {
        assert_eq!(evaluation.total, 60);
        assert!((0.0..=1.0).contains(&evaluation.error_rate()));
    }
    let (_, last) = &series[3];
    assert!(last.error_rate() < 0.1, "final error rate {}", last.error_rate());
}

#[test]
fn test_non_finite_sample_fails_training() {
    let data = vec![vec![0.2; 4], vec![f64::NAN, 0.0, 0.0, 0.0]];
    let mut trainer = SomTrainer::new(small_config(2))
        .unwrap()
        .with_sampler(SequentialSampler::new());

    let err = trainer.run(&data, &mut NullSink).unwrap_err();
    assert!(matches!(err, KohonenError::NonFinite(_)));
    assert_eq!(trainer.state(), TrainerState::Failed);
    assert!(trainer.map().as_slice().iter().all(|w| w.is_finite()));
}

#[test]
fn test_failed_run_leaves_map_readable() {
    let mut data: Vec<Vec<f64>> = (0..3).map(|i| vec![i as f64 * 0.3; 4]).collect();
    data.push(vec![0.0; 5]);

    let mut trainer = SomTrainer::new(small_config(1))
        .unwrap()
        .with_sampler(SequentialSampler::new());
    let mut store = MemoryStore::new();

    let err = trainer.run(&data, &mut store).unwrap_err();
    assert!(matches!(err, KohonenError::DimensionMismatch { .. }));
    assert_eq!(trainer.state(), TrainerState::Failed);
    assert!(store.is_empty());
    assert_eq!(trainer.map().units(), 25);
    assert!(trainer.map().as_slice().iter().all(|w| w.is_finite()));
}

//! Post-training unit labeling by Gaussian-weighted majority vote.
//!
//! Every labeled reference vector votes for its class on the unit it maps
//! to, with the vote spread to nearby units by a narrow Gaussian field.
//! Each unit takes the class with the highest accumulated score.

use crate::dataset::LabeledDataset;
use crate::error::{KohonenError, Result};
use crate::som::{fill_gaussian_field, nearest, PrototypeMap, Topology};
use crate::storage::CheckpointStore;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// Class label assigned to each map unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitLabels {
    topology: Topology,
    num_classes: usize,
    labels: Vec<usize>,
}

impl UnitLabels {
    /// Grid shape the labels belong to.
    pub fn topology(&self) -> Topology {
        self.topology
    }

    /// Number of classes voted over.
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Label of unit `index`.
    pub fn get(&self, index: usize) -> Option<usize> {
        self.labels.get(index).copied()
    }

    /// Labels in unit order.
    pub fn as_slice(&self) -> &[usize] {
        &self.labels
    }

    /// Path of the label file for checkpoint `tag` inside `dir`.
    pub fn path_for<P: AsRef<Path>>(dir: P, tag: u64) -> PathBuf {
        dir.as_ref().join(format!("labels_{}.klab", tag))
    }

    /// Saves the labels with bincode.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(writer, self)?;
        Ok(())
    }

    /// Loads labels saved by [`UnitLabels::save`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let labels: Self = bincode::deserialize_from(reader)?;
        if labels.labels.len() != labels.topology.units() {
            return Err(KohonenError::Serialization(format!(
                "label file holds {} labels for {} units",
                labels.labels.len(),
                labels.topology.units()
            )));
        }
        if let Some(&bad) = labels.labels.iter().find(|&&l| l >= labels.num_classes) {
            return Err(KohonenError::Serialization(format!(
                "label {} is not below num_classes ({})",
                bad, labels.num_classes
            )));
        }
        Ok(labels)
    }
}

/// Labels every unit of `map` from a labeled reference set.
///
/// Units that receive no votes at all get class 0.
pub fn label_units<D>(
    map: &PrototypeMap,
    dataset: &D,
    num_classes: usize,
    sigma: f64,
) -> Result<UnitLabels>
where
    D: LabeledDataset + ?Sized,
{
    if dataset.is_empty() {
        return Err(KohonenError::EmptyInput(
            "No labeled reference vectors provided".to_string(),
        ));
    }
    if num_classes == 0 {
        return Err(KohonenError::Config(
            "num_classes must be positive".to_string(),
        ));
    }

    let topology = map.topology();
    let units = topology.units();
    // scores[unit * num_classes + class]
    let mut scores = vec![0.0; units * num_classes];
    let mut field = vec![0.0; units];

    for i in 0..dataset.len() {
        let class = dataset.label(i);
        if class >= num_classes {
            return Err(KohonenError::OutOfRange {
                index: class,
                max: num_classes,
            });
        }

        let bmu = nearest(dataset.sample(i), map)?;
        fill_gaussian_field(topology, topology.to_2d(bmu.index)?, sigma, &mut field)?;
        for (unit, &h) in field.iter().enumerate() {
            scores[unit * num_classes + class] += h;
        }
    }

    let labels: Vec<usize> = scores.chunks_exact(num_classes).map(argmax).collect();
    info!(
        "Labeled {} units from {} reference vectors",
        units,
        dataset.len()
    );

    Ok(UnitLabels {
        topology,
        num_classes,
        labels,
    })
}

/// Labels the map of every checkpoint in `store`, in ascending tag order.
pub fn label_checkpoints<S, D>(
    store: &S,
    dataset: &D,
    num_classes: usize,
    sigma: f64,
) -> Result<Vec<(u64, UnitLabels)>>
where
    S: CheckpointStore + ?Sized,
    D: LabeledDataset + ?Sized,
{
    let tags = store.tags()?;
    if tags.is_empty() {
        return Err(KohonenError::EmptyInput(
            "No checkpoints to label".to_string(),
        ));
    }

    tags.into_iter()
        .map(|tag| {
            let map = store.load(tag)?;
            let labels = label_units(&map, dataset, num_classes, sigma)?;
            Ok((tag, labels))
        })
        .collect()
}

/// Index of the largest value; the lowest index wins ties.
fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}

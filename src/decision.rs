//! Classification of held-out vectors through a labeled map.

use crate::dataset::LabeledDataset;
use crate::error::{KohonenError, Result};
use crate::labeling::UnitLabels;
use crate::som::{nearest, PrototypeMap};
use crate::storage::CheckpointStore;
use log::info;

/// Outcome of classifying a labeled test set.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Number of vectors classified.
    pub total: usize,
    /// Number of misclassified vectors.
    pub errors: usize,
    /// Misclassifications attributed to each unit (by BMU).
    pub unit_errors: Vec<usize>,
}

impl Evaluation {
    /// Fraction of misclassified vectors.
    pub fn error_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.errors as f64 / self.total as f64
        }
    }

    /// Misclassification rate in percent.
    pub fn error_percent(&self) -> f64 {
        self.error_rate() * 100.0
    }
}

/// Classifies every vector of `dataset` by the label of its BMU and counts
/// disagreements with the true labels.
pub fn evaluate<D>(map: &PrototypeMap, labels: &UnitLabels, dataset: &D) -> Result<Evaluation>
where
    D: LabeledDataset + ?Sized,
{
    if labels.topology() != map.topology() {
        return Err(KohonenError::DimensionMismatch {
            expected: map.units(),
            actual: labels.topology().units(),
        });
    }
    if dataset.is_empty() {
        return Err(KohonenError::EmptyInput(
            "No test vectors provided".to_string(),
        ));
    }

    let mut unit_errors = vec![0usize; map.units()];
    let mut errors = 0;

    for i in 0..dataset.len() {
        let bmu = nearest(dataset.sample(i), map)?;
        let predicted = labels.get(bmu.index).ok_or(KohonenError::OutOfRange {
            index: bmu.index,
            max: map.units(),
        })?;
        if predicted != dataset.label(i) {
            unit_errors[bmu.index] += 1;
            errors += 1;
        }
    }

    let evaluation = Evaluation {
        total: dataset.len(),
        errors,
        unit_errors,
    };
    info!(
        "Evaluated {} vectors: {} errors ({:.2}%)",
        evaluation.total,
        evaluation.errors,
        evaluation.error_percent()
    );
    Ok(evaluation)
}

/// Evaluates each checkpoint of `store` against its labels.
///
/// Returns one `(tag, evaluation)` entry per element of `labels`, in the
/// same order, so the error rate can be followed across the run.
pub fn evaluate_checkpoints<S, D>(
    store: &S,
    labels: &[(u64, UnitLabels)],
    dataset: &D,
) -> Result<Vec<(u64, Evaluation)>>
where
    S: CheckpointStore + ?Sized,
    D: LabeledDataset + ?Sized,
{
    if labels.is_empty() {
        return Err(KohonenError::EmptyInput(
            "No labeled checkpoints to evaluate".to_string(),
        ));
    }

    labels
        .iter()
        .map(|(tag, unit_labels)| {
            let map = store.load(*tag)?;
            Ok((*tag, evaluate(&map, unit_labels, dataset)?))
        })
        .collect()
}

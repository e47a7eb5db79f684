//! Training and reference vector sets.
//!
//! The trainer only needs random access by index and a known count, so any
//! type implementing [`Dataset`] can feed it.

use crate::error::{KohonenError, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// A finite, indexable sequence of input vectors.
pub trait Dataset {
    /// Number of vectors.
    fn len(&self) -> usize;

    /// The vector at `index`. Panics if `index >= len()`.
    fn sample(&self, index: usize) -> &[f64];

    /// Returns true if there are no vectors.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A dataset whose vectors carry integer class labels.
pub trait LabeledDataset: Dataset {
    /// Class label of the vector at `index`.
    fn label(&self, index: usize) -> usize;
}

impl Dataset for [Vec<f64>] {
    fn len(&self) -> usize {
        <[Vec<f64>]>::len(self)
    }

    fn sample(&self, index: usize) -> &[f64] {
        &self[index]
    }
}

impl Dataset for Vec<Vec<f64>> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn sample(&self, index: usize) -> &[f64] {
        &self[index]
    }
}

/// An in-memory set of vectors with optional labels.
#[derive(Debug, Clone, Default)]
pub struct VectorSet {
    vectors: Vec<Vec<f64>>,
    labels: Option<Vec<usize>>,
}

impl VectorSet {
    /// Creates an unlabeled set.
    pub fn new(vectors: Vec<Vec<f64>>) -> Self {
        Self {
            vectors,
            labels: None,
        }
    }

    /// Creates a labeled set. Both sequences must have the same length.
    pub fn with_labels(vectors: Vec<Vec<f64>>, labels: Vec<usize>) -> Result<Self> {
        if vectors.len() != labels.len() {
            return Err(KohonenError::DimensionMismatch {
                expected: vectors.len(),
                actual: labels.len(),
            });
        }
        Ok(Self {
            vectors,
            labels: Some(labels),
        })
    }

    /// Loads vectors from a text file, one per line.
    ///
    /// Values are separated by whitespace or commas. Blank lines and lines
    /// starting with `#` are skipped. With `labeled`, the first column is an
    /// integer class label. `NaN` and infinite values are rejected.
    pub fn load_text<P: AsRef<Path>>(path: P, labeled: bool) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let mut vectors = Vec::new();
        let mut labels = Vec::new();
        let mut dim: Option<usize> = None;

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let mut fields = trimmed
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|f| !f.is_empty());

            if labeled {
                let raw = fields.next().unwrap_or_default();
                let label = raw.parse::<usize>().map_err(|e| {
                    KohonenError::Serialization(format!(
                        "line {}: bad label {:?}: {}",
                        line_no + 1,
                        raw,
                        e
                    ))
                })?;
                labels.push(label);
            }

            let vector = fields
                .map(|f| {
                    let value = f.parse::<f64>().map_err(|e| {
                        KohonenError::Serialization(format!(
                            "line {}: bad value {:?}: {}",
                            line_no + 1,
                            f,
                            e
                        ))
                    })?;
                    if !value.is_finite() {
                        return Err(KohonenError::Serialization(format!(
                            "line {}: non-finite value {:?}",
                            line_no + 1,
                            f
                        )));
                    }
                    Ok(value)
                })
                .collect::<Result<Vec<f64>>>()?;

            match dim {
                None => dim = Some(vector.len()),
                Some(d) if d != vector.len() => {
                    return Err(KohonenError::DimensionMismatch {
                        expected: d,
                        actual: vector.len(),
                    });
                }
                Some(_) => {}
            }
            vectors.push(vector);
        }

        Ok(Self {
            vectors,
            labels: if labeled { Some(labels) } else { None },
        })
    }

    /// Dimension of the vectors, if any are present.
    pub fn dim(&self) -> Option<usize> {
        self.vectors.first().map(Vec::len)
    }

    /// Returns true if the set carries labels.
    pub fn is_labeled(&self) -> bool {
        self.labels.is_some()
    }

    /// Labels, if present.
    pub fn labels(&self) -> Option<&[usize]> {
        self.labels.as_deref()
    }

    /// Largest label + 1, or 0 when unlabeled or empty.
    pub fn num_classes(&self) -> usize {
        self.labels
            .as_ref()
            .and_then(|l| l.iter().max())
            .map_or(0, |&m| m + 1)
    }
}

impl Dataset for VectorSet {
    fn len(&self) -> usize {
        self.vectors.len()
    }

    fn sample(&self, index: usize) -> &[f64] {
        &self.vectors[index]
    }
}

impl LabeledDataset for VectorSet {
    /// Returns 0 for every vector of an unlabeled set.
    fn label(&self, index: usize) -> usize {
        self.labels.as_ref().map_or(0, |l| l[index])
    }
}

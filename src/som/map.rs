//! Prototype map, best-matching-unit search and the Kohonen update rule.

use crate::error::{KohonenError, Result};
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// A position on the 2D grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridPosition {
    /// Row coordinate (0 to rows-1).
    pub row: usize,
    /// Column coordinate (0 to cols-1).
    pub col: usize,
}

impl GridPosition {
    /// Create a new grid position.
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// Rectangular grid shape of a map.
///
/// Units are numbered in row-major order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TopologyShape")]
pub struct Topology {
    rows: usize,
    cols: usize,
}

/// Unchecked wire form of [`Topology`].
#[derive(Deserialize)]
struct TopologyShape {
    rows: usize,
    cols: usize,
}

impl TryFrom<TopologyShape> for Topology {
    type Error = KohonenError;

    fn try_from(shape: TopologyShape) -> Result<Self> {
        Topology::new(shape.rows, shape.cols)
    }
}

impl Topology {
    /// Creates a `rows x cols` topology.
    pub fn new(rows: usize, cols: usize) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(KohonenError::Config(format!(
                "topology must have at least one row and one column (got {}x{})",
                rows, cols
            )));
        }
        Ok(Self { rows, cols })
    }

    /// Number of grid rows.
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of grid columns.
    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Total number of units.
    #[inline]
    pub fn units(&self) -> usize {
        self.rows * self.cols
    }

    /// Converts a linear unit index to its 2D position.
    pub fn to_2d(&self, index: usize) -> Result<GridPosition> {
        if index >= self.units() {
            return Err(KohonenError::OutOfRange {
                index,
                max: self.units(),
            });
        }
        Ok(GridPosition::new(index / self.cols, index % self.cols))
    }

    /// Converts a 2D position to its linear unit index.
    pub fn to_linear(&self, pos: GridPosition) -> Result<usize> {
        self.check(pos)?;
        Ok(pos.row * self.cols + pos.col)
    }

    /// Fails with `OutOfRange` if `pos` lies outside the grid.
    pub fn check(&self, pos: GridPosition) -> Result<()> {
        if pos.row >= self.rows {
            return Err(KohonenError::OutOfRange {
                index: pos.row,
                max: self.rows,
            });
        }
        if pos.col >= self.cols {
            return Err(KohonenError::OutOfRange {
                index: pos.col,
                max: self.cols,
            });
        }
        Ok(())
    }
}

/// Result of a best-matching-unit search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bmu {
    /// Linear index of the winning unit.
    pub index: usize,
    /// Euclidean distance between the input and the winner's prototype.
    pub distance: f64,
}

/// The `U x D` matrix of prototype vectors, one row per grid unit.
///
/// Weights are stored flat in row-major order for cache-friendly scans.
/// Every constructor checks `weights.len() == units * dim` with `dim > 0`.
#[derive(Debug, Clone, PartialEq)]
pub struct PrototypeMap {
    topology: Topology,
    dim: usize,
    weights: Vec<f64>,
}

impl PrototypeMap {
    /// Creates a map with weights drawn uniformly from `[0, 1)`.
    pub fn random<R: Rng>(topology: Topology, dim: usize, rng: &mut R) -> Result<Self> {
        check_dim(dim)?;
        let weights = (0..topology.units() * dim).map(|_| rng.gen::<f64>()).collect();
        Ok(Self {
            topology,
            dim,
            weights,
        })
    }

    /// Creates a zero-initialized map.
    pub fn zeros(topology: Topology, dim: usize) -> Result<Self> {
        check_dim(dim)?;
        Ok(Self {
            topology,
            dim,
            weights: vec![0.0; topology.units() * dim],
        })
    }

    /// Builds a map from explicit prototype rows.
    pub fn from_rows(topology: Topology, rows: &[Vec<f64>]) -> Result<Self> {
        if rows.len() != topology.units() {
            return Err(KohonenError::DimensionMismatch {
                expected: topology.units(),
                actual: rows.len(),
            });
        }
        let dim = rows.first().map(|r| r.len()).unwrap_or(0);
        check_dim(dim)?;

        let mut weights = Vec::with_capacity(rows.len() * dim);
        for row in rows {
            if row.len() != dim {
                return Err(KohonenError::DimensionMismatch {
                    expected: dim,
                    actual: row.len(),
                });
            }
            weights.extend_from_slice(row);
        }

        Ok(Self {
            topology,
            dim,
            weights,
        })
    }

    /// Builds a map from a flat row-major weight buffer.
    pub fn from_flat(topology: Topology, dim: usize, weights: Vec<f64>) -> Result<Self> {
        check_dim(dim)?;
        if weights.len() != topology.units() * dim {
            return Err(KohonenError::DimensionMismatch {
                expected: topology.units() * dim,
                actual: weights.len(),
            });
        }
        Ok(Self {
            topology,
            dim,
            weights,
        })
    }

    /// Grid shape of the map.
    #[inline]
    pub fn topology(&self) -> Topology {
        self.topology
    }

    /// Prototype vector dimension.
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of units (rows of the matrix).
    #[inline]
    pub fn units(&self) -> usize {
        self.topology.units()
    }

    /// Prototype vector of unit `index`.
    #[inline]
    pub fn prototype(&self, index: usize) -> Option<&[f64]> {
        if index < self.units() {
            Some(&self.weights[index * self.dim..(index + 1) * self.dim])
        } else {
            None
        }
    }

    /// Iterates over prototype rows in unit order.
    pub fn prototypes(&self) -> impl Iterator<Item = &[f64]> {
        self.weights.chunks_exact(self.dim)
    }

    /// The flat row-major weight buffer.
    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.weights
    }

    /// Consumes the map, returning the flat weight buffer.
    pub fn into_vec(self) -> Vec<f64> {
        self.weights
    }
}

fn check_dim(dim: usize) -> Result<()> {
    if dim == 0 {
        return Err(KohonenError::Config(
            "prototype dimension must be positive".to_string(),
        ));
    }
    Ok(())
}

#[inline]
fn check_input(input: &[f64], map: &PrototypeMap) -> Result<()> {
    if input.len() != map.dim {
        return Err(KohonenError::DimensionMismatch {
            expected: map.dim,
            actual: input.len(),
        });
    }
    if let Some(pos) = input.iter().position(|x| !x.is_finite()) {
        return Err(KohonenError::NonFinite(format!(
            "input component {} is {}",
            pos, input[pos]
        )));
    }
    Ok(())
}

/// Turns the winning squared distance into a [`Bmu`].
///
/// A non-finite best distance means no prototype compared below infinity,
/// so there is no meaningful winner.
#[inline]
fn finish_search(index: usize, distance_sq: f64) -> Result<Bmu> {
    if !distance_sq.is_finite() {
        return Err(KohonenError::NonFinite(format!(
            "no prototype at a finite distance from the input (best {})",
            distance_sq
        )));
    }
    Ok(Bmu {
        index,
        distance: distance_sq.sqrt(),
    })
}

#[inline]
fn distance_squared(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Finds the Best Matching Unit (BMU) for an input vector.
///
/// The BMU is the unit whose prototype is closest to `input` in Euclidean
/// distance. Ties go to the lowest unit index. Non-finite inputs, or a map
/// with no prototype at a finite distance, yield `NonFinite`.
pub fn nearest(input: &[f64], map: &PrototypeMap) -> Result<Bmu> {
    check_input(input, map)?;

    let mut best_idx = 0;
    let mut best_dist = f64::INFINITY;

    for (i, prototype) in map.prototypes().enumerate() {
        let dist = distance_squared(prototype, input);
        if dist < best_dist {
            best_dist = dist;
            best_idx = i;
        }
    }

    finish_search(best_idx, best_dist)
}

/// Finds the Best Matching Unit in parallel.
///
/// More efficient for large maps. Returns exactly what [`nearest`] returns,
/// including the lowest-index tie-break.
pub fn nearest_parallel(input: &[f64], map: &PrototypeMap) -> Result<Bmu> {
    check_input(input, map)?;

    let (best_idx, best_dist) = map
        .weights
        .par_chunks_exact(map.dim)
        .enumerate()
        .map(|(i, prototype)| (i, distance_squared(prototype, input)))
        .reduce(
            || (0, f64::INFINITY),
            |a, b| {
                if b.1 < a.1 || (b.1 == a.1 && b.0 < a.0) {
                    b
                } else {
                    a
                }
            },
        );

    finish_search(best_idx, best_dist)
}

/// Moves every prototype toward `input`.
///
/// For every unit `i`:
/// `w[i] += learning_rate * neighborhood[i] * (input - w[i])`.
///
/// Shapes and input finiteness are checked before anything is written, so
/// an error leaves the map untouched.
pub fn update(
    map: &mut PrototypeMap,
    input: &[f64],
    learning_rate: f64,
    neighborhood: &[f64],
) -> Result<()> {
    check_input(input, map)?;
    if neighborhood.len() != map.units() {
        return Err(KohonenError::DimensionMismatch {
            expected: map.units(),
            actual: neighborhood.len(),
        });
    }

    let dim = map.dim;
    for (prototype, &h) in map.weights.chunks_exact_mut(dim).zip(neighborhood) {
        let influence = learning_rate * h;
        if influence == 0.0 {
            continue;
        }
        for (w, x) in prototype.iter_mut().zip(input) {
            *w += influence * (x - *w);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn reference_map() -> PrototypeMap {
        let topology = Topology::new(2, 2).unwrap();
        PrototypeMap::from_rows(
            topology,
            &[
                vec![0.0, 1.0],
                vec![3.0, 3.0],
                vec![0.0, 0.0],
                vec![1.0, 1.0],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_topology_conversion() {
        let topology = Topology::new(3, 4).unwrap();
        assert_eq!(topology.units(), 12);
        assert_eq!(topology.to_2d(6).unwrap(), GridPosition::new(1, 2));
        assert_eq!(topology.to_linear(GridPosition::new(1, 2)).unwrap(), 6);
        assert_eq!(topology.to_2d(11).unwrap(), GridPosition::new(2, 3));
    }

    #[test]
    fn test_topology_out_of_range() {
        let topology = Topology::new(3, 4).unwrap();
        assert!(matches!(
            topology.to_2d(12),
            Err(KohonenError::OutOfRange { index: 12, max: 12 })
        ));
        assert!(matches!(
            topology.to_linear(GridPosition::new(0, 4)),
            Err(KohonenError::OutOfRange { index: 4, max: 4 })
        ));
        assert!(Topology::new(0, 4).is_err());
    }

    #[test]
    fn test_topology_deserialize_validates_shape() {
        let topology = Topology::new(3, 4).unwrap();
        let bytes = bincode::serialize(&topology).unwrap();
        assert_eq!(bincode::deserialize::<Topology>(&bytes).unwrap(), topology);

        // Same wire layout as a topology, with zero rows.
        let bytes = bincode::serialize(&(0usize, 4usize)).unwrap();
        assert!(bincode::deserialize::<Topology>(&bytes).is_err());
    }

    #[test]
    fn test_from_flat_rejects_bad_shapes() {
        let topology = Topology::new(2, 2).unwrap();
        assert!(matches!(
            PrototypeMap::from_flat(topology, 2, vec![0.0; 2]),
            Err(KohonenError::DimensionMismatch {
                expected: 8,
                actual: 2
            })
        ));
        assert!(matches!(
            PrototypeMap::from_flat(topology, 0, Vec::new()),
            Err(KohonenError::Config(_))
        ));
    }

    #[test]
    fn test_random_init_range() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let map = PrototypeMap::random(Topology::new(4, 5).unwrap(), 7, &mut rng).unwrap();
        assert_eq!(map.units(), 20);
        assert_eq!(map.as_slice().len(), 140);
        assert!(map.as_slice().iter().all(|&w| (0.0..1.0).contains(&w)));
    }

    #[test]
    fn test_random_init_is_seeded() {
        let topology = Topology::new(3, 3).unwrap();
        let a = PrototypeMap::random(topology, 4, &mut ChaCha8Rng::seed_from_u64(7)).unwrap();
        let b = PrototypeMap::random(topology, 4, &mut ChaCha8Rng::seed_from_u64(7)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_from_rows_rejects_ragged() {
        let topology = Topology::new(1, 2).unwrap();
        let err = PrototypeMap::from_rows(topology, &[vec![0.0, 1.0], vec![0.0]]).unwrap_err();
        assert!(matches!(
            err,
            KohonenError::DimensionMismatch {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_nearest_reference_case() {
        let map = reference_map();
        let bmu = nearest(&[2.0, 2.0], &map).unwrap();
        // Units 1 and 3 tie at sqrt(2); the first one wins.
        assert_eq!(bmu.index, 1);
        assert!((bmu.distance - std::f64::consts::SQRT_2).abs() < 1e-8);
    }

    #[test]
    fn test_nearest_dimension_mismatch() {
        let map = reference_map();
        let err = nearest(&[2.0, 2.0, 2.0], &map).unwrap_err();
        assert!(matches!(
            err,
            KohonenError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_nearest_exact_match() {
        let mut map = PrototypeMap::zeros(Topology::new(4, 4).unwrap(), 3).unwrap();
        map.weights[5 * 3] = 1.0;
        let bmu = nearest(&[1.0, 0.0, 0.0], &map).unwrap();
        assert_eq!(bmu.index, 5);
        assert_eq!(bmu.distance, 0.0);
    }

    #[test]
    fn test_nearest_all_equal_picks_first() {
        let map = PrototypeMap::zeros(Topology::new(3, 3).unwrap(), 2).unwrap();
        let bmu = nearest(&[0.5, 0.5], &map).unwrap();
        assert_eq!(bmu.index, 0);
    }

    #[test]
    fn test_nearest_parallel_agrees() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let map = PrototypeMap::random(Topology::new(16, 16).unwrap(), 8, &mut rng).unwrap();
        for _ in 0..20 {
            let input: Vec<f64> = (0..8).map(|_| rng.gen::<f64>()).collect();
            assert_eq!(
                nearest(&input, &map).unwrap(),
                nearest_parallel(&input, &map).unwrap()
            );
        }

        let ties = reference_map();
        assert_eq!(nearest_parallel(&[2.0, 2.0], &ties).unwrap().index, 1);
    }

    #[test]
    fn test_nearest_rejects_non_finite_input() {
        let map = reference_map();
        for input in [[f64::NAN, 0.0], [0.0, f64::INFINITY]] {
            assert!(matches!(
                nearest(&input, &map),
                Err(KohonenError::NonFinite(_))
            ));
            assert!(matches!(
                nearest_parallel(&input, &map),
                Err(KohonenError::NonFinite(_))
            ));
        }
    }

    #[test]
    fn test_nearest_rejects_map_without_finite_distance() {
        let topology = Topology::new(1, 2).unwrap();
        let map = PrototypeMap::from_flat(topology, 2, vec![f64::NAN; 4]).unwrap();
        assert!(matches!(
            nearest(&[0.0, 0.0], &map),
            Err(KohonenError::NonFinite(_))
        ));
        assert!(matches!(
            nearest_parallel(&[0.0, 0.0], &map),
            Err(KohonenError::NonFinite(_))
        ));
    }

    #[test]
    fn test_update_moves_toward_input() {
        let mut map = PrototypeMap::zeros(Topology::new(1, 2).unwrap(), 2).unwrap();
        update(&mut map, &[1.0, 2.0], 0.5, &[1.0, 0.5]).unwrap();
        assert_eq!(map.prototype(0).unwrap(), &[0.5, 1.0]);
        assert_eq!(map.prototype(1).unwrap(), &[0.25, 0.5]);
    }

    #[test]
    fn test_update_zero_rate_is_noop() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut map = PrototypeMap::random(Topology::new(3, 3).unwrap(), 4, &mut rng).unwrap();
        let before = map.clone();

        update(&mut map, &[1.0, 1.0, 1.0, 1.0], 0.0, &[1.0; 9]).unwrap();
        assert_eq!(map, before);

        update(&mut map, &[1.0, 1.0, 1.0, 1.0], 0.7, &[0.0; 9]).unwrap();
        assert_eq!(map, before);
    }

    #[test]
    fn test_update_converges_monotonically() {
        let mut map = PrototypeMap::zeros(Topology::new(2, 2).unwrap(), 3).unwrap();
        let sample = [0.3, -1.0, 2.0];
        let mut field = vec![0.0; 4];
        field[2] = 1.0;

        let mut previous = distance_squared(map.prototype(2).unwrap(), &sample).sqrt();
        for _ in 0..25 {
            update(&mut map, &sample, 0.3, &field).unwrap();
            let current = distance_squared(map.prototype(2).unwrap(), &sample).sqrt();
            assert!(current < previous);
            assert!(current > 0.0);
            previous = current;
        }
        // Untouched units stay at the origin.
        assert_eq!(map.prototype(0).unwrap(), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_update_rejects_bad_shapes_without_writing() {
        let mut map = reference_map();
        let before = map.clone();

        assert!(update(&mut map, &[1.0, 1.0, 1.0], 0.5, &[1.0; 4]).is_err());
        assert!(update(&mut map, &[1.0, 1.0], 0.5, &[1.0; 3]).is_err());
        assert!(update(&mut map, &[f64::NAN, 1.0], 0.5, &[1.0; 4]).is_err());
        assert_eq!(map, before);
    }
}

//! Gaussian neighborhood kernel over the map grid.

use crate::error::{KohonenError, Result};
use crate::som::map::{GridPosition, Topology};

/// Computes the Gaussian influence field centered on `center`.
///
/// Unit `(r, c)` receives `exp(-((r - cr)^2 + (c - cc)^2) / (2 sigma^2))`.
/// The result is flattened row-major, so index `i` matches unit `i` of the
/// prototype map. The peak is exactly 1.0 at `center`.
pub fn gaussian_field(topology: Topology, center: GridPosition, sigma: f64) -> Result<Vec<f64>> {
    let mut field = vec![0.0; topology.units()];
    fill_gaussian_field(topology, center, sigma, &mut field)?;
    Ok(field)
}

/// Writes the Gaussian influence field into `out`.
///
/// Same as [`gaussian_field`] but reuses a caller-owned buffer of length
/// `topology.units()`.
pub fn fill_gaussian_field(
    topology: Topology,
    center: GridPosition,
    sigma: f64,
    out: &mut [f64],
) -> Result<()> {
    if sigma <= 0.0 || !sigma.is_finite() {
        return Err(KohonenError::Config(format!(
            "neighborhood sigma must be positive and finite (got {})",
            sigma
        )));
    }
    topology.check(center)?;
    if out.len() != topology.units() {
        return Err(KohonenError::DimensionMismatch {
            expected: topology.units(),
            actual: out.len(),
        });
    }

    let denom = 2.0 * sigma * sigma;
    let cr = center.row as f64;
    let cc = center.col as f64;

    for (row, chunk) in out.chunks_exact_mut(topology.cols()).enumerate() {
        let dr = row as f64 - cr;
        for (col, value) in chunk.iter_mut().enumerate() {
            let dc = col as f64 - cc;
            *value = (-(dr * dr + dc * dc) / denom).exp();
        }
    }

    Ok(())
}

use nalgebra::Point3;
use std::sync::Arc;

/// An immutable copy of every particle position at one point in time.
///
/// Snapshots are captured before a run starts and restored on undo. The positions live in
/// an `Arc<[Point3<f64>]>`, so cloning a snapshot never copies coordinates and there is no
/// API that mutates one after capture.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometrySnapshot {
    positions: Arc<[Point3<f64>]>,
}

impl GeometrySnapshot {
    /// Captures a snapshot from a slice of positions.
    pub fn from_positions(positions: &[Point3<f64>]) -> Self {
        Self {
            positions: Arc::from(positions),
        }
    }

    /// Returns the captured positions.
    pub fn positions(&self) -> &[Point3<f64>] {
        &self.positions
    }

    /// Returns the number of captured particles.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Returns `true` if the snapshot holds no particles.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Checks whether `positions` is bit-for-bit identical to this snapshot.
    ///
    /// Comparison goes through `f64::to_bits`, so `-0.0` and `0.0` differ and identical NaN
    /// payloads compare equal. This is the notion of "restored" used by undo.
    ///
    /// # Arguments
    ///
    /// * `positions` - The coordinates to compare against.
    ///
    /// # Return
    ///
    /// Returns `true` if lengths match and every coordinate has the same bit pattern.
    pub fn matches(&self, positions: &[Point3<f64>]) -> bool {
        self.positions.len() == positions.len()
            && self.positions.iter().zip(positions).all(|(a, b)| {
                a.coords
                    .iter()
                    .zip(b.coords.iter())
                    .all(|(x, y)| x.to_bits() == y.to_bits())
            })
    }

    /// Returns the largest per-particle distance between this snapshot and `positions`.
    ///
    /// Returns `f64::INFINITY` when the particle counts differ.
    pub fn max_deviation(&self, positions: &[Point3<f64>]) -> f64 {
        if self.positions.len() != positions.len() {
            return f64::INFINITY;
        }
        self.positions
            .iter()
            .zip(positions)
            .map(|(a, b)| nalgebra::distance(a, b))
            .fold(0.0, f64::max)
    }
}

use nalgebra::Point3;

/// A single point particle of a structure.
///
/// The optimization engine only ever looks at positions; the element symbol is carried
/// along so evaluators can pick per-element parameters and so structures survive a
/// read/write round trip unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    /// The element symbol (e.g., "C", "O", "Ar").
    pub element: String,
    /// The 3D coordinates of the particle in Angstroms.
    pub position: Point3<f64>,
}

impl Particle {
    /// Creates a new `Particle`.
    ///
    /// # Arguments
    ///
    /// * `element` - The element symbol.
    /// * `position` - The 3D coordinates of the particle.
    pub fn new(element: &str, position: Point3<f64>) -> Self {
        Self {
            element: element.to_string(),
            position,
        }
    }
}

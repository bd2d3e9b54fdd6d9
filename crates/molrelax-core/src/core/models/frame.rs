use super::particle::Particle;
use nalgebra::Point3;

/// An owned, in-memory structure: a comment line plus an ordered list of particles.
///
/// Frames are what file readers produce and file writers consume. A [`Frame`] is turned
/// into a live, shared document with
/// [`Document::new`](super::document::Document::new) and read back with
/// [`Document::to_frame`](super::document::Document::to_frame).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    /// Free-form title or comment carried with the structure.
    pub comment: String,
    /// The particles, in file order. Particle indices used by constraints refer to this order.
    pub particles: Vec<Particle>,
}

impl Frame {
    /// Creates a new frame from a comment and a list of particles.
    pub fn new(comment: &str, particles: Vec<Particle>) -> Self {
        Self {
            comment: comment.to_string(),
            particles,
        }
    }

    /// Returns the number of particles in the frame.
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    /// Returns `true` if the frame contains no particles.
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Returns a copy of every particle position, in order.
    pub fn positions(&self) -> Vec<Point3<f64>> {
        self.particles.iter().map(|p| p.position).collect()
    }

    /// Returns the element symbols of every particle, in order.
    pub fn elements(&self) -> Vec<String> {
        self.particles.iter().map(|p| p.element.clone()).collect()
    }
}

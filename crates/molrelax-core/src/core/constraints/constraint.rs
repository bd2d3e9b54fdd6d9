use serde::{Deserialize, Serialize};
use std::fmt;

/// A Cartesian axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// Returns the component index of this axis (0, 1 or 2).
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// A single geometric restriction, referring to particles by their index in the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Constraint {
    /// The particle is left out of the energy model entirely.
    Ignore { particle: usize },
    /// The particle does not move.
    Fixed { particle: usize },
    /// The particle does not move along `axis`.
    FixedAxis { particle: usize, axis: Axis },
    /// The distance between `a` and `b` is held near `target` (Angstroms).
    Distance { a: usize, b: usize, target: f64 },
    /// The angle `a-b-c` (vertex `b`) is held near `target` (degrees).
    Angle {
        a: usize,
        b: usize,
        c: usize,
        target: f64,
    },
}

impl Constraint {
    /// Returns the particle indices this constraint refers to, in declaration order.
    pub fn particles(&self) -> Vec<usize> {
        match *self {
            Constraint::Ignore { particle }
            | Constraint::Fixed { particle }
            | Constraint::FixedAxis { particle, .. } => vec![particle],
            Constraint::Distance { a, b, .. } => vec![a, b],
            Constraint::Angle { a, b, c, .. } => vec![a, b, c],
        }
    }

    /// Returns the target value for distance and angle constraints.
    pub fn target(&self) -> Option<f64> {
        match *self {
            Constraint::Distance { target, .. } | Constraint::Angle { target, .. } => Some(target),
            _ => None,
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Ignore { particle } => write!(f, "ignore {}", particle),
            Constraint::Fixed { particle } => write!(f, "fix {}", particle),
            Constraint::FixedAxis { particle, axis } => write!(f, "fix {} along {:?}", particle, axis),
            Constraint::Distance { a, b, target } => write!(f, "distance {}-{} = {:.3} Å", a, b, target),
            Constraint::Angle { a, b, c, target } => {
                write!(f, "angle {}-{}-{} = {:.2}°", a, b, c, target)
            }
        }
    }
}

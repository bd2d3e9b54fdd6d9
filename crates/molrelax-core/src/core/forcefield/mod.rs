//! # Force Field Module
//!
//! Energy and gradient evaluation for the optimization engine.
//!
//! ## Overview
//!
//! The engine treats the energy model as opaque: anything implementing
//! [`Evaluator`](evaluator::Evaluator) can drive a run. Given the current coordinates and the
//! active constraint set, an evaluator returns the energy and its gradient, or an
//! [`EvaluationError`](evaluator::EvaluationError) when the geometry cannot be evaluated.
//! The engine maps every such failure to an aborted run.
//!
//! ## Key Components
//!
//! - [`evaluator`] - The `Evaluator` trait, evaluation results and errors
//! - [`lennard_jones`] - Pairwise 12-6 van der Waals evaluator with per-element parameters
//! - [`harmonic`] - A quadratic well with a known minimum
//! - [`restraint`] - Wrapper adding harmonic distance and angle restraints to any evaluator
//! - [`params`] - Built-in element parameters and TOML overrides
//! - [`registry`] - Lookup of evaluators by string id
//!
//! ## Usage
//!
//! ```ignore
//! use molrelax::core::forcefield::registry::EvaluatorRegistry;
//!
//! let registry = EvaluatorRegistry::with_defaults(document.elements(), &params)?;
//! let evaluator = registry.get("lennard-jones").unwrap();
//! let evaluation = evaluator.evaluate(&document.positions(), &constraints)?;
//! ```

pub mod evaluator;
pub mod harmonic;
pub mod lennard_jones;
pub mod params;
pub(crate) mod potentials;
pub mod registry;
pub mod restraint;

pub use evaluator::{Evaluation, EvaluationError, Evaluator};

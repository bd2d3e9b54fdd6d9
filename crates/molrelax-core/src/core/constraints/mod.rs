//! # Constraints Module
//!
//! Geometric restrictions applied while a structure is being optimized.
//!
//! ## Overview
//!
//! A [`ConstraintSet`](set::ConstraintSet) is an ordered list of [`Constraint`](constraint::Constraint)s
//! with no identity beyond list position. During a run it is consulted at every iteration:
//! frozen degrees of freedom are masked out of the gradient, ignored particles are skipped by
//! evaluators, and distance/angle targets become harmonic restraint terms.
//!
//! ## Key Components
//!
//! - [`constraint`] - The constraint kinds and their particle references
//! - [`set`] - The ordered collection, validation, gradient masking and restraint terms
//! - [`io`] - Loading constraint sets from CSV files
//!
//! ## Ownership
//!
//! Runs hold the set through an `Arc`. Editing goes through `Arc::make_mut`, so a set that a
//! running task references is never structurally modified; the editor gets its own copy.

pub mod constraint;
pub mod io;
pub mod set;

pub use constraint::{Axis, Constraint};
pub use io::ConstraintLoadError;
pub use set::{ConstraintError, ConstraintSet};

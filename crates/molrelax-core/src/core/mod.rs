//! # Core Module
//!
//! This module provides the data layer of molrelax: everything the optimization engine reads
//! or writes, with no knowledge of threads, histories or progress reporting.
//!
//! ## Architecture
//!
//! - **Structure Representation** ([`models`]) - Particles, frames, the shared live document
//!   and immutable geometry snapshots
//! - **Geometric Restrictions** ([`constraints`]) - Ordered constraint sets consulted at every
//!   iteration of a run
//! - **Energy Evaluation** ([`forcefield`]) - The `Evaluator` trait and the evaluators shipped
//!   with the library
//! - **File I/O** ([`io`]) - Reading and writing structures on disk
//!
//! ## Key Capabilities
//!
//! - **Shared, lock-protected coordinates** so a background run and the interactive thread
//!   never write at the same time
//! - **Bit-exact snapshots** used to restore a document on undo or cancellation
//! - **Pluggable evaluators** so the numerical model stays opaque to the engine

pub mod constraints;
pub mod forcefield;
pub mod io;
pub mod models;
pub(crate) mod utils;

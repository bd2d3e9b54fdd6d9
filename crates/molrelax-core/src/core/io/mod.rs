//! Provides input/output for structure files.
//!
//! Formats implement the [`MolecularFile`](traits::MolecularFile) trait, which reads and
//! writes [`Frame`](crate::core::models::frame::Frame)s through buffered readers and writers
//! and offers path-based convenience methods on top.

pub mod traits;
pub mod xyz;

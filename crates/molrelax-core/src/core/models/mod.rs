//! # Core Models Module
//!
//! The data structures that describe a structure being edited and the state captured from it.
//!
//! ## Key Components
//!
//! - [`particle`] - A single particle (element symbol plus position)
//! - [`frame`] - An owned, in-memory structure as read from or written to disk
//! - [`document`] - The live, shared structure an editor works on, with its run lock
//! - [`snapshot`] - Immutable captured copies of every particle position
//! - [`ids`] - Process-unique identifiers for documents and tasks
//!
//! ## Usage
//!
//! ```ignore
//! use molrelax::core::models::{document::Document, frame::Frame, particle::Particle};
//! use nalgebra::Point3;
//!
//! let frame = Frame::new("water", vec![
//!     Particle::new("O", Point3::new(0.0, 0.0, 0.0)),
//!     Particle::new("H", Point3::new(0.96, 0.0, 0.0)),
//! ]);
//! let document = Document::new(frame);
//! let snapshot = document.snapshot();
//! ```

pub mod document;
pub mod frame;
pub mod ids;
pub mod particle;
pub mod snapshot;

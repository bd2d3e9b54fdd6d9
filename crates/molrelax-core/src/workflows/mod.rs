//! # Workflows Module
//!
//! This module ties background optimization runs to a linear undo/redo history.
//!
//! ## Overview
//!
//! A user action reaches the [`OptimizationController`](controller::OptimizationController),
//! which validates the request and pushes an
//! [`OptimizationCommand`](command::OptimizationCommand) onto an
//! [`UndoStack`](history::UndoStack). Pushing redoes the command, which only starts the run;
//! the interactive thread never waits for a run except when undoing it.
//!
//! ## Architecture
//!
//! - **Optimization Entries** ([`command`]) - Snapshot, run ownership, redo/undo/merge/detach
//! - **Interactive Edits** ([`edit`]) - Non-mergeable particle moves
//! - **History** ([`history`]) - The closed set of entry kinds and the linear stack
//! - **Controller** ([`controller`]) - Validation and command construction for one document
//!
//! ## Key Capabilities
//!
//! - **Bit-exact undo** of optimizations, whether finished, running or never started
//! - **Merging** of consecutive compatible optimizations into one history entry
//! - **Detaching** runs whose history entry is destroyed while they are still going

pub mod command;
pub mod controller;
pub mod edit;
pub mod history;

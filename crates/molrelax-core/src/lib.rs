//! # molrelax Core Library
//!
//! Background geometry optimization for interactive molecular editors: a long-running,
//! cancellable energy minimization that runs off the interactive thread and still composes
//! with a linear undo/redo history.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Plain data: particles and frames, the shared live
//!   [`Document`](core::models::document::Document) with its run lock, immutable geometry
//!   snapshots, the constraint set, the pluggable energy evaluators and file I/O.
//!
//! - **[`engine`]: The Logic Core.** Run parameters, the cancellation token, the bounded
//!   progress channel, the task state machine, the minimizer and the background
//!   [`OptimizationTask`](engine::task::OptimizationTask) itself.
//!
//! - **[`workflows`]: The Public API.** The undoable
//!   [`OptimizationCommand`](workflows::command::OptimizationCommand), the linear
//!   [`UndoStack`](workflows::history::UndoStack) it lives in, and the
//!   [`OptimizationController`](workflows::controller::OptimizationController) that ties a
//!   user action to both.

pub mod core;
pub mod engine;
pub mod workflows;

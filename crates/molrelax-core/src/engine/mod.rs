//! # Engine Module
//!
//! This module runs geometry optimizations in the background: it turns a document, a
//! constraint set and a set of parameters into a cancellable run on its own thread.
//!
//! ## Overview
//!
//! A run is started with [`OptimizationTask::start`](task::OptimizationTask::start), which
//! takes the document's run lock and spawns a worker. The worker iterates the
//! [`Minimizer`](optimizer::Minimizer) (or [`Integrator`](optimizer::Integrator) in dynamics
//! mode), publishes every step into the live document, and reports through a bounded
//! [`progress`] channel. The owner steers it only through a
//! [`CancellationToken`](cancel::CancellationToken).
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Run parameters, their builder and validation
//! - **Cancellation** ([`cancel`]) - The cooperative stop flag shared with the worker
//! - **Progress Monitoring** ([`progress`]) - Bounded, non-blocking progress events
//! - **State Tracking** ([`state`]) - The run state machine and its outcomes
//! - **Numerics** ([`optimizer`]) - Minimizer, integrator and finite-difference gradients
//! - **Background Runs** ([`task`]) - The worker thread and its handle
//! - **Error Handling** ([`error`]) - Engine-specific error types
//!
//! ## Key Capabilities
//!
//! - **Single writer per document**, enforced by the run lock
//! - **Cooperative cancellation** checked at every iteration boundary
//! - **Fault containment**: evaluator errors and panics end the run as aborted instead of
//!   crossing the thread boundary
//! - **Ordered progress** with the terminal event always delivered last

pub mod cancel;
pub mod config;
pub mod error;
pub mod optimizer;
pub mod progress;
pub mod state;
pub mod task;

use super::frame::Frame;
use super::ids::{DocumentId, TaskId};
use super::particle::Particle;
use super::snapshot::GeometrySnapshot;
use crate::engine::cancel::CancellationToken;
use nalgebra::Point3;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("Document {document} is busy: {active} is still running")]
    Busy { document: DocumentId, active: TaskId },

    #[error("Geometry mismatch: document has {expected} particles, got {found}")]
    GeometryMismatch { expected: usize, found: usize },

    #[error("Particle {index} does not exist (document has {len} particles)")]
    ParticleOutOfRange { index: usize, len: usize },
}

struct ActiveRun {
    task: TaskId,
    token: CancellationToken,
}

struct DocumentInner {
    id: DocumentId,
    elements: Vec<String>,
    positions: RwLock<Vec<Point3<f64>>>,
    active_run: Mutex<Option<ActiveRun>>,
}

/// The live structure an editor works on, shared between the interactive thread and at most
/// one background run.
///
/// `Document` is a cheap, clonable handle: every clone refers to the same coordinates. The
/// element list is fixed at construction; only positions change. Writes go through one of
/// two doors:
///
/// - [`Document::publish`], which requires a [`RunGuard`] and is used by the one task that
///   currently holds the document's run lock;
/// - [`Document::edit`] (and [`Document::restore`]), which the interactive thread uses and
///   which is refused while any task holds the run lock.
///
/// Because both doors check the same lock, a running task and the interactive thread never
/// write coordinates at the same time.
#[derive(Clone)]
pub struct Document {
    inner: Arc<DocumentInner>,
}

/// Proof that a task holds a document's run lock. Dropping the guard releases the lock.
pub struct RunGuard {
    document: Document,
    task: TaskId,
    token: CancellationToken,
}

impl Document {
    /// Creates a live document from a frame.
    ///
    /// # Arguments
    ///
    /// * `frame` - The structure to take ownership of.
    pub fn new(frame: Frame) -> Self {
        let (elements, positions) = frame
            .particles
            .into_iter()
            .map(|p| (p.element, p.position))
            .unzip();
        Self::from_parts(elements, positions)
    }

    /// Creates a live document from bare positions; every particle gets the element "X".
    pub fn from_positions(positions: Vec<Point3<f64>>) -> Self {
        let elements = vec!["X".to_string(); positions.len()];
        Self::from_parts(elements, positions)
    }

    fn from_parts(elements: Vec<String>, positions: Vec<Point3<f64>>) -> Self {
        Self {
            inner: Arc::new(DocumentInner {
                id: DocumentId::next(),
                elements,
                positions: RwLock::new(positions),
                active_run: Mutex::new(None),
            }),
        }
    }

    pub fn id(&self) -> DocumentId {
        self.inner.id
    }

    /// Returns the number of particles in the document.
    pub fn len(&self) -> usize {
        self.inner.elements.len()
    }

    /// Returns `true` if the document contains no particles.
    pub fn is_empty(&self) -> bool {
        self.inner.elements.is_empty()
    }

    /// Returns the element symbol of every particle, in order.
    pub fn elements(&self) -> &[String] {
        &self.inner.elements
    }

    /// Returns a copy of the current positions.
    pub fn positions(&self) -> Vec<Point3<f64>> {
        self.read_positions().clone()
    }

    /// Runs `f` with read access to the current positions.
    ///
    /// The read lock is held only for the duration of `f`; keep it short, because a running
    /// task waits for it when it publishes a step.
    pub fn with_positions<R>(&self, f: impl FnOnce(&[Point3<f64>]) -> R) -> R {
        f(&self.read_positions())
    }

    /// Captures an immutable snapshot of the current positions.
    pub fn snapshot(&self) -> GeometrySnapshot {
        self.with_positions(GeometrySnapshot::from_positions)
    }

    /// Builds an owned frame from the current state of the document.
    pub fn to_frame(&self, comment: &str) -> Frame {
        let positions = self.read_positions();
        let particles = self
            .inner
            .elements
            .iter()
            .zip(positions.iter())
            .map(|(element, position)| Particle::new(element, *position))
            .collect();
        Frame::new(comment, particles)
    }

    /// Returns the task currently holding the run lock, if any.
    pub fn active_task(&self) -> Option<TaskId> {
        self.lock_active_run().as_ref().map(|run| run.task)
    }

    /// Returns `true` while a task holds the run lock.
    pub fn is_busy(&self) -> bool {
        self.lock_active_run().is_some()
    }

    /// Requests cancellation of whatever task currently holds the run lock.
    ///
    /// # Return
    ///
    /// Returns `true` if a task was running and has been asked to stop.
    pub fn cancel_active(&self) -> bool {
        match self.lock_active_run().as_ref() {
            Some(run) => {
                run.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Acquires the run lock on behalf of `task`.
    ///
    /// # Arguments
    ///
    /// * `task` - The task that will mutate the document.
    /// * `token` - The task's cancellation token, exposed through [`Document::cancel_active`].
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Busy`] if another task already holds the lock.
    pub fn try_begin_run(
        &self,
        task: TaskId,
        token: CancellationToken,
    ) -> Result<RunGuard, DocumentError> {
        let mut active = self.lock_active_run();
        if let Some(run) = active.as_ref() {
            return Err(DocumentError::Busy {
                document: self.id(),
                active: run.task,
            });
        }
        *active = Some(ActiveRun {
            task,
            token: token.clone(),
        });
        debug!(document = %self.id(), %task, "Run lock acquired.");
        Ok(RunGuard {
            document: self.clone(),
            task,
            token,
        })
    }

    /// Overwrites all positions on behalf of the task holding `guard`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::GeometryMismatch`] if `positions` has the wrong length.
    pub fn publish(
        &self,
        guard: &RunGuard,
        positions: &[Point3<f64>],
    ) -> Result<(), DocumentError> {
        debug_assert_eq!(guard.document.id(), self.id());
        self.check_len(positions.len())?;
        self.write_positions().copy_from_slice(positions);
        Ok(())
    }

    /// Mutates positions from the interactive side.
    ///
    /// The run lock is held for the whole edit, so no task can start halfway through it.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Busy`] if a task currently holds the run lock.
    pub fn edit<R>(&self, f: impl FnOnce(&mut [Point3<f64>]) -> R) -> Result<R, DocumentError> {
        let active = self.lock_active_run();
        if let Some(run) = active.as_ref() {
            return Err(DocumentError::Busy {
                document: self.id(),
                active: run.task,
            });
        }
        let mut positions = self.write_positions();
        Ok(f(&mut positions))
    }

    /// Overwrites every position with the contents of `snapshot`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Busy`] while a task runs, or
    /// [`DocumentError::GeometryMismatch`] if the snapshot has the wrong particle count.
    pub fn restore(&self, snapshot: &GeometrySnapshot) -> Result<(), DocumentError> {
        self.check_len(snapshot.len())?;
        self.edit(|positions| positions.copy_from_slice(snapshot.positions()))
    }

    fn check_len(&self, found: usize) -> Result<(), DocumentError> {
        if found != self.len() {
            return Err(DocumentError::GeometryMismatch {
                expected: self.len(),
                found,
            });
        }
        Ok(())
    }

    fn read_positions(&self) -> RwLockReadGuard<'_, Vec<Point3<f64>>> {
        self.inner
            .positions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_positions(&self) -> RwLockWriteGuard<'_, Vec<Point3<f64>>> {
        self.inner
            .positions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_active_run(&self) -> MutexGuard<'_, Option<ActiveRun>> {
        self.inner
            .active_run
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("id", &self.id())
            .field("particles", &self.len())
            .field("active_task", &self.active_task())
            .finish()
    }
}

impl RunGuard {
    pub fn task(&self) -> TaskId {
        self.task
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// The cancellation token registered with the lock.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut active = self.document.lock_active_run();
        if active.as_ref().is_some_and(|run| run.task == self.task) {
            *active = None;
            debug!(document = %self.document.id(), task = %self.task, "Run lock released.");
        }
    }
}

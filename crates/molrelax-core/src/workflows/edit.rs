use super::history::CommandKind;
use crate::core::models::document::{Document, DocumentError};
use crate::engine::error::EngineError;
use nalgebra::Point3;

/// Interactive edit that sets the positions of a few particles. Never merges.
#[derive(Debug)]
pub struct MoveParticles {
    document: Document,
    moves: Vec<(usize, Point3<f64>)>,
    previous: Option<Vec<(usize, Point3<f64>)>>,
}

impl MoveParticles {
    /// # Errors
    ///
    /// Returns [`DocumentError::ParticleOutOfRange`] if a move names a missing particle.
    pub fn new(
        document: Document,
        moves: Vec<(usize, Point3<f64>)>,
    ) -> Result<Self, DocumentError> {
        let len = document.len();
        if let Some(&(index, _)) = moves.iter().find(|(i, _)| *i >= len) {
            return Err(DocumentError::ParticleOutOfRange { index, len });
        }
        Ok(Self {
            document,
            moves,
            previous: None,
        })
    }

    pub fn kind(&self) -> CommandKind {
        CommandKind::MoveParticles
    }

    pub fn text(&self) -> &'static str {
        if self.moves.len() == 1 {
            "Move Atom"
        } else {
            "Move Atoms"
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Applies the moves, remembering the positions they replace.
    ///
    /// # Errors
    ///
    /// Refused with [`DocumentError::Busy`] while a run holds the document.
    pub fn redo(&mut self) -> Result<(), EngineError> {
        let moves = &self.moves;
        let previous = self.document.edit(|positions| {
            moves
                .iter()
                .map(|&(i, target)| {
                    let old = positions[i];
                    positions[i] = target;
                    (i, old)
                })
                .collect::<Vec<_>>()
        })?;
        if self.previous.is_none() {
            self.previous = Some(previous);
        }
        Ok(())
    }

    /// Puts back the positions recorded by the first `redo`. Idempotent.
    pub fn undo(&mut self) -> Result<(), EngineError> {
        let Some(previous) = &self.previous else {
            return Ok(());
        };
        self.document.edit(|positions| {
            for &(i, old) in previous.iter().rev() {
                positions[i] = old;
            }
        })?;
        Ok(())
    }
}

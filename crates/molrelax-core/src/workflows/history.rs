use super::command::OptimizationCommand;
use super::edit::MoveParticles;
use crate::engine::error::EngineError;
use tracing::debug;

/// Kind tag of a history entry; only entries of the same kind are ever merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Optimization,
    MoveParticles,
}

/// An entry of the linear undo history.
#[derive(Debug)]
pub enum HistoryCommand {
    Optimization(OptimizationCommand),
    MoveParticles(MoveParticles),
}

impl HistoryCommand {
    pub fn kind(&self) -> CommandKind {
        match self {
            HistoryCommand::Optimization(c) => c.kind(),
            HistoryCommand::MoveParticles(c) => c.kind(),
        }
    }

    pub fn text(&self) -> &'static str {
        match self {
            HistoryCommand::Optimization(c) => c.text(),
            HistoryCommand::MoveParticles(c) => c.text(),
        }
    }

    pub fn redo(&mut self) -> Result<(), EngineError> {
        match self {
            HistoryCommand::Optimization(c) => c.redo(),
            HistoryCommand::MoveParticles(c) => c.redo(),
        }
    }

    pub fn undo(&mut self) -> Result<(), EngineError> {
        match self {
            HistoryCommand::Optimization(c) => c.undo(),
            HistoryCommand::MoveParticles(c) => c.undo(),
        }
    }

    /// Folds `other` into this entry when both are compatible optimizations.
    #[allow(clippy::result_large_err)]
    pub fn merge_with(&mut self, other: HistoryCommand) -> Result<(), HistoryCommand> {
        match (self, other) {
            (HistoryCommand::Optimization(this), HistoryCommand::Optimization(next)) => {
                this.merge_with(next).map_err(HistoryCommand::Optimization)
            }
            (_, other) => Err(other),
        }
    }

    /// Collects a finished background run, if this entry owns one.
    pub fn cleanup(&mut self) -> bool {
        match self {
            HistoryCommand::Optimization(c) => c.cleanup(),
            HistoryCommand::MoveParticles(_) => false,
        }
    }

    pub fn as_optimization(&self) -> Option<&OptimizationCommand> {
        match self {
            HistoryCommand::Optimization(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_optimization_mut(&mut self) -> Option<&mut OptimizationCommand> {
        match self {
            HistoryCommand::Optimization(c) => Some(c),
            _ => None,
        }
    }
}

impl From<OptimizationCommand> for HistoryCommand {
    fn from(command: OptimizationCommand) -> Self {
        HistoryCommand::Optimization(command)
    }
}

impl From<MoveParticles> for HistoryCommand {
    fn from(command: MoveParticles) -> Self {
        HistoryCommand::MoveParticles(command)
    }
}

/// A linear undo/redo history.
///
/// Entries below `index` are applied; entries at or above it can be redone. Pushing a new
/// entry discards the redo tail. Entries dropped from the history (truncation, the undo
/// limit, [`UndoStack::clear`]) are destroyed without being undone; an optimization still
/// running at that point detaches and finishes on its own.
#[derive(Debug, Default)]
pub struct UndoStack {
    commands: Vec<HistoryCommand>,
    index: usize,
    undo_limit: usize,
}

impl UndoStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `command` and records it.
    ///
    /// The command is redone first; if that fails nothing is recorded and the history is
    /// unchanged. Otherwise the redo tail is discarded and the command is merged into the
    /// top entry when possible, or appended.
    ///
    /// # Return
    ///
    /// Returns `true` if the command was merged into the previous entry.
    pub fn push(&mut self, command: impl Into<HistoryCommand>) -> Result<bool, EngineError> {
        let mut command = command.into();
        command.redo()?;

        if self.index < self.commands.len() {
            debug!(dropped = self.commands.len() - self.index, "Discarding redo tail.");
            self.commands.truncate(self.index);
        }

        if let Some(top) = self.commands.last_mut() {
            match top.merge_with(command) {
                Ok(()) => {
                    debug!(text = top.text(), "Merged into previous history entry.");
                    return Ok(true);
                }
                Err(unmerged) => command = unmerged,
            }
        }

        self.commands.push(command);
        self.index = self.commands.len();
        self.enforce_limit();
        Ok(false)
    }

    /// Undoes the entry below the index.
    ///
    /// # Return
    ///
    /// Returns `false` if there was nothing to undo.
    pub fn undo(&mut self) -> Result<bool, EngineError> {
        if self.index == 0 {
            return Ok(false);
        }
        self.commands[self.index - 1].undo()?;
        self.index -= 1;
        Ok(true)
    }

    /// Redoes the entry at the index.
    ///
    /// # Return
    ///
    /// Returns `false` if there was nothing to redo.
    pub fn redo(&mut self) -> Result<bool, EngineError> {
        if self.index == self.commands.len() {
            return Ok(false);
        }
        self.commands[self.index].redo()?;
        self.index += 1;
        Ok(true)
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.index < self.commands.len()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn undo_text(&self) -> Option<&'static str> {
        self.index
            .checked_sub(1)
            .and_then(|i| self.commands.get(i))
            .map(HistoryCommand::text)
    }

    pub fn redo_text(&self) -> Option<&'static str> {
        self.commands.get(self.index).map(HistoryCommand::text)
    }

    pub fn command(&self, index: usize) -> Option<&HistoryCommand> {
        self.commands.get(index)
    }

    /// The most recently applied entry.
    pub fn top(&self) -> Option<&HistoryCommand> {
        self.index.checked_sub(1).and_then(|i| self.commands.get(i))
    }

    pub fn top_mut(&mut self) -> Option<&mut HistoryCommand> {
        self.index
            .checked_sub(1)
            .and_then(|i| self.commands.get_mut(i))
    }

    pub fn undo_limit(&self) -> usize {
        self.undo_limit
    }

    /// Caps the number of entries; `0` means unlimited. The oldest applied entries go first.
    pub fn set_undo_limit(&mut self, limit: usize) {
        self.undo_limit = limit;
        self.enforce_limit();
    }

    /// Destroys every entry without undoing it.
    pub fn clear(&mut self) {
        debug!(entries = self.commands.len(), "Clearing undo history.");
        self.commands.clear();
        self.index = 0;
    }

    /// Collects finished background runs of every entry.
    ///
    /// # Return
    ///
    /// The number of runs collected.
    pub fn sync(&mut self) -> usize {
        self.commands
            .iter_mut()
            .map(HistoryCommand::cleanup)
            .filter(|&cleaned| cleaned)
            .count()
    }

    fn enforce_limit(&mut self) {
        if self.undo_limit == 0 {
            return;
        }
        let excess = self
            .commands
            .len()
            .saturating_sub(self.undo_limit)
            .min(self.index);
        if excess > 0 {
            debug!(dropped = excess, "Undo limit reached; dropping oldest entries.");
            self.commands.drain(..excess);
            self.index -= excess;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::document::Document;
    use nalgebra::Point3;

    fn document() -> Document {
        Document::from_positions(vec![Point3::origin(); 2])
    }

    fn move_to(document: &Document, x: f64) -> MoveParticles {
        MoveParticles::new(document.clone(), vec![(0, Point3::new(x, 0.0, 0.0))]).unwrap()
    }

    #[test]
    fn push_applies_and_undo_redo_walk_the_history() {
        let document = document();
        let mut stack = UndoStack::new();
        assert!(!stack.push(move_to(&document, 1.0)).unwrap());
        stack.push(move_to(&document, 2.0)).unwrap();
        assert_eq!(document.positions()[0].x, 2.0);
        assert_eq!(stack.undo_text(), Some("Move Atom"));

        assert!(stack.undo().unwrap());
        assert_eq!(document.positions()[0].x, 1.0);
        assert!(stack.undo().unwrap());
        assert!(!stack.undo().unwrap());
        assert_eq!(document.positions()[0].x, 0.0);

        assert!(stack.redo().unwrap());
        assert_eq!(document.positions()[0].x, 1.0);
        assert_eq!(stack.index(), 1);
        assert!(stack.can_redo());
    }

    #[test]
    fn push_discards_the_redo_tail() {
        let document = document();
        let mut stack = UndoStack::new();
        stack.push(move_to(&document, 1.0)).unwrap();
        stack.push(move_to(&document, 2.0)).unwrap();
        stack.undo().unwrap();
        stack.push(move_to(&document, 3.0)).unwrap();

        assert_eq!(stack.len(), 2);
        assert!(!stack.can_redo());
        stack.undo().unwrap();
        assert_eq!(document.positions()[0].x, 1.0);
    }

    #[test]
    fn failed_push_leaves_history_untouched() {
        let document = document();
        let mut stack = UndoStack::new();
        stack.push(move_to(&document, 1.0)).unwrap();
        let _guard = document
            .try_begin_run(
                crate::core::models::ids::TaskId::next(),
                crate::engine::cancel::CancellationToken::new(),
            )
            .unwrap();
        assert!(stack.push(move_to(&document, 2.0)).is_err());
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.index(), 1);
    }

    #[test]
    fn undo_limit_drops_oldest_entries() {
        let document = document();
        let mut stack = UndoStack::new();
        for x in 1..=5 {
            stack.push(move_to(&document, x as f64)).unwrap();
        }
        stack.set_undo_limit(2);
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.index(), 2);

        stack.undo().unwrap();
        stack.undo().unwrap();
        assert!(!stack.can_undo());
        assert_eq!(document.positions()[0].x, 3.0);
    }

    #[test]
    fn move_commands_never_merge() {
        let document = document();
        let mut stack = UndoStack::new();
        stack.push(move_to(&document, 1.0)).unwrap();
        assert!(!stack.push(move_to(&document, 1.0)).unwrap());
        assert_eq!(stack.len(), 2);
    }

    #[test]
    fn clear_empties_the_history_without_undoing() {
        let document = document();
        let mut stack = UndoStack::new();
        stack.push(move_to(&document, 4.0)).unwrap();
        stack.clear();
        assert!(stack.is_empty());
        assert_eq!(stack.undo_text(), None);
        assert_eq!(document.positions()[0].x, 4.0);
    }
}

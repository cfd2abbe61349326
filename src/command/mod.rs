//! Reversible editor commands and the history that owns them.
//!
//! Every mutating editor operation is a [`Command`]: constructed once with
//! everything it needs to reverse itself, executed immediately, then undone and
//! re-executed any number of times while the [`CommandHistory`] still holds it.
//! Commands that allocate native memory also implement [`OwnsResources`] so the
//! history can release that memory exactly once, when the command can no
//! longer be reached.

mod artboards;
mod commands;
mod dispatch;
mod flood_fill;
mod history;
mod spans;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::artboard::ArtboardError;

pub use artboards::{CreateArtboard, DuplicateArtboard, RemoveArtboard};
pub use commands::{ClosureCommand, EraseRegion, PaintRegion, ToggleLayerVisibility};
pub use dispatch::{Dispatcher, Inline, Invocation, RenderThread};
pub use flood_fill::FloodFill;
pub use history::{CommandHistory, HistoryError};
pub use spans::SpanSet;

/// Result type for command operations
pub type CommandResult = Result<(), CommandError>;

pub type BoxedCommand = Box<dyn Command>;

/// Errors that can occur while building or running a command
#[derive(Error, Debug)]
pub enum CommandError {
    /// The command parameters are invalid; the command is never created
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// `undo` was called on a command that is not currently applied
    #[error("{0} was undone before it was executed")]
    NotExecuted(&'static str),
    /// `undo` was called on a transient command
    #[error("{0} cannot be undone")]
    NotUndoable(&'static str),
    /// The command already gave up the resources it needs to run
    #[error("{0} has already released its resources")]
    Released(&'static str),
    /// The command panicked while running on the render thread
    #[error("{0} panicked")]
    Panicked(&'static str),
    #[error("Artboard {0} is not part of the project")]
    UnknownArtboard(Uuid),
    #[error(transparent)]
    Artboard(#[from] ArtboardError),
}

/// A reversible unit of editor mutation.
pub trait Command: Send {
    /// Short name used in logs and history events
    fn name(&self) -> &'static str;

    /// Applies the effect. Called once on push, and again for every redo.
    fn execute(&mut self) -> CommandResult;

    /// Reverses the most recent [`Command::execute`].
    fn undo(&mut self) -> CommandResult;

    /// If true, `execute` and `undo` must run on the render thread.
    fn requires_render_thread(&self) -> bool {
        false
    }

    /// Transient commands are executed and dropped; they are never undone.
    fn is_transient(&self) -> bool {
        false
    }

    /// The resource-owning side of this command, if it has one.
    fn resources(&mut self) -> Option<&mut dyn OwnsResources> {
        None
    }
}

/// The two stacks of the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StackSide {
    Undo,
    Redo,
}

/// When a resource-owning command may free its memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShutdownCases {
    /// Once the command falls off the undo stack its effect is permanent.
    OnUndoEviction,
    /// Once the command falls off the redo stack its effect is lost for good.
    OnRedoEviction,
    /// Either of the above.
    OnAnyEviction,
}

impl ShutdownCases {
    pub fn releases_on(self, side: StackSide) -> bool {
        matches!(
            (self, side),
            (ShutdownCases::OnAnyEviction, _)
                | (ShutdownCases::OnUndoEviction, StackSide::Undo)
                | (ShutdownCases::OnRedoEviction, StackSide::Redo)
        )
    }
}

/// Commands holding native memory whose lifetime follows stack membership.
///
/// [`OwnsResources::release_native_resources`] must be idempotent: several
/// shutdown triggers can reach the same command.
pub trait OwnsResources {
    fn shutdown_cases(&self) -> ShutdownCases;

    fn release_native_resources(&mut self);

    fn is_released(&self) -> bool;

    /// Called when the history is cleared while this command is still on a stack.
    fn on_stack_cleared(&mut self, was_in_undo_stack: bool) {
        let side = if was_in_undo_stack { StackSide::Undo } else { StackSide::Redo };
        if self.shutdown_cases().releases_on(side) {
            self.release_native_resources();
        }
    }
}

/// Release state of a resource-owning command. `Released` is terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReleaseState {
    #[default]
    Unreleased,
    Released,
}

impl ReleaseState {
    /// Runs `free` on the first call only.
    pub fn release(&mut self, free: impl FnOnce()) {
        if *self == ReleaseState::Released {
            return;
        }
        free();
        *self = ReleaseState::Released;
    }

    pub fn is_released(self) -> bool {
        self == ReleaseState::Released
    }
}

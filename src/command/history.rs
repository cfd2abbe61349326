use std::collections::VecDeque;
use std::mem;

use thiserror::Error;

use super::{BoxedCommand, CommandError, CommandResult, Dispatcher, Invocation, StackSide};
use crate::config::HistoryConfig;
use crate::event::{EventBus, HistoryEvent};

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Nothing to undo")]
    NothingToUndo,
    #[error("Nothing to redo")]
    NothingToRedo,
    #[error("The render thread is no longer running")]
    RenderThreadClosed,
    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Owns the undo and redo stacks.
///
/// The stacks are the only owners of pushed commands, so a command holding
/// native memory lives exactly as long as it is reachable from one of them.
/// When a command leaves a stack for good, the history asks it to release its
/// resources if its [`ShutdownCases`](super::ShutdownCases) cover that stack.
pub struct CommandHistory {
    /// Stack of commands that can be undone, oldest at the front
    undo_stack: VecDeque<BoxedCommand>,
    /// Stack of commands that can be redone, oldest at the front
    redo_stack: VecDeque<BoxedCommand>,
    capacity: usize,
    dispatcher: Box<dyn Dispatcher>,
    events: EventBus,
}

impl std::fmt::Debug for CommandHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandHistory")
            .field("undo", &self.undo_stack.iter().map(|c| c.name()).collect::<Vec<_>>())
            .field("redo", &self.redo_stack.iter().map(|c| c.name()).collect::<Vec<_>>())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl CommandHistory {
    pub fn new(config: &HistoryConfig, dispatcher: impl Dispatcher + 'static) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            capacity: config.capacity.max(1),
            dispatcher: Box::new(dispatcher),
            events: EventBus::new(),
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Executes a command and records it unless it is transient.
    ///
    /// Recording a command discards everything that could be redone, and drops
    /// the oldest undoable command once the stack is over capacity.
    pub fn push(&mut self, command: BoxedCommand) -> Result<(), HistoryError> {
        let name = command.name();
        let (command, result) = self.invoke(command, Invocation::Execute)?;
        if let Err(err) = result {
            log::warn!("Failed to execute {}: {}", name, err);
            self.release(command);
            return Err(err.into());
        }
        self.events.emit(HistoryEvent::Executed { command: name });

        if command.is_transient() {
            self.release(command);
            return Ok(());
        }

        for discarded in mem::take(&mut self.redo_stack).into_iter().rev() {
            self.evict(discarded, StackSide::Redo);
        }
        self.undo_stack.push_back(command);
        self.enforce_capacity(StackSide::Undo);
        log::debug!("Pushed {} ({} undoable)", name, self.undo_stack.len());
        Ok(())
    }

    /// Undo the last executed command
    pub fn undo(&mut self) -> Result<(), HistoryError> {
        let command = self.undo_stack.pop_back().ok_or(HistoryError::NothingToUndo)?;
        let name = command.name();
        let (command, result) = self.invoke(command, Invocation::Undo)?;
        if let Err(err) = result {
            log::warn!("Failed to undo {}: {}", name, err);
            self.undo_stack.push_back(command);
            return Err(err.into());
        }

        self.redo_stack.push_back(command);
        self.enforce_capacity(StackSide::Redo);
        self.events.emit(HistoryEvent::Undone { command: name });
        log::debug!("Undid {}", name);
        Ok(())
    }

    /// Redo the last undone command
    pub fn redo(&mut self) -> Result<(), HistoryError> {
        let command = self.redo_stack.pop_back().ok_or(HistoryError::NothingToRedo)?;
        let name = command.name();
        let (command, result) = self.invoke(command, Invocation::Execute)?;
        if let Err(err) = result {
            log::warn!("Failed to redo {}: {}", name, err);
            self.redo_stack.push_back(command);
            return Err(err.into());
        }

        self.undo_stack.push_back(command);
        self.enforce_capacity(StackSide::Undo);
        self.events.emit(HistoryEvent::Redone { command: name });
        log::debug!("Redid {}", name);
        Ok(())
    }

    /// Empties both stacks, telling every resource owner which side it was on.
    pub fn clear(&mut self) {
        let undo = mem::take(&mut self.undo_stack);
        let redo = mem::take(&mut self.redo_stack);
        let (undo_len, redo_len) = (undo.len(), redo.len());

        for command in undo {
            self.notify_cleared(command, true);
        }
        for command in redo {
            self.notify_cleared(command, false);
        }
        self.events.emit(HistoryEvent::Cleared {
            undo: undo_len,
            redo: redo_len,
        });
        log::debug!("Cleared history ({} undoable, {} redoable)", undo_len, redo_len);
    }

    /// Releases every resource owner still on either stack and empties them.
    /// Runs on drop.
    pub fn shutdown(&mut self) {
        let undo = mem::take(&mut self.undo_stack);
        let redo = mem::take(&mut self.redo_stack);
        for command in undo.into_iter().chain(redo) {
            self.release(command);
        }
    }

    /// Returns true if there are commands that can be undone
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Returns true if there are commands that can be redone
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn invoke(
        &self,
        mut command: BoxedCommand,
        invocation: Invocation,
    ) -> Result<(BoxedCommand, CommandResult), HistoryError> {
        if command.requires_render_thread() {
            return self.dispatcher.on_render_thread(command, invocation);
        }
        let result = invocation.apply(command.as_mut());
        Ok((command, result))
    }

    fn enforce_capacity(&mut self, side: StackSide) {
        loop {
            let stack = match side {
                StackSide::Undo => &mut self.undo_stack,
                StackSide::Redo => &mut self.redo_stack,
            };
            if stack.len() <= self.capacity {
                break;
            }
            if let Some(oldest) = stack.pop_front() {
                self.evict(oldest, side);
            }
        }
    }

    fn evict(&self, mut command: BoxedCommand, side: StackSide) {
        let name = command.name();
        log::debug!("Evicted {} from the {:?} stack", name, side);
        self.events.emit(HistoryEvent::Evicted { command: name, side });

        let releases = command
            .resources()
            .is_some_and(|owner| owner.shutdown_cases().releases_on(side));
        if releases {
            self.release(command);
        }
    }

    fn release(&self, mut command: BoxedCommand) {
        if command.resources().is_none() {
            return;
        }
        let name = command.name();
        match self.invoke(command, Invocation::Release) {
            Ok(_) => log::info!("Released resources held by {}", name),
            Err(err) => log::error!("Could not release resources held by {}: {}", name, err),
        }
    }

    fn notify_cleared(&self, mut command: BoxedCommand, was_in_undo_stack: bool) {
        if command.resources().is_none() {
            return;
        }
        let name = command.name();
        if let Err(err) = self.invoke(command, Invocation::StackCleared { was_in_undo_stack }) {
            log::error!("Could not notify {} of the cleared history: {}", name, err);
        }
    }
}

impl Drop for CommandHistory {
    fn drop(&mut self) {
        self.shutdown();
    }
}

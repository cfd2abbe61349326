use std::cell::{Cell, RefCell};

use crate::command::StackSide;

/// Notifications emitted by the command history
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryEvent {
    Executed { command: &'static str },
    Undone { command: &'static str },
    Redone { command: &'static str },
    /// A command fell off a stack and can no longer be reached
    Evicted { command: &'static str, side: StackSide },
    /// Both stacks were emptied
    Cleared { undo: usize, redo: usize },
}

pub trait EventHandler {
    fn handle_event(&mut self, event: &HistoryEvent);
}

impl<F: FnMut(&HistoryEvent)> EventHandler for F {
    fn handle_event(&mut self, event: &HistoryEvent) {
        self(event)
    }
}

/// Returned by [`EventBus::subscribe`], used to unsubscribe again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Fans history events out to UI subscribers.
///
/// Lives inside the history and is only touched from the thread that owns it.
/// Handlers must not subscribe or unsubscribe from within `handle_event`.
#[derive(Default)]
pub struct EventBus {
    handlers: RefCell<Vec<(HandlerId, Box<dyn EventHandler>)>>,
    next_id: Cell<u64>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, handler: Box<dyn EventHandler>) -> HandlerId {
        let id = HandlerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.handlers.borrow_mut().push((id, handler));
        id
    }

    /// Returns whether a handler was registered under `id`.
    pub fn unsubscribe(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.borrow_mut();
        let before = handlers.len();
        handlers.retain(|(handler_id, _)| *handler_id != id);
        handlers.len() != before
    }

    pub fn len(&self) -> usize {
        self.handlers.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn emit(&self, event: HistoryEvent) {
        log::trace!("History event {:?}", event);
        for (_, handler) in self.handlers.borrow_mut().iter_mut() {
            handler.handle_event(&event);
        }
    }
}

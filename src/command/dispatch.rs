use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle, ThreadId};

use futures::channel::{mpsc, oneshot};
use futures::executor::{block_on, block_on_stream};

use super::{BoxedCommand, Command, CommandError, CommandResult, HistoryError};

/// A hook the history runs on a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invocation {
    Execute,
    Undo,
    Release,
    StackCleared { was_in_undo_stack: bool },
}

impl Invocation {
    /// Runs this hook against `command` on the current thread.
    pub fn apply(self, command: &mut dyn Command) -> CommandResult {
        match self {
            Invocation::Execute => command.execute(),
            Invocation::Undo => command.undo(),
            Invocation::Release => {
                if let Some(owner) = command.resources() {
                    owner.release_native_resources();
                }
                Ok(())
            }
            Invocation::StackCleared { was_in_undo_stack } => {
                if let Some(owner) = command.resources() {
                    owner.on_stack_cleared(was_in_undo_stack);
                }
                Ok(())
            }
        }
    }
}

/// Routes hooks of render-thread commands to the render thread.
pub trait Dispatcher {
    /// Runs `invocation` on the render thread, blocks until it is done and hands
    /// the command back together with the hook's result.
    fn on_render_thread(
        &self,
        command: BoxedCommand,
        invocation: Invocation,
    ) -> Result<(BoxedCommand, CommandResult), HistoryError>;
}

/// Dispatch for callers that already are the render thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct Inline;

impl Dispatcher for Inline {
    fn on_render_thread(
        &self,
        mut command: BoxedCommand,
        invocation: Invocation,
    ) -> Result<(BoxedCommand, CommandResult), HistoryError> {
        let result = invocation.apply(command.as_mut());
        Ok((command, result))
    }
}

type Job = (BoxedCommand, Invocation, oneshot::Sender<(BoxedCommand, CommandResult)>);

/// A dedicated thread that owns every render-thread hook.
///
/// Jobs run one at a time in submission order, outside of any executor, so a
/// job may block on futures of its own. A job that panics is answered with
/// [`CommandError::Panicked`] and the thread keeps serving. Dropping the handle
/// closes the queue and joins the thread.
pub struct RenderThread {
    sender: Option<mpsc::UnboundedSender<Job>>,
    handle: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for RenderThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderThread")
            .field("thread", &self.thread_id())
            .field("open", &self.sender.is_some())
            .finish()
    }
}

impl RenderThread {
    pub fn spawn(name: &str) -> Result<Self, std::io::Error> {
        let (sender, receiver) = mpsc::unbounded::<Job>();
        let handle = thread::Builder::new().name(name.to_string()).spawn(move || {
            for (mut command, invocation, reply) in block_on_stream(receiver) {
                let result = panic::catch_unwind(AssertUnwindSafe(|| invocation.apply(command.as_mut())))
                    .unwrap_or_else(|_| {
                        log::error!("{} panicked during {:?} on the render thread", command.name(), invocation);
                        Err(CommandError::Panicked(command.name()))
                    });
                if reply.send((command, result)).is_err() {
                    log::warn!("Render thread finished a {:?} nobody is waiting for", invocation);
                }
            }
            log::debug!("Render thread stopped");
        })?;

        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
        })
    }

    pub fn thread_id(&self) -> Option<ThreadId> {
        self.handle.as_ref().map(|handle| handle.thread().id())
    }
}

impl Dispatcher for RenderThread {
    fn on_render_thread(
        &self,
        command: BoxedCommand,
        invocation: Invocation,
    ) -> Result<(BoxedCommand, CommandResult), HistoryError> {
        let sender = self.sender.as_ref().ok_or(HistoryError::RenderThreadClosed)?;
        let (reply, response) = oneshot::channel();
        sender
            .unbounded_send((command, invocation, reply))
            .map_err(|_| HistoryError::RenderThreadClosed)?;
        block_on(response).map_err(|_| HistoryError::RenderThreadClosed)
    }
}

impl Drop for RenderThread {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Render thread panicked");
            }
        }
    }
}

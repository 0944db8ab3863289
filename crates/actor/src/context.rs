use tokio::task::JoinSet;
use tracing::Instrument;

use crate::Actor;

/// Access to the running actor while one of its messages is handled.
pub struct Context<'a, S> {
    actor: Actor<S>,
    tasks: &'a mut JoinSet<()>,
    stopping: &'a mut bool,
}

impl<'a, S: Send + 'static> Context<'a, S> {
    #[inline]
    pub(crate) fn new(
        actor: Actor<S>,
        tasks: &'a mut JoinSet<()>,
        stopping: &'a mut bool,
    ) -> Self {
        Self {
            actor,
            tasks,
            stopping,
        }
    }

    /// Returns the handle of the actor handling the message.
    #[inline]
    pub fn actor(&self) -> &Actor<S> {
        &self.actor
    }

    /// Spawns a task owned by the actor.
    ///
    /// The task is aborted when the actor stops, so it should report its
    /// outcome by sending a message rather than relying on running to
    /// completion.
    pub fn spawn<F>(&mut self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.spawn(fut.instrument(trace_span!("actor task")));
    }

    /// Returns the number of owned tasks that are still running.
    #[inline]
    pub fn running_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Stops the actor once the current message has been handled.
    ///
    /// Owned tasks are aborted and the state is dropped. Messages that
    /// are still queued are discarded.
    #[inline]
    pub fn stop(&mut self) {
        *self.stopping = true;
    }
}

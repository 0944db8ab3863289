use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::Instrument;

use crate::mailbox::{Mailbox, MailboxParts};
use crate::scheduler::run_actor;
use crate::{ActorDeadError, Message, Reply, Response};

/// Handle to an actor.
pub struct Actor<S> {
    mailbox: Arc<Mailbox<S>>,
}

impl<S: Send + 'static> Actor<S> {
    /// Spawns a new actor with the specified state and an optional label.
    ///
    /// Must be called within a Tokio runtime.
    pub fn spawn(state: S, label: Option<&str>) -> Self {
        let MailboxParts {
            mailbox,
            msg_rx,
            kill_rx,
        } = Mailbox::new();
        let mailbox = Arc::new(mailbox);
        tokio::spawn(
            run_actor(Arc::downgrade(&mailbox), state, msg_rx, kill_rx)
                .instrument(trace_span!("actor", label = label)),
        );
        Self { mailbox }
    }

    #[inline]
    pub(crate) fn from_mailbox(mailbox: Arc<Mailbox<S>>) -> Self {
        Self { mailbox }
    }

    /// Sends a message to the actor.
    #[inline]
    pub fn send<M: Message<S> + 'static>(
        &self,
        msg: M,
    ) -> Result<(), ActorDeadError> {
        self.mailbox.send(Box::new(msg))
    }

    /// Sends a request to the actor and returns a future of its answer.
    ///
    /// The message is enqueued before this method returns, so requests
    /// are handled in the order they were made even if the returned
    /// futures are awaited in a different order.
    pub fn ask<T, M, F>(&self, make_msg: F) -> Response<T>
    where
        T: Send + 'static,
        M: Message<S> + 'static,
        F: FnOnce(Reply<T>) -> M,
    {
        let (tx, rx) = oneshot::channel();
        if self.send(make_msg(Reply::new(tx))).is_err() {
            // The message, and the reply with it, has been dropped. The
            // response resolves to an error.
            trace!("asked a dead actor");
        }
        Response::new(rx)
    }

    /// Attempts to kill the actor.
    ///
    /// The actor is not guaranteed to be killed immediately, but it
    /// will stop handling further messages and quit soon.
    #[inline]
    pub fn try_kill(&self) {
        self.mailbox.try_kill();
    }

    /// Returns `true` if the actor no longer accepts messages.
    #[inline]
    pub fn is_dead(&self) -> bool {
        self.mailbox.is_closed()
    }
}

impl<S> Clone for Actor<S> {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            mailbox: Arc::clone(&self.mailbox),
        }
    }
}

use std::fmt::{self, Debug};
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::ActorDeadError;

/// The sending half of a request made with [`crate::Actor::ask`].
///
/// Messages carry it around until the answer is known. It may travel
/// through several messages and tasks before being used. Dropping it
/// without replying resolves the request with [`ActorDeadError`].
pub struct Reply<T>(oneshot::Sender<T>);

impl<T> Reply<T> {
    #[inline]
    pub(crate) fn new(tx: oneshot::Sender<T>) -> Self {
        Self(tx)
    }

    /// Answers the request.
    #[inline]
    pub fn send(self, value: T) {
        if self.0.send(value).is_err() {
            trace!("requester has gone away, reply discarded");
        }
    }

    /// Returns `true` if nobody waits for the answer anymore.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.0.is_closed()
    }
}

impl<T> Debug for Reply<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reply")
            .field("closed", &self.0.is_closed())
            .finish()
    }
}

/// A future resolving to the answer of a request.
#[must_use = "responses do nothing unless awaited"]
pub struct Response<T>(oneshot::Receiver<T>);

impl<T> Response<T> {
    #[inline]
    pub(crate) fn new(rx: oneshot::Receiver<T>) -> Self {
        Self(rx)
    }
}

impl<T> Future for Response<T> {
    type Output = Result<T, ActorDeadError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.0)
            .poll(cx)
            .map(|res| res.map_err(|_| ActorDeadError))
    }
}

impl<T> Debug for Response<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response").finish_non_exhaustive()
    }
}

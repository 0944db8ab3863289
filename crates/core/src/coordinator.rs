//! Single-flight and timeout discipline for store workflows.
//!
//! Every workflow of a tracked kind runs under a [`CancelToken`]. Issuing
//! a token supersedes the previous one of the same kind, and only the
//! latest token is allowed to touch the store when its work comes back.

use std::fmt::{self, Display};
use std::time::Duration;

use tokio::select;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

use crate::error::Error;

/// The kind of a store workflow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum OpKind {
    /// Loading a conversation and making it active.
    Switch,
    /// Sending a message.
    Send,
    /// Reloading the conversation list.
    Refresh,
    /// Untracked one-off requests (metadata updates, deletes).
    Detached,
}

const TRACKED_KINDS: usize = 3;

impl OpKind {
    #[inline]
    fn slot(self) -> Option<usize> {
        match self {
            OpKind::Switch => Some(0),
            OpKind::Send => Some(1),
            OpKind::Refresh => Some(2),
            OpKind::Detached => None,
        }
    }
}

impl Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpKind::Switch => write!(f, "switch"),
            OpKind::Send => write!(f, "send"),
            OpKind::Refresh => write!(f, "refresh"),
            OpKind::Detached => write!(f, "detached"),
        }
    }
}

/// Identifies one in-flight workflow.
///
/// The token is cancelled when a newer token of its kind is issued, when
/// the session is torn down, or when its deadline passes.
#[derive(Clone, Debug)]
pub(crate) struct CancelToken {
    kind: OpKind,
    generation: u64,
    deadline: Instant,
    token: CancellationToken,
}

impl CancelToken {
    #[cfg(test)]
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn timed_out(&self) -> bool {
        Instant::now() >= self.deadline
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || self.timed_out()
    }

    /// Waits until the token is cancelled and returns the matching
    /// error. Reaching the deadline cancels the token.
    pub async fn cancelled(&self) -> Error {
        select! {
            biased;

            _ = self.token.cancelled() => {
                Error::cancelled().with_reason(format!("{self} was superseded"))
            }
            _ = sleep_until(self.deadline) => {
                self.token.cancel();
                Error::cancelled().with_reason(format!("{self} timed out"))
            }
        }
    }
}

impl Display for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{}", self.kind, self.generation)
    }
}

/// Issues and tracks cancel tokens for one session.
pub(crate) struct Coordinator {
    root: CancellationToken,
    generations: [u64; TRACKED_KINDS],
    live: [Option<CancelToken>; TRACKED_KINDS],
}

impl Coordinator {
    pub fn new() -> Self {
        Self {
            root: CancellationToken::new(),
            generations: [0; TRACKED_KINDS],
            live: Default::default(),
        }
    }

    /// Issues a new token of the given kind, superseding the previous
    /// one. Detached tokens supersede nothing.
    pub fn issue(&mut self, kind: OpKind, timeout: Duration) -> CancelToken {
        let deadline = Instant::now() + timeout;
        let Some(slot) = kind.slot() else {
            return CancelToken {
                kind,
                generation: 0,
                deadline,
                token: self.root.child_token(),
            };
        };

        if let Some(prev) = self.live[slot].take() {
            debug!("{prev} superseded");
            prev.token.cancel();
        }
        self.generations[slot] += 1;
        let token = CancelToken {
            kind,
            generation: self.generations[slot],
            deadline,
            token: self.root.child_token(),
        };
        trace!("issued {token}");
        self.live[slot] = Some(token.clone());
        token
    }

    /// Returns `true` if `token` is the latest of its kind, whether or
    /// not it has timed out. The owner of the latest token is the one
    /// responsible for cleaning up after it.
    pub fn owns(&self, token: &CancelToken) -> bool {
        let Some(slot) = token.kind.slot() else {
            return false;
        };
        self.live[slot]
            .as_ref()
            .is_some_and(|live| live.generation == token.generation)
    }

    /// Returns `true` if results of `token` may still be applied.
    #[cfg(test)]
    #[inline]
    pub fn is_live(&self, token: &CancelToken) -> bool {
        self.owns(token) && !token.is_cancelled()
    }

    /// Returns the generation of the latest token issued for `kind`.
    /// Comparing two readings tells whether a newer workflow of that
    /// kind was started in between.
    #[inline]
    pub fn latest(&self, kind: OpKind) -> u64 {
        kind.slot().map_or(0, |slot| self.generations[slot])
    }

    /// Returns `true` if a workflow of the given kind has not settled.
    #[inline]
    pub fn in_flight(&self, kind: OpKind) -> bool {
        kind.slot().is_some_and(|slot| self.live[slot].is_some())
    }

    /// Marks the workflow of `token` as finished. Returns `false` if the
    /// token had been superseded.
    pub fn settle(&mut self, token: &CancelToken) -> bool {
        if !self.owns(token) {
            return false;
        }
        if let Some(slot) = token.kind.slot() {
            self.live[slot] = None;
        }
        trace!("settled {token}");
        true
    }

    /// Cancels every token issued so far, and any issued later.
    pub fn cancel_all(&mut self) {
        self.root.cancel();
        for live in &mut self.live {
            live.take();
        }
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.root.cancel();
    }
}

use std::sync::Weak;

use tokio::select;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;

use crate::mailbox::Mailbox;
use crate::{Actor, Context, Message};

#[inline]
pub async fn run_actor<S: Send + 'static>(
    mailbox: Weak<Mailbox<S>>,
    mut state: S,
    mut msg_rx: mpsc::UnboundedReceiver<Box<dyn Message<S>>>,
    mut kill_rx: watch::Receiver<bool>,
) {
    debug!("started");
    let mut tasks = JoinSet::new();
    let mut stopping = false;
    loop {
        let msg = select! {
            biased;

            _ = kill_rx.changed() => {
                break;
            }
            Some(res) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(err) = res {
                    if err.is_panic() {
                        error!("an actor task panicked: {err}");
                    }
                }
                continue;
            }
            msg = msg_rx.recv() => {
                let Some(msg) = msg else {
                    break;
                };
                msg
            }
        };
        trace!("received message: {msg:?}");

        {
            let Some(mailbox) = mailbox.upgrade() else {
                warn!("last mailbox has been dropped, discard the message");
                break;
            };

            let proc_span = trace_span!("proc msg");
            proc_span.in_scope(|| {
                let mut ctx = Context::new(
                    Actor::from_mailbox(mailbox),
                    &mut tasks,
                    &mut stopping,
                );
                msg.handle(&mut state, &mut ctx);
                trace!("finished");
            });
        }

        if stopping {
            break;
        }
    }
    debug!("will terminate, aborting {} task(s)", tasks.len());
    tasks.abort_all();
    drop(state);
}

//! Listener subscriptions over broadcast channels.
//!
//! The cache and the session store publish every committed transition on a
//! [`broadcast`] channel. [`listen`] turns such a channel into a plain callback
//! running on its own task, and hands back a [`Handle`] that stops it.

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Handle for a running listener task.
///
/// Dropping the handle stops the listener as well; [`unsubscribe`](Self::unsubscribe)
/// additionally waits for the task to finish.
#[derive(Debug)]
pub struct Handle {
    token: CancellationToken,
    join: Option<JoinHandle<()>>,
}

impl Handle {
    pub(crate) const fn new(token: CancellationToken, join: JoinHandle<()>) -> Self {
        Self {
            token,
            join: Some(join),
        }
    }

    /// Stop the listener and wait for its task to complete.
    pub async fn unsubscribe(mut self) {
        self.token.cancel();
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
    }

    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled() && self.join.as_ref().is_some_and(|join| !join.is_finished())
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Calls `listener` with every value received on `rx` until the handle is
/// dropped or the sender goes away. Lagging drops the missed values.
pub(crate) fn listen<E, F>(mut rx: broadcast::Receiver<E>, listener: F) -> Handle
where
    E: Clone + Send + 'static,
    F: Fn(E) + Send + 'static,
{
    let token = CancellationToken::new();
    let child = token.clone();
    let join = tokio::spawn(async move {
        loop {
            tokio::select! {
                () = child.cancelled() => break,
                received = rx.recv() => match received {
                    Ok(event) => listener(event),
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "Listener lagged behind, events dropped");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
    });
    Handle::new(token, join)
}

use std::sync::Arc;

use futures::{FutureExt, Stream, StreamExt};
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::debug;

use super::ChangeEvent;
use crate::board::BoardView;
use crate::store::BoardGateway;

/// Re-fetches a board view whenever a change arrives on its stream. Bursts
/// are coalesced: every event already queued behind the first one is
/// consumed before the single re-fetch. Dropping the listener stops it.
pub struct InvalidationListener {
    handle: JoinHandle<()>,
}

impl InvalidationListener {
    pub fn spawn<S, G>(changes: S, view: Arc<Mutex<BoardView<G>>>) -> Self
    where
        S: Stream<Item = ChangeEvent> + Send + 'static,
        G: BoardGateway + 'static,
    {
        let handle = tokio::spawn(listen(changes, view));
        InvalidationListener { handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Abort the listening task. No re-fetch starts after this returns.
    pub fn stop(self) {
        self.handle.abort();
    }
}

impl Drop for InvalidationListener {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn listen<S, G>(changes: S, view: Arc<Mutex<BoardView<G>>>)
where
    S: Stream<Item = ChangeEvent> + Send + 'static,
    G: BoardGateway + 'static,
{
    let mut changes = Box::pin(changes);

    while let Some(event) = changes.next().await {
        let mut coalesced = 0usize;
        let mut closed = false;
        loop {
            match changes.next().now_or_never() {
                Some(Some(_)) => coalesced += 1,
                Some(None) => {
                    closed = true;
                    break;
                }
                None => break,
            }
        }

        debug!(table = ?event.table, row = %event.row_id, coalesced, "board invalidated");
        let mut view = view.lock().await;
        view.on_remote_change().await;
        drop(view);

        if closed {
            break;
        }
    }

    debug!("change stream closed");
}

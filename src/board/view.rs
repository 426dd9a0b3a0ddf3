//! Optimistic board view.
//!
//! Holds the last snapshot fetched from the gateway and, while a gesture is
//! in progress, the drag session whose snapshot is rendered instead. Every
//! drop ends with a full re-fetch, so the optimistic state never outlives
//! the next read.

use tracing::{debug, info, warn};

use super::engine::{DragItem, DragSession, DropTarget, PositionPlan};
use super::model::BoardSnapshot;
use crate::error::Result;
use crate::store::BoardGateway;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewState {
    /// Nothing fetched yet.
    Idle,
    Loading,
    /// The snapshot is what the gateway last returned.
    Settled,
    /// The last read failed; `refresh` retries.
    Failed { message: String },
    /// The board no longer exists.
    NotFound,
}

pub struct BoardView<G> {
    gateway: G,
    board_id: String,
    state: ViewState,
    snapshot: Option<BoardSnapshot>,
    drag: Option<DragSession>,
    /// An invalidation arrived while dragging.
    stale: bool,
}

impl<G: BoardGateway> BoardView<G> {
    pub fn new(gateway: G, board_id: impl Into<String>) -> Self {
        BoardView {
            gateway,
            board_id: board_id.into(),
            state: ViewState::Idle,
            snapshot: None,
            drag: None,
            stale: false,
        }
    }

    pub fn board_id(&self) -> &str {
        &self.board_id
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// The snapshot to render: the drag session's while dragging, the
    /// fetched one otherwise.
    pub fn snapshot(&self) -> Option<&BoardSnapshot> {
        match &self.drag {
            Some(session) => Some(session.current()),
            None => self.snapshot.as_ref(),
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Whether a re-fetch is owed once the current gesture ends.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Replace the snapshot with the gateway's current board. Any gesture in
    /// progress is discarded. A failed read keeps the previous snapshot.
    pub async fn refresh(&mut self) -> &ViewState {
        if self.drag.take().is_some() {
            debug!(board = %self.board_id, "refresh discarded drag in progress");
        }
        self.stale = false;
        self.state = ViewState::Loading;

        self.state = match self.gateway.fetch_board(&self.board_id).await {
            Ok(Some(snapshot)) => {
                self.snapshot = Some(snapshot);
                ViewState::Settled
            }
            Ok(None) => {
                warn!(board = %self.board_id, "board not found");
                self.snapshot = None;
                ViewState::NotFound
            }
            Err(err) => {
                warn!(board = %self.board_id, error = %err, "failed to load board");
                ViewState::Failed {
                    message: err.to_string(),
                }
            }
        };
        &self.state
    }

    /// Start a gesture. Returns false when nothing is loaded, a gesture is
    /// already running, or the item is not on the board.
    pub fn begin_drag(&mut self, item: DragItem) -> bool {
        if self.drag.is_some() {
            return false;
        }
        let snapshot = match &self.snapshot {
            Some(snapshot) => snapshot.clone(),
            None => return false,
        };
        self.drag = DragSession::start(snapshot, item);
        self.drag.is_some()
    }

    /// Apply a drag-over event to the optimistic snapshot. Returns whether
    /// the rendered snapshot changed.
    pub fn drag_over(&mut self, target: DropTarget) -> bool {
        match &mut self.drag {
            Some(session) => session.over(target),
            None => false,
        }
    }

    /// Finish the gesture. Dropping outside any target restores the snapshot
    /// from before the gesture. Otherwise the changed rows are written
    /// through the gateway and the board is re-fetched, also when the write
    /// fails; the write error is returned after the re-fetch.
    pub async fn end_drag(&mut self, target: Option<DropTarget>) -> Result<PositionPlan> {
        let session = match self.drag.take() {
            Some(session) => session,
            None => return Ok(PositionPlan::new(self.board_id.clone())),
        };

        let target = match target {
            Some(target) => target,
            None => {
                self.snapshot = Some(session.cancel());
                self.settle_deferred().await;
                return Ok(PositionPlan::new(self.board_id.clone()));
            }
        };

        // The fetched board stays current until a re-fetch confirms the write.
        let origin = session.origin().clone();
        let (_, plan) = session.finish(target);
        self.snapshot = Some(origin);
        if plan.is_empty() {
            self.settle_deferred().await;
            return Ok(plan);
        }

        match self.gateway.apply_positions(&plan).await {
            Ok(written) => {
                info!(board = %self.board_id, written, "persisted drop");
                self.refresh().await;
                Ok(plan)
            }
            Err(err) => {
                warn!(board = %self.board_id, error = %err, "failed to persist drop");
                self.refresh().await;
                Err(err)
            }
        }
    }

    /// Abandon the gesture and restore the snapshot it started from.
    pub async fn cancel_drag(&mut self) {
        if let Some(session) = self.drag.take() {
            self.snapshot = Some(session.cancel());
            self.settle_deferred().await;
        }
    }

    /// React to a remote change notification. While dragging the re-fetch
    /// is deferred until the gesture ends. Returns whether a re-fetch ran.
    pub async fn on_remote_change(&mut self) -> bool {
        if self.drag.is_some() {
            debug!(board = %self.board_id, "deferring refresh until drop");
            self.stale = true;
            return false;
        }
        self.refresh().await;
        true
    }

    async fn settle_deferred(&mut self) {
        if self.stale {
            self.refresh().await;
        }
    }
}

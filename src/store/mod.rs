//! Persistence gateway and the row-level store behind it.

pub mod postgres;

use std::sync::Arc;

#[cfg(any(test, feature = "test-support"))]
pub mod memory;

use crate::board::{Board, BoardSnapshot, Column, PositionPlan, Task};
use crate::error::Result;

pub use postgres::PgStore;

#[cfg(any(test, feature = "test-support"))]
pub use memory::MemoryStore;

/// What a board view needs from the source of truth: full board reads and
/// confirmed position writes.
#[tonic::async_trait]
pub trait BoardGateway: Send + Sync {
    /// The board with its columns and tasks in display order, or `None`
    /// when the board no longer exists.
    async fn fetch_board(&self, board_id: &str) -> Result<Option<BoardSnapshot>>;

    /// Apply every row of the plan atomically. Returns the number of rows
    /// written.
    async fn apply_positions(&self, plan: &PositionPlan) -> Result<usize>;
}

#[tonic::async_trait]
impl<T: BoardGateway + ?Sized> BoardGateway for Arc<T> {
    async fn fetch_board(&self, board_id: &str) -> Result<Option<BoardSnapshot>> {
        (**self).fetch_board(board_id).await
    }

    async fn apply_positions(&self, plan: &PositionPlan) -> Result<usize> {
        (**self).apply_positions(plan).await
    }
}

#[derive(Debug, Clone, Default)]
pub struct ColumnChanges {
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskChanges {
    pub title: Option<String>,
    /// `Some(None)` clears the description.
    pub description: Option<Option<String>>,
    /// Moving through an edit appends the task to the destination column.
    pub column_id: Option<String>,
}

/// A row addressed for an ownership lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowRef {
    Board(String),
    Column(String),
    Task(String),
}

impl RowRef {
    pub fn resource(&self) -> &'static str {
        match self {
            RowRef::Board(_) => "board",
            RowRef::Column(_) => "column",
            RowRef::Task(_) => "task",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            RowRef::Board(id) | RowRef::Column(id) | RowRef::Task(id) => id,
        }
    }
}

/// The board a row lives on and the user owning that board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowOwner {
    pub board_id: String,
    pub user_id: String,
}

/// Row CRUD over boards, columns and tasks. Every structural change leaves
/// the affected sibling lists numbered `0..n-1`.
#[tonic::async_trait]
pub trait BoardStore: BoardGateway {
    async fn ping(&self) -> Result<()>;

    async fn list_boards(&self, user_id: &str) -> Result<Vec<Board>>;

    async fn create_board(&self, user_id: &str, title: &str) -> Result<Board>;

    async fn rename_board(&self, board_id: &str, title: &str) -> Result<Board>;

    async fn delete_board(&self, board_id: &str) -> Result<Board>;

    /// Appends the column after the board's existing columns.
    async fn create_column(&self, board_id: &str, title: &str) -> Result<Column>;

    async fn update_column(&self, column_id: &str, changes: ColumnChanges) -> Result<Column>;

    async fn delete_column(&self, column_id: &str) -> Result<Column>;

    /// Appends the task after the column's existing tasks.
    async fn create_task(
        &self,
        column_id: &str,
        title: &str,
        description: Option<String>,
    ) -> Result<Task>;

    async fn update_task(&self, task_id: &str, changes: TaskChanges) -> Result<Task>;

    async fn delete_task(&self, task_id: &str) -> Result<Task>;

    async fn locate(&self, row: RowRef) -> Result<Option<RowOwner>>;
}

/// Empty descriptions are stored as null.
pub(crate) fn normalize_description(description: Option<String>) -> Option<String> {
    description.filter(|text| !text.trim().is_empty())
}

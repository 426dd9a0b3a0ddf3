//! Change notifications: the hub that fans row changes out to subscribers
//! and the listener that turns them into board re-fetches.

pub mod hub;
pub mod listener;

pub use hub::ChangeHub;
pub use listener::InvalidationListener;

use crate::board::{Board, Column, Task};
use crate::store::RowOwner;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Boards,
    Columns,
    Tasks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One changed row. `board_id` and `user_id` locate the row's board so
/// subscribers can be scoped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    pub row_id: String,
    pub board_id: Option<String>,
    pub user_id: Option<String>,
}

impl ChangeEvent {
    pub fn board(kind: ChangeKind, board: &Board) -> Self {
        ChangeEvent {
            table: Table::Boards,
            kind,
            row_id: board.id.clone(),
            board_id: Some(board.id.clone()),
            user_id: Some(board.user_id.clone()),
        }
    }

    pub fn column(kind: ChangeKind, column: &Column, owner: &RowOwner) -> Self {
        Self::owned(Table::Columns, kind, &column.id, owner)
    }

    pub fn task(kind: ChangeKind, task: &Task, owner: &RowOwner) -> Self {
        Self::owned(Table::Tasks, kind, &task.id, owner)
    }

    pub fn owned(table: Table, kind: ChangeKind, row_id: &str, owner: &RowOwner) -> Self {
        ChangeEvent {
            table,
            kind,
            row_id: row_id.to_string(),
            board_id: Some(owner.board_id.clone()),
            user_id: Some(owner.user_id.clone()),
        }
    }
}

/// Which events a subscriber receives. Empty `tables` means every table;
/// unset scopes match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeFilter {
    pub tables: Vec<Table>,
    pub user_id: Option<String>,
    pub board_id: Option<String>,
}

impl ChangeFilter {
    /// Everything a single board view needs: its board, columns and tasks.
    pub fn for_board(user_id: impl Into<String>, board_id: impl Into<String>) -> Self {
        ChangeFilter {
            tables: vec![Table::Boards, Table::Columns, Table::Tasks],
            user_id: Some(user_id.into()),
            board_id: Some(board_id.into()),
        }
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if !self.tables.is_empty() && !self.tables.contains(&event.table) {
            return false;
        }
        if let Some(user_id) = &self.user_id {
            if event.user_id.as_ref() != Some(user_id) {
                return false;
            }
        }
        match (&self.board_id, &event.board_id) {
            (Some(wanted), Some(actual)) => wanted == actual,
            _ => true,
        }
    }
}

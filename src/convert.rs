//! Conversions between domain types and their protobuf messages.

use chrono::{DateTime, TimeZone, Utc};
use prost_types::Timestamp;
use proto::kanban as pb;

use crate::board::{
    Board, BoardSnapshot, Column, ColumnPosition, ColumnWithTasks, PositionPlan, Task, TaskPosition,
};
use crate::error::{KanbanError, Result};
use crate::realtime::{ChangeEvent, ChangeFilter, ChangeKind, Table};

pub fn timestamp(at: &DateTime<Utc>) -> Timestamp {
    Timestamp {
        seconds: at.timestamp(),
        nanos: at.timestamp_subsec_nanos() as i32,
    }
}

pub fn datetime(at: Option<Timestamp>) -> DateTime<Utc> {
    at.and_then(|at| Utc.timestamp_opt(at.seconds, at.nanos.max(0) as u32).single())
        .unwrap_or_default()
}

impl From<Board> for pb::Board {
    fn from(board: Board) -> Self {
        pb::Board {
            created_at: Some(timestamp(&board.created_at)),
            id: board.id,
            user_id: board.user_id,
            title: board.title,
        }
    }
}

impl From<pb::Board> for Board {
    fn from(board: pb::Board) -> Self {
        Board {
            id: board.id,
            user_id: board.user_id,
            title: board.title,
            created_at: datetime(board.created_at),
        }
    }
}

impl From<Column> for pb::Column {
    fn from(column: Column) -> Self {
        pb::Column {
            created_at: Some(timestamp(&column.created_at)),
            id: column.id,
            board_id: column.board_id,
            title: column.title,
            position: column.position,
        }
    }
}

impl From<pb::Column> for Column {
    fn from(column: pb::Column) -> Self {
        Column {
            id: column.id,
            board_id: column.board_id,
            title: column.title,
            position: column.position,
            created_at: datetime(column.created_at),
        }
    }
}

impl From<Task> for pb::Task {
    fn from(task: Task) -> Self {
        pb::Task {
            created_at: Some(timestamp(&task.created_at)),
            id: task.id,
            column_id: task.column_id,
            title: task.title,
            description: task.description,
            position: task.position,
        }
    }
}

impl From<pb::Task> for Task {
    fn from(task: pb::Task) -> Self {
        Task {
            id: task.id,
            column_id: task.column_id,
            title: task.title,
            description: task.description,
            position: task.position,
            created_at: datetime(task.created_at),
        }
    }
}

impl From<BoardSnapshot> for pb::BoardWithColumns {
    fn from(snapshot: BoardSnapshot) -> Self {
        pb::BoardWithColumns {
            board: Some(snapshot.board.into()),
            columns: snapshot
                .columns
                .into_iter()
                .map(|entry| pb::ColumnWithTasks {
                    column: Some(entry.column.into()),
                    tasks: entry.tasks.into_iter().map(pb::Task::from).collect(),
                })
                .collect(),
        }
    }
}

impl TryFrom<pb::BoardWithColumns> for BoardSnapshot {
    type Error = KanbanError;

    fn try_from(message: pb::BoardWithColumns) -> Result<Self> {
        let board = message
            .board
            .ok_or_else(|| KanbanError::invalid_argument("board missing from response"))?;
        let columns = message
            .columns
            .into_iter()
            .map(|entry| {
                let column = entry
                    .column
                    .ok_or_else(|| KanbanError::invalid_argument("column missing from response"))?;
                Ok(ColumnWithTasks {
                    column: column.into(),
                    tasks: entry.tasks.into_iter().map(Task::from).collect(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(BoardSnapshot {
            board: board.into(),
            columns,
        })
    }
}

impl From<PositionPlan> for pb::PositionPlan {
    fn from(plan: PositionPlan) -> Self {
        pb::PositionPlan {
            board_id: plan.board_id,
            columns: plan
                .columns
                .into_iter()
                .map(|row| pb::ColumnPosition {
                    column_id: row.column_id,
                    position: row.position,
                })
                .collect(),
            tasks: plan
                .tasks
                .into_iter()
                .map(|row| pb::TaskPosition {
                    task_id: row.task_id,
                    column_id: row.column_id,
                    position: row.position,
                })
                .collect(),
        }
    }
}

impl From<pb::PositionPlan> for PositionPlan {
    fn from(plan: pb::PositionPlan) -> Self {
        PositionPlan {
            board_id: plan.board_id,
            columns: plan
                .columns
                .into_iter()
                .map(|row| ColumnPosition {
                    column_id: row.column_id,
                    position: row.position,
                })
                .collect(),
            tasks: plan
                .tasks
                .into_iter()
                .map(|row| TaskPosition {
                    task_id: row.task_id,
                    column_id: row.column_id,
                    position: row.position,
                })
                .collect(),
        }
    }
}

impl From<Table> for pb::Table {
    fn from(table: Table) -> Self {
        match table {
            Table::Boards => pb::Table::Boards,
            Table::Columns => pb::Table::Columns,
            Table::Tasks => pb::Table::Tasks,
        }
    }
}

fn table_from_i32(value: i32) -> Option<Table> {
    match pb::Table::from_i32(value)? {
        pb::Table::Boards => Some(Table::Boards),
        pb::Table::Columns => Some(Table::Columns),
        pb::Table::Tasks => Some(Table::Tasks),
        pb::Table::Unspecified => None,
    }
}

fn kind_from_i32(value: i32) -> Option<ChangeKind> {
    match pb::ChangeKind::from_i32(value)? {
        pb::ChangeKind::Insert => Some(ChangeKind::Insert),
        pb::ChangeKind::Update => Some(ChangeKind::Update),
        pb::ChangeKind::Delete => Some(ChangeKind::Delete),
        pb::ChangeKind::Unspecified => None,
    }
}

impl From<ChangeEvent> for pb::ChangeEvent {
    fn from(event: ChangeEvent) -> Self {
        let kind = match event.kind {
            ChangeKind::Insert => pb::ChangeKind::Insert,
            ChangeKind::Update => pb::ChangeKind::Update,
            ChangeKind::Delete => pb::ChangeKind::Delete,
        };
        pb::ChangeEvent {
            table: pb::Table::from(event.table) as i32,
            kind: kind as i32,
            row_id: event.row_id,
            board_id: event.board_id,
            user_id: event.user_id,
        }
    }
}

impl TryFrom<pb::ChangeEvent> for ChangeEvent {
    type Error = KanbanError;

    fn try_from(event: pb::ChangeEvent) -> Result<Self> {
        let table = table_from_i32(event.table)
            .ok_or_else(|| KanbanError::invalid_argument(format!("unknown table {}", event.table)))?;
        let kind = kind_from_i32(event.kind)
            .ok_or_else(|| KanbanError::invalid_argument(format!("unknown change kind {}", event.kind)))?;
        Ok(ChangeEvent {
            table,
            kind,
            row_id: event.row_id,
            board_id: event.board_id,
            user_id: event.user_id,
        })
    }
}

/// Subscription filter for `user_id`. Unknown table values are ignored.
pub fn change_filter(request: &pb::SubscribeRequest, user_id: &str) -> ChangeFilter {
    ChangeFilter {
        tables: request.tables.iter().copied().filter_map(table_from_i32).collect(),
        user_id: Some(user_id.to_string()),
        board_id: request.board_id.clone(),
    }
}

pub fn subscribe_request(filter: &ChangeFilter) -> pb::SubscribeRequest {
    pb::SubscribeRequest {
        tables: filter
            .tables
            .iter()
            .map(|table| pb::Table::from(*table) as i32)
            .collect(),
        board_id: filter.board_id.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::fixtures::snapshot;

    #[test]
    fn test_snapshot_survives_the_wire() {
        let board = snapshot(&[("A", &["t1", "t2"]), ("B", &[])]);
        let message = pb::BoardWithColumns::from(board.clone());
        assert_eq!(BoardSnapshot::try_from(message).unwrap(), board);
    }

    #[test]
    fn test_missing_board_rejected() {
        let message = pb::BoardWithColumns {
            board: None,
            columns: Vec::new(),
        };
        assert!(BoardSnapshot::try_from(message).is_err());
    }

    #[test]
    fn test_unknown_change_kind_rejected() {
        let event = pb::ChangeEvent {
            table: pb::Table::Tasks as i32,
            kind: 42,
            row_id: "t1".into(),
            board_id: None,
            user_id: None,
        };
        assert!(ChangeEvent::try_from(event).is_err());
    }

    #[test]
    fn test_filter_from_request() {
        let request = pb::SubscribeRequest {
            tables: vec![pb::Table::Columns as i32, 99],
            board_id: Some("b1".into()),
        };
        let filter = change_filter(&request, "u1");
        assert_eq!(filter.tables, vec![Table::Columns]);
        assert_eq!(filter.user_id.as_deref(), Some("u1"));
        assert_eq!(filter.board_id.as_deref(), Some("b1"));
    }

    #[test]
    fn test_request_from_filter() {
        let request = subscribe_request(&ChangeFilter::for_board("u1", "b1"));
        assert_eq!(request.tables.len(), 3);
        assert_eq!(change_filter(&request, "u1"), ChangeFilter::for_board("u1", "b1"));
    }
}

//! Snapshot builders for tests.

use chrono::{DateTime, TimeZone, Utc};

use super::model::{Board, BoardSnapshot, Column, ColumnWithTasks, Task};

pub const BOARD_ID: &str = "board";
pub const USER_ID: &str = "user";

fn created(second: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::seconds(second as i64)
}

/// Build a settled snapshot where ids double as titles, e.g.
/// `snapshot(&[("A", &["t1", "t2"]), ("B", &[])])`.
pub fn snapshot(columns: &[(&str, &[&str])]) -> BoardSnapshot {
    let board = Board {
        id: BOARD_ID.to_string(),
        user_id: USER_ID.to_string(),
        title: "Board".to_string(),
        created_at: created(0),
    };
    let mut tick = 0;
    let columns = columns
        .iter()
        .enumerate()
        .map(|(column_index, (column_id, task_ids))| {
            tick += 1;
            let column = Column {
                id: column_id.to_string(),
                board_id: BOARD_ID.to_string(),
                title: column_id.to_string(),
                position: column_index as i32,
                created_at: created(tick),
            };
            let tasks = task_ids
                .iter()
                .enumerate()
                .map(|(task_index, task_id)| {
                    tick += 1;
                    Task {
                        id: task_id.to_string(),
                        column_id: column_id.to_string(),
                        title: task_id.to_string(),
                        description: None,
                        position: task_index as i32,
                        created_at: created(tick),
                    }
                })
                .collect();
            ColumnWithTasks { column, tasks }
        })
        .collect();

    BoardSnapshot { board, columns }
}

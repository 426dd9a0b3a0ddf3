//! Board, column and task types as held in memory.

use chrono::{DateTime, Utc};

use super::position::{sort_by_position, Positioned};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub id: String,
    pub board_id: String,
    pub title: String,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub column_id: String,
    pub title: String,
    pub description: Option<String>,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

impl Positioned for Column {
    fn position(&self) -> i32 {
        self.position
    }

    fn set_position(&mut self, position: i32) {
        self.position = position;
    }

    fn tie_break(&self) -> (DateTime<Utc>, &str) {
        (self.created_at, &self.id)
    }
}

impl Positioned for Task {
    fn position(&self) -> i32 {
        self.position
    }

    fn set_position(&mut self, position: i32) {
        self.position = position;
    }

    fn tie_break(&self) -> (DateTime<Utc>, &str) {
        (self.created_at, &self.id)
    }
}

/// A column together with its tasks in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnWithTasks {
    pub column: Column,
    pub tasks: Vec<Task>,
}

impl Positioned for ColumnWithTasks {
    fn position(&self) -> i32 {
        self.column.position
    }

    fn set_position(&mut self, position: i32) {
        self.column.position = position;
    }

    fn tie_break(&self) -> (DateTime<Utc>, &str) {
        self.column.tie_break()
    }
}

/// A whole board as rendered: columns in display order, each with its
/// tasks in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardSnapshot {
    pub board: Board,
    pub columns: Vec<ColumnWithTasks>,
}

impl BoardSnapshot {
    /// Assemble a snapshot from flat rows. Rows whose parent is not part of
    /// the board are dropped.
    pub fn from_rows(board: Board, columns: Vec<Column>, tasks: Vec<Task>) -> Self {
        let mut columns: Vec<ColumnWithTasks> = columns
            .into_iter()
            .filter(|column| column.board_id == board.id)
            .map(|column| ColumnWithTasks {
                column,
                tasks: Vec::new(),
            })
            .collect();
        sort_by_position(&mut columns);

        for task in tasks {
            if let Some(entry) = columns
                .iter_mut()
                .find(|entry| entry.column.id == task.column_id)
            {
                entry.tasks.push(task);
            }
        }
        for entry in columns.iter_mut() {
            sort_by_position(&mut entry.tasks);
        }

        BoardSnapshot { board, columns }
    }

    pub fn column_index(&self, column_id: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|entry| entry.column.id == column_id)
    }

    pub fn column(&self, column_id: &str) -> Option<&ColumnWithTasks> {
        self.columns.iter().find(|entry| entry.column.id == column_id)
    }

    /// Column index and task index of a task.
    pub fn locate_task(&self, task_id: &str) -> Option<(usize, usize)> {
        self.columns.iter().enumerate().find_map(|(column_index, entry)| {
            entry
                .tasks
                .iter()
                .position(|task| task.id == task_id)
                .map(|task_index| (column_index, task_index))
        })
    }

    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.locate_task(task_id)
            .map(|(column_index, task_index)| &self.columns[column_index].tasks[task_index])
    }

    pub fn column_ids(&self) -> Vec<&str> {
        self.columns.iter().map(|entry| entry.column.id.as_str()).collect()
    }

    pub fn task_ids(&self, column_id: &str) -> Vec<&str> {
        self.column(column_id)
            .map(|entry| entry.tasks.iter().map(|task| task.id.as_str()).collect())
            .unwrap_or_default()
    }
}

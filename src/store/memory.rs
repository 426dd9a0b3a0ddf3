//! In-memory store with the same cascade and renumbering rules as the
//! Postgres store. Used by tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tonic::Status;
use uuid::Uuid;

use super::{
    normalize_description, BoardGateway, BoardStore, ColumnChanges, RowOwner, RowRef, TaskChanges,
};
use crate::board::position::{renumber, sort_by_position};
use crate::board::{Board, BoardSnapshot, Column, PositionPlan, Task};
use crate::error::{KanbanError, Result};

#[derive(Default)]
struct Tables {
    boards: Vec<Board>,
    columns: Vec<Column>,
    tasks: Vec<Task>,
    tick: i64,
}

impl Tables {
    fn now(&mut self) -> DateTime<Utc> {
        self.tick += 1;
        Utc::now() + Duration::microseconds(self.tick)
    }

    fn board(&self, board_id: &str) -> Option<&Board> {
        self.boards.iter().find(|board| board.id == board_id)
    }

    fn column(&self, column_id: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.id == column_id)
    }

    fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == task_id)
    }

    fn column_count(&self, board_id: &str) -> i32 {
        self.columns.iter().filter(|column| column.board_id == board_id).count() as i32
    }

    fn task_count(&self, column_id: &str) -> i32 {
        self.tasks.iter().filter(|task| task.column_id == column_id).count() as i32
    }

    fn renumber_columns(&mut self, board_id: &str) {
        let mut siblings: Vec<Column> = self
            .columns
            .iter()
            .filter(|column| column.board_id == board_id)
            .cloned()
            .collect();
        sort_by_position(&mut siblings);
        renumber(&mut siblings);
        for sibling in siblings {
            if let Some(column) = self.columns.iter_mut().find(|column| column.id == sibling.id) {
                column.position = sibling.position;
            }
        }
    }

    fn renumber_tasks(&mut self, column_id: &str) {
        let mut siblings: Vec<Task> = self
            .tasks
            .iter()
            .filter(|task| task.column_id == column_id)
            .cloned()
            .collect();
        sort_by_position(&mut siblings);
        renumber(&mut siblings);
        for sibling in siblings {
            if let Some(task) = self.tasks.iter_mut().find(|task| task.id == sibling.id) {
                task.position = sibling.position;
            }
        }
    }

    fn snapshot(&self, board_id: &str) -> Option<BoardSnapshot> {
        let board = self.board(board_id)?.clone();
        let columns: Vec<Column> = self
            .columns
            .iter()
            .filter(|column| column.board_id == board_id)
            .cloned()
            .collect();
        let tasks: Vec<Task> = self
            .tasks
            .iter()
            .filter(|task| columns.iter().any(|column| column.id == task.column_id))
            .cloned()
            .collect();
        Some(BoardSnapshot::from_rows(board, columns, tasks))
    }
}

/// Store holding every row in memory. Reads and writes can be made to fail
/// to exercise error paths.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fetches: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of `fetch_board` calls served so far.
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn check_reads(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Status::unavailable("store unavailable").into());
        }
        Ok(())
    }

    fn check_writes(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Status::unavailable("store unavailable").into());
        }
        Ok(())
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[tonic::async_trait]
impl BoardGateway for MemoryStore {
    async fn fetch_board(&self, board_id: &str) -> Result<Option<BoardSnapshot>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.check_reads()?;
        Ok(self.tables.lock().await.snapshot(board_id))
    }

    async fn apply_positions(&self, plan: &PositionPlan) -> Result<usize> {
        self.check_writes()?;
        let mut tables = self.tables.lock().await;
        if tables.board(&plan.board_id).is_none() {
            return Err(KanbanError::not_found("board", &plan.board_id));
        }
        let on_board = |tables: &Tables, column_id: &str| {
            tables
                .column(column_id)
                .map_or(false, |column| column.board_id == plan.board_id)
        };

        for row in &plan.columns {
            if !on_board(&*tables, &row.column_id) {
                return Err(KanbanError::invalid_argument(format!(
                    "column {} is not on board {}",
                    row.column_id, plan.board_id
                )));
            }
        }
        for row in &plan.tasks {
            let task = tables
                .task(&row.task_id)
                .ok_or_else(|| KanbanError::not_found("task", &row.task_id))?;
            if !on_board(&*tables, &task.column_id) || !on_board(&*tables, &row.column_id) {
                return Err(KanbanError::invalid_argument(format!(
                    "task {} cannot move outside board {}",
                    row.task_id, plan.board_id
                )));
            }
        }

        let mut touched: Vec<String> = Vec::new();
        for row in &plan.tasks {
            if let Some(task) = tables.task(&row.task_id) {
                touched.push(task.column_id.clone());
            }
            touched.push(row.column_id.clone());
        }
        touched.sort();
        touched.dedup();

        for row in &plan.columns {
            if let Some(column) = tables.columns.iter_mut().find(|column| column.id == row.column_id) {
                column.position = row.position;
            }
        }
        for row in &plan.tasks {
            if let Some(task) = tables.tasks.iter_mut().find(|task| task.id == row.task_id) {
                task.column_id = row.column_id.clone();
                task.position = row.position;
            }
        }

        // The plan may predate rows written by other sessions.
        if !plan.columns.is_empty() {
            tables.renumber_columns(&plan.board_id);
        }
        for column_id in &touched {
            tables.renumber_tasks(column_id);
        }
        Ok(plan.len())
    }
}

#[tonic::async_trait]
impl BoardStore for MemoryStore {
    async fn ping(&self) -> Result<()> {
        self.check_reads()
    }

    async fn list_boards(&self, user_id: &str) -> Result<Vec<Board>> {
        self.check_reads()?;
        let tables = self.tables.lock().await;
        let mut boards: Vec<Board> = tables
            .boards
            .iter()
            .filter(|board| board.user_id == user_id)
            .cloned()
            .collect();
        boards.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(boards)
    }

    async fn create_board(&self, user_id: &str, title: &str) -> Result<Board> {
        self.check_writes()?;
        let mut tables = self.tables.lock().await;
        let board = Board {
            id: new_id(),
            user_id: user_id.to_string(),
            title: title.to_string(),
            created_at: tables.now(),
        };
        tables.boards.push(board.clone());
        Ok(board)
    }

    async fn rename_board(&self, board_id: &str, title: &str) -> Result<Board> {
        self.check_writes()?;
        let mut tables = self.tables.lock().await;
        let board = tables
            .boards
            .iter_mut()
            .find(|board| board.id == board_id)
            .ok_or_else(|| KanbanError::not_found("board", board_id))?;
        board.title = title.to_string();
        Ok(board.clone())
    }

    async fn delete_board(&self, board_id: &str) -> Result<Board> {
        self.check_writes()?;
        let mut tables = self.tables.lock().await;
        let board = tables
            .board(board_id)
            .cloned()
            .ok_or_else(|| KanbanError::not_found("board", board_id))?;

        let column_ids: Vec<String> = tables
            .columns
            .iter()
            .filter(|column| column.board_id == board_id)
            .map(|column| column.id.clone())
            .collect();
        tables.tasks.retain(|task| !column_ids.contains(&task.column_id));
        tables.columns.retain(|column| column.board_id != board_id);
        tables.boards.retain(|board| board.id != board_id);
        Ok(board)
    }

    async fn create_column(&self, board_id: &str, title: &str) -> Result<Column> {
        self.check_writes()?;
        let mut tables = self.tables.lock().await;
        if tables.board(board_id).is_none() {
            return Err(KanbanError::not_found("board", board_id));
        }
        let column = Column {
            id: new_id(),
            board_id: board_id.to_string(),
            title: title.to_string(),
            position: tables.column_count(board_id),
            created_at: tables.now(),
        };
        tables.columns.push(column.clone());
        Ok(column)
    }

    async fn update_column(&self, column_id: &str, changes: ColumnChanges) -> Result<Column> {
        self.check_writes()?;
        let mut tables = self.tables.lock().await;
        let column = tables
            .columns
            .iter_mut()
            .find(|column| column.id == column_id)
            .ok_or_else(|| KanbanError::not_found("column", column_id))?;
        if let Some(title) = changes.title {
            column.title = title;
        }
        Ok(column.clone())
    }

    async fn delete_column(&self, column_id: &str) -> Result<Column> {
        self.check_writes()?;
        let mut tables = self.tables.lock().await;
        let column = tables
            .column(column_id)
            .cloned()
            .ok_or_else(|| KanbanError::not_found("column", column_id))?;
        tables.tasks.retain(|task| task.column_id != column_id);
        tables.columns.retain(|column| column.id != column_id);
        tables.renumber_columns(&column.board_id);
        Ok(column)
    }

    async fn create_task(
        &self,
        column_id: &str,
        title: &str,
        description: Option<String>,
    ) -> Result<Task> {
        self.check_writes()?;
        let mut tables = self.tables.lock().await;
        if tables.column(column_id).is_none() {
            return Err(KanbanError::not_found("column", column_id));
        }
        let task = Task {
            id: new_id(),
            column_id: column_id.to_string(),
            title: title.to_string(),
            description: normalize_description(description),
            position: tables.task_count(column_id),
            created_at: tables.now(),
        };
        tables.tasks.push(task.clone());
        Ok(task)
    }

    async fn update_task(&self, task_id: &str, changes: TaskChanges) -> Result<Task> {
        self.check_writes()?;
        let mut tables = self.tables.lock().await;
        let current = tables
            .task(task_id)
            .cloned()
            .ok_or_else(|| KanbanError::not_found("task", task_id))?;

        let destination = match changes.column_id {
            Some(dest) if dest != current.column_id => {
                let source_board = tables.column(&current.column_id).map(|c| c.board_id.clone());
                let target = tables
                    .column(&dest)
                    .ok_or_else(|| KanbanError::not_found("column", &dest))?;
                if source_board.as_deref() != Some(target.board_id.as_str()) {
                    return Err(KanbanError::invalid_argument(format!(
                        "column {} is on another board",
                        dest
                    )));
                }
                let position = tables.task_count(&dest);
                Some((dest, position))
            }
            _ => None,
        };

        let task = tables
            .tasks
            .iter_mut()
            .find(|task| task.id == task_id)
            .ok_or_else(|| KanbanError::not_found("task", task_id))?;
        if let Some(title) = changes.title {
            task.title = title;
        }
        if let Some(description) = changes.description {
            task.description = normalize_description(description);
        }
        if let Some((dest, position)) = destination.clone() {
            task.column_id = dest;
            task.position = position;
        }
        let updated = task.clone();

        if destination.is_some() {
            tables.renumber_tasks(&current.column_id);
        }
        Ok(updated)
    }

    async fn delete_task(&self, task_id: &str) -> Result<Task> {
        self.check_writes()?;
        let mut tables = self.tables.lock().await;
        let task = tables
            .task(task_id)
            .cloned()
            .ok_or_else(|| KanbanError::not_found("task", task_id))?;
        tables.tasks.retain(|task| task.id != task_id);
        tables.renumber_tasks(&task.column_id);
        Ok(task)
    }

    async fn locate(&self, row: RowRef) -> Result<Option<RowOwner>> {
        self.check_reads()?;
        let tables = self.tables.lock().await;
        let board_id = match &row {
            RowRef::Board(id) => tables.board(id).map(|board| board.id.clone()),
            RowRef::Column(id) => tables.column(id).map(|column| column.board_id.clone()),
            RowRef::Task(id) => tables
                .task(id)
                .and_then(|task| tables.column(&task.column_id))
                .map(|column| column.board_id.clone()),
        };
        Ok(board_id.and_then(|board_id| {
            tables.board(&board_id).map(|board| RowOwner {
                board_id: board.id.clone(),
                user_id: board.user_id.clone(),
            })
        }))
    }
}

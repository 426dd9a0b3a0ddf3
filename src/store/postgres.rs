use std::collections::{BTreeSet, HashSet};

use diesel::{result::Error as DieselError, Connection, PgConnection, QueryResult, RunQueryDsl};
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    normalize_description, BoardGateway, BoardStore, ColumnChanges, RowOwner, RowRef, TaskChanges,
};
use crate::board::{Board, BoardSnapshot, Column, PositionPlan, Task};
use crate::db::{
    connection::PgPool,
    repos::{
        board::{BoardRow, NewBoard},
        column::{ColumnChangeSet, ColumnRow, NewColumn},
        task::{NewTask, TaskChangeSet, TaskRow},
    },
};
use crate::error::{KanbanError, Result};

/// Store backed by Postgres through a diesel connection pool. Queries run
/// on the blocking thread pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }

    async fn run<T, F>(&self, operation: F) -> Result<T>
    where
        F: FnOnce(&PgConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let db_connection = pool.get()?;
            operation(&*db_connection)
        })
        .await?
    }
}

fn found<T>(result: QueryResult<T>, resource: &'static str, id: &str) -> Result<T> {
    match result {
        Err(DieselError::NotFound) => Err(KanbanError::not_found(resource, id)),
        other => Ok(other?),
    }
}

fn require<T>(row: Option<T>, resource: &'static str, id: &str) -> Result<T> {
    row.ok_or_else(|| KanbanError::not_found(resource, id))
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[tonic::async_trait]
impl BoardGateway for PgStore {
    async fn fetch_board(&self, board_id: &str) -> Result<Option<BoardSnapshot>> {
        let board_id = board_id.to_string();
        self.run(move |conn| {
            conn.build_transaction()
                .read_only()
                .repeatable_read()
                .run::<_, KanbanError, _>(|| {
                    let board = match BoardRow::find(conn, &board_id)? {
                        Some(board) => board,
                        None => return Ok(None),
                    };
                    let columns = ColumnRow::for_board(conn, &board_id)?;
                    let column_ids = columns.iter().map(|column| column.id.clone()).collect();
                    let tasks = TaskRow::for_columns(conn, column_ids)?;

                    Ok(Some(BoardSnapshot::from_rows(
                        board.into(),
                        columns.into_iter().map(Column::from).collect(),
                        tasks.into_iter().map(Task::from).collect(),
                    )))
                })
        })
        .await
    }

    async fn apply_positions(&self, plan: &PositionPlan) -> Result<usize> {
        let plan = plan.clone();
        self.run(move |conn| {
            conn.transaction::<_, KanbanError, _>(|| {
                require(BoardRow::find(conn, &plan.board_id)?, "board", &plan.board_id)?;
                let board_columns: HashSet<String> = ColumnRow::for_board(conn, &plan.board_id)?
                    .into_iter()
                    .map(|column| column.id)
                    .collect();

                for row in &plan.columns {
                    if !board_columns.contains(&row.column_id) {
                        return Err(KanbanError::invalid_argument(format!(
                            "column {} is not on board {}",
                            row.column_id, plan.board_id
                        )));
                    }
                }
                let mut touched: BTreeSet<String> = BTreeSet::new();
                for row in &plan.tasks {
                    let task = require(TaskRow::find(conn, &row.task_id)?, "task", &row.task_id)?;
                    if !board_columns.contains(&row.column_id)
                        || !board_columns.contains(&task.column_id)
                    {
                        return Err(KanbanError::invalid_argument(format!(
                            "task {} cannot move outside board {}",
                            row.task_id, plan.board_id
                        )));
                    }
                    touched.insert(task.column_id);
                    touched.insert(row.column_id.clone());
                }

                let mut written = 0;
                for row in &plan.columns {
                    written += ColumnRow::set_position(conn, &row.column_id, row.position)?;
                }
                for row in &plan.tasks {
                    written += TaskRow::place(conn, &row.task_id, &row.column_id, row.position)?;
                }

                // The plan may predate rows written by other sessions.
                if !plan.columns.is_empty() {
                    ColumnRow::renumber_board(conn, &plan.board_id)?;
                }
                for column_id in &touched {
                    TaskRow::renumber_column(conn, column_id)?;
                }

                debug!(board = %plan.board_id, written, "applied position plan");
                Ok(written)
            })
        })
        .await
    }
}

#[tonic::async_trait]
impl BoardStore for PgStore {
    async fn ping(&self) -> Result<()> {
        self.run(|conn| {
            diesel::sql_query("SELECT 1").execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn list_boards(&self, user_id: &str) -> Result<Vec<Board>> {
        let user_id = user_id.to_string();
        self.run(move |conn| {
            let rows = BoardRow::list_for_user(conn, &user_id)?;
            Ok(rows.into_iter().map(Board::from).collect())
        })
        .await
    }

    async fn create_board(&self, user_id: &str, title: &str) -> Result<Board> {
        let (user_id, title) = (user_id.to_string(), title.to_string());
        self.run(move |conn| {
            let id = new_id();
            let row = BoardRow::create(
                conn,
                NewBoard {
                    id: &id,
                    user_id: &user_id,
                    title: &title,
                },
            )?;
            info!(board = %row.id, "created board");
            Ok(row.into())
        })
        .await
    }

    async fn rename_board(&self, board_id: &str, title: &str) -> Result<Board> {
        let (board_id, title) = (board_id.to_string(), title.to_string());
        self.run(move |conn| {
            let row = found(BoardRow::rename(conn, &board_id, &title), "board", &board_id)?;
            Ok(row.into())
        })
        .await
    }

    async fn delete_board(&self, board_id: &str) -> Result<Board> {
        let board_id = board_id.to_string();
        self.run(move |conn| {
            let row = found(BoardRow::delete(conn, &board_id), "board", &board_id)?;
            info!(board = %row.id, "deleted board");
            Ok(row.into())
        })
        .await
    }

    async fn create_column(&self, board_id: &str, title: &str) -> Result<Column> {
        let (board_id, title) = (board_id.to_string(), title.to_string());
        self.run(move |conn| {
            conn.transaction::<_, KanbanError, _>(|| {
                require(BoardRow::find(conn, &board_id)?, "board", &board_id)?;
                let position = ColumnRow::count_for_board(conn, &board_id)? as i32;
                let id = new_id();
                let row = ColumnRow::create(
                    conn,
                    NewColumn {
                        id: &id,
                        board_id: &board_id,
                        title: &title,
                        position,
                    },
                )?;
                Ok(row.into())
            })
        })
        .await
    }

    async fn update_column(&self, column_id: &str, changes: ColumnChanges) -> Result<Column> {
        let column_id = column_id.to_string();
        self.run(move |conn| {
            let row = match changes.title {
                Some(title) => found(
                    ColumnRow::update(conn, &column_id, ColumnChangeSet { title: Some(title) }),
                    "column",
                    &column_id,
                )?,
                None => require(ColumnRow::find(conn, &column_id)?, "column", &column_id)?,
            };
            Ok(row.into())
        })
        .await
    }

    async fn delete_column(&self, column_id: &str) -> Result<Column> {
        let column_id = column_id.to_string();
        self.run(move |conn| {
            conn.transaction::<_, KanbanError, _>(|| {
                let row = found(ColumnRow::delete(conn, &column_id), "column", &column_id)?;
                ColumnRow::renumber_board(conn, &row.board_id)?;
                Ok(row.into())
            })
        })
        .await
    }

    async fn create_task(
        &self,
        column_id: &str,
        title: &str,
        description: Option<String>,
    ) -> Result<Task> {
        let (column_id, title) = (column_id.to_string(), title.to_string());
        let description = normalize_description(description);
        self.run(move |conn| {
            conn.transaction::<_, KanbanError, _>(|| {
                require(ColumnRow::find(conn, &column_id)?, "column", &column_id)?;
                let position = TaskRow::count_for_column(conn, &column_id)? as i32;
                let id = new_id();
                let row = TaskRow::create(
                    conn,
                    NewTask {
                        id: &id,
                        column_id: &column_id,
                        title: &title,
                        description: description.as_deref(),
                        position,
                    },
                )?;
                Ok(row.into())
            })
        })
        .await
    }

    async fn update_task(&self, task_id: &str, changes: TaskChanges) -> Result<Task> {
        let task_id = task_id.to_string();
        self.run(move |conn| {
            conn.transaction::<_, KanbanError, _>(|| {
                let current = require(TaskRow::find(conn, &task_id)?, "task", &task_id)?;
                let mut change_set = TaskChangeSet {
                    title: changes.title,
                    description: changes.description.map(normalize_description),
                    column_id: None,
                    position: None,
                };

                let source_column = current.column_id.clone();
                let moving = match changes.column_id {
                    Some(dest) if dest != source_column => {
                        let source = require(ColumnRow::find(conn, &source_column)?, "column", &source_column)?;
                        let target = require(ColumnRow::find(conn, &dest)?, "column", &dest)?;
                        if source.board_id != target.board_id {
                            return Err(KanbanError::invalid_argument(format!(
                                "column {} is on another board",
                                dest
                            )));
                        }
                        change_set.position = Some(TaskRow::count_for_column(conn, &dest)? as i32);
                        change_set.column_id = Some(dest);
                        true
                    }
                    _ => false,
                };

                if change_set.is_empty() {
                    return Ok(current.into());
                }
                let row = found(TaskRow::update(conn, &task_id, change_set), "task", &task_id)?;
                if moving {
                    TaskRow::renumber_column(conn, &source_column)?;
                }
                Ok(row.into())
            })
        })
        .await
    }

    async fn delete_task(&self, task_id: &str) -> Result<Task> {
        let task_id = task_id.to_string();
        self.run(move |conn| {
            conn.transaction::<_, KanbanError, _>(|| {
                let row = found(TaskRow::delete(conn, &task_id), "task", &task_id)?;
                TaskRow::renumber_column(conn, &row.column_id)?;
                Ok(row.into())
            })
        })
        .await
    }

    async fn locate(&self, row: RowRef) -> Result<Option<RowOwner>> {
        self.run(move |conn| {
            let owner = match &row {
                RowRef::Board(id) => BoardRow::owner(conn, id)?,
                RowRef::Column(id) => ColumnRow::owner(conn, id)?,
                RowRef::Task(id) => TaskRow::owner(conn, id)?,
            };
            Ok(owner.map(|(board_id, user_id)| RowOwner { board_id, user_id }))
        })
        .await
    }
}

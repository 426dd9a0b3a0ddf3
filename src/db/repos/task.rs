use chrono::{DateTime, Utc};
use diesel::{
    delete, insert_into, update, ExpressionMethods, OptionalExtension, PgConnection, QueryDsl,
    QueryResult, RunQueryDsl,
};

use crate::board::Task;
use crate::db::schema::{board_columns, boards, tasks};

#[derive(Queryable)]
pub struct TaskRow {
    pub id: String,
    pub column_id: String,
    pub title: String,
    pub description: Option<String>,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[table_name = "tasks"]
pub struct NewTask<'a> {
    pub id: &'a str,
    pub column_id: &'a str,
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub position: i32,
}

#[derive(AsChangeset)]
#[table_name = "tasks"]
pub struct TaskChangeSet {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub column_id: Option<String>,
    pub position: Option<i32>,
}

impl TaskChangeSet {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.column_id.is_none()
            && self.position.is_none()
    }
}

impl TaskRow {
    pub fn find(conn: &PgConnection, task_id: &str) -> QueryResult<Option<TaskRow>> {
        tasks::table.find(task_id).first(conn).optional()
    }

    /// Tasks of the given columns in display order.
    pub fn for_columns(conn: &PgConnection, column_ids: Vec<String>) -> QueryResult<Vec<TaskRow>> {
        if column_ids.is_empty() {
            return Ok(Vec::new());
        }
        tasks::table
            .filter(tasks::column_id.eq_any(column_ids))
            .order((
                tasks::position.asc(),
                tasks::created_at.asc(),
                tasks::id.asc(),
            ))
            .load(conn)
    }

    pub fn for_column(conn: &PgConnection, column_id: &str) -> QueryResult<Vec<TaskRow>> {
        Self::for_columns(conn, vec![column_id.to_string()])
    }

    pub fn count_for_column(conn: &PgConnection, column_id: &str) -> QueryResult<i64> {
        tasks::table
            .filter(tasks::column_id.eq(column_id))
            .count()
            .get_result(conn)
    }

    pub fn create(conn: &PgConnection, new_task: NewTask) -> QueryResult<TaskRow> {
        insert_into(tasks::table)
            .values(&new_task)
            .get_result(conn)
    }

    pub fn update(
        conn: &PgConnection,
        task_id: &str,
        change_set: TaskChangeSet,
    ) -> QueryResult<TaskRow> {
        update(tasks::table.find(task_id))
            .set(change_set)
            .get_result(conn)
    }

    pub fn place(
        conn: &PgConnection,
        task_id: &str,
        column_id: &str,
        position: i32,
    ) -> QueryResult<usize> {
        update(tasks::table.find(task_id))
            .set((tasks::column_id.eq(column_id), tasks::position.eq(position)))
            .execute(conn)
    }

    pub fn delete(conn: &PgConnection, task_id: &str) -> QueryResult<TaskRow> {
        delete(tasks::table.find(task_id)).get_result(conn)
    }

    /// Rewrite the positions of a column's tasks to `0..n-1`.
    pub fn renumber_column(conn: &PgConnection, column_id: &str) -> QueryResult<()> {
        for (index, task) in Self::for_column(conn, column_id)?.iter().enumerate() {
            if task.position != index as i32 {
                Self::place(conn, &task.id, column_id, index as i32)?;
            }
        }
        Ok(())
    }

    /// `(board_id, user_id)` of the board holding the task.
    pub fn owner(conn: &PgConnection, task_id: &str) -> QueryResult<Option<(String, String)>> {
        tasks::table
            .inner_join(board_columns::table.inner_join(boards::table))
            .filter(tasks::id.eq(task_id))
            .select((boards::id, boards::user_id))
            .first(conn)
            .optional()
    }
}

impl From<TaskRow> for Task {
    fn from(row: TaskRow) -> Self {
        Task {
            id: row.id,
            column_id: row.column_id,
            title: row.title,
            description: row.description,
            position: row.position,
            created_at: row.created_at,
        }
    }
}

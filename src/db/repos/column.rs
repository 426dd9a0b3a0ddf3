use chrono::{DateTime, Utc};
use diesel::{
    delete, insert_into, update, ExpressionMethods, OptionalExtension, PgConnection, QueryDsl,
    QueryResult, RunQueryDsl,
};

use crate::board::Column;
use crate::db::schema::{board_columns, boards};

#[derive(Queryable)]
pub struct ColumnRow {
    pub id: String,
    pub board_id: String,
    pub title: String,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[table_name = "board_columns"]
pub struct NewColumn<'a> {
    pub id: &'a str,
    pub board_id: &'a str,
    pub title: &'a str,
    pub position: i32,
}

#[derive(AsChangeset)]
#[table_name = "board_columns"]
pub struct ColumnChangeSet {
    pub title: Option<String>,
}

impl ColumnRow {
    pub fn find(conn: &PgConnection, column_id: &str) -> QueryResult<Option<ColumnRow>> {
        board_columns::table.find(column_id).first(conn).optional()
    }

    /// Columns of a board in display order.
    pub fn for_board(conn: &PgConnection, board_id: &str) -> QueryResult<Vec<ColumnRow>> {
        board_columns::table
            .filter(board_columns::board_id.eq(board_id))
            .order((
                board_columns::position.asc(),
                board_columns::created_at.asc(),
                board_columns::id.asc(),
            ))
            .load(conn)
    }

    pub fn count_for_board(conn: &PgConnection, board_id: &str) -> QueryResult<i64> {
        board_columns::table
            .filter(board_columns::board_id.eq(board_id))
            .count()
            .get_result(conn)
    }

    pub fn create(conn: &PgConnection, new_column: NewColumn) -> QueryResult<ColumnRow> {
        insert_into(board_columns::table)
            .values(&new_column)
            .get_result(conn)
    }

    pub fn update(
        conn: &PgConnection,
        column_id: &str,
        change_set: ColumnChangeSet,
    ) -> QueryResult<ColumnRow> {
        update(board_columns::table.find(column_id))
            .set(change_set)
            .get_result(conn)
    }

    pub fn set_position(conn: &PgConnection, column_id: &str, position: i32) -> QueryResult<usize> {
        update(board_columns::table.find(column_id))
            .set(board_columns::position.eq(position))
            .execute(conn)
    }

    pub fn delete(conn: &PgConnection, column_id: &str) -> QueryResult<ColumnRow> {
        delete(board_columns::table.find(column_id)).get_result(conn)
    }

    /// Rewrite the positions of a board's columns to `0..n-1`.
    pub fn renumber_board(conn: &PgConnection, board_id: &str) -> QueryResult<()> {
        for (index, column) in Self::for_board(conn, board_id)?.iter().enumerate() {
            if column.position != index as i32 {
                Self::set_position(conn, &column.id, index as i32)?;
            }
        }
        Ok(())
    }

    /// `(board_id, user_id)` of the board holding the column.
    pub fn owner(conn: &PgConnection, column_id: &str) -> QueryResult<Option<(String, String)>> {
        board_columns::table
            .inner_join(boards::table)
            .filter(board_columns::id.eq(column_id))
            .select((boards::id, boards::user_id))
            .first(conn)
            .optional()
    }
}

impl From<ColumnRow> for Column {
    fn from(row: ColumnRow) -> Self {
        Column {
            id: row.id,
            board_id: row.board_id,
            title: row.title,
            position: row.position,
            created_at: row.created_at,
        }
    }
}

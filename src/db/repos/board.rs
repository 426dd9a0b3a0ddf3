use chrono::{DateTime, Utc};
use diesel::{
    delete, insert_into, update, ExpressionMethods, OptionalExtension, PgConnection, QueryDsl,
    QueryResult, RunQueryDsl,
};

use crate::board::Board;
use crate::db::schema::boards;

#[derive(Queryable)]
pub struct BoardRow {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[table_name = "boards"]
pub struct NewBoard<'a> {
    pub id: &'a str,
    pub user_id: &'a str,
    pub title: &'a str,
}

impl BoardRow {
    pub fn find(conn: &PgConnection, board_id: &str) -> QueryResult<Option<BoardRow>> {
        boards::table.find(board_id).first(conn).optional()
    }

    /// Boards owned by `user_id`, newest first.
    pub fn list_for_user(conn: &PgConnection, user_id: &str) -> QueryResult<Vec<BoardRow>> {
        boards::table
            .filter(boards::user_id.eq(user_id))
            .order(boards::created_at.desc())
            .load(conn)
    }

    pub fn create(conn: &PgConnection, new_board: NewBoard) -> QueryResult<BoardRow> {
        insert_into(boards::table)
            .values(&new_board)
            .get_result(conn)
    }

    pub fn rename(conn: &PgConnection, board_id: &str, title: &str) -> QueryResult<BoardRow> {
        update(boards::table.find(board_id))
            .set(boards::title.eq(title))
            .get_result(conn)
    }

    /// Columns and tasks go with the board through `ON DELETE CASCADE`.
    pub fn delete(conn: &PgConnection, board_id: &str) -> QueryResult<BoardRow> {
        delete(boards::table.find(board_id)).get_result(conn)
    }

    pub fn owner(conn: &PgConnection, board_id: &str) -> QueryResult<Option<(String, String)>> {
        boards::table
            .find(board_id)
            .select((boards::id, boards::user_id))
            .first(conn)
            .optional()
    }
}

impl From<BoardRow> for Board {
    fn from(row: BoardRow) -> Self {
        Board {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            created_at: row.created_at,
        }
    }
}

table! {
    boards (id) {
        id -> Bpchar,
        user_id -> Varchar,
        title -> Varchar,
        created_at -> Timestamptz,
    }
}

table! {
    board_columns (id) {
        id -> Bpchar,
        board_id -> Bpchar,
        title -> Varchar,
        position -> Int4,
        created_at -> Timestamptz,
    }
}

table! {
    tasks (id) {
        id -> Bpchar,
        column_id -> Bpchar,
        title -> Varchar,
        description -> Nullable<Text>,
        position -> Int4,
        created_at -> Timestamptz,
    }
}

joinable!(board_columns -> boards (board_id));
joinable!(tasks -> board_columns (column_id));

allow_tables_to_appear_in_same_query!(
    boards,
    board_columns,
    tasks,
);

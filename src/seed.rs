use tracing::info;

use crate::board::Board;
use crate::error::Result;
use crate::store::BoardStore;

pub const DEMO_BOARD_TITLE: &str = "Demo Board";

const DEMO_COLUMNS: &[(&str, &[(&str, Option<&str>)])] = &[
    (
        "To Do",
        &[
            ("Set up project", Some("Create the repository and invite the team")),
            ("Write user stories", None),
            ("Plan first sprint", Some("Pick the stories for the next two weeks")),
        ],
    ),
    (
        "In Progress",
        &[
            ("Design database schema", Some("Boards, columns and tasks")),
            ("Build board view", None),
        ],
    ),
    ("Done", &[("Kick-off meeting", None)]),
];

/// Creates the demo board for `user_id` unless they already have one.
/// Returns the created board.
pub async fn seed_demo_board(store: &dyn BoardStore, user_id: &str) -> Result<Option<Board>> {
    let existing = store.list_boards(user_id).await?;
    if existing.iter().any(|board| board.title == DEMO_BOARD_TITLE) {
        info!(user = %user_id, "demo board already present");
        return Ok(None);
    }

    let board = store.create_board(user_id, DEMO_BOARD_TITLE).await?;
    for (title, tasks) in DEMO_COLUMNS {
        let column = store.create_column(&board.id, title).await?;
        for (task, description) in tasks.iter() {
            store
                .create_task(&column.id, task, description.map(String::from))
                .await?;
        }
    }

    info!(user = %user_id, board = %board.id, "demo board seeded");
    Ok(Some(board))
}

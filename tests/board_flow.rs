use std::{sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tonic::Request;
use proto::kanban::{tasks_service_server::TasksService, CreateTaskRequest, TaskId};

use kanban::{
    board::{position::is_dense, BoardView, DragItem, DropTarget, ViewState},
    controllers::{TasksController, USER_ID_HEADER},
    realtime::{ChangeFilter, ChangeHub, InvalidationListener},
    store::{BoardGateway, BoardStore, MemoryStore},
};

const USER: &str = "user-1";

struct Board {
    store: Arc<MemoryStore>,
    board_id: String,
    todo: String,
    doing: String,
    done: String,
    tasks: Vec<String>,
}

async fn board() -> Board {
    let store = Arc::new(MemoryStore::new());
    let board = store.create_board(USER, "Launch").await.unwrap();
    let todo = store.create_column(&board.id, "To Do").await.unwrap().id;
    let doing = store.create_column(&board.id, "In Progress").await.unwrap().id;
    let done = store.create_column(&board.id, "Done").await.unwrap().id;

    let mut tasks = Vec::new();
    for title in ["design", "build", "ship"] {
        tasks.push(store.create_task(&todo, title, None).await.unwrap().id);
    }

    Board {
        store,
        board_id: board.id,
        todo,
        doing,
        done,
        tasks,
    }
}

fn signed<T>(message: T) -> Request<T> {
    let mut request = Request::new(message);
    request
        .metadata_mut()
        .insert(USER_ID_HEADER, USER.parse().unwrap());
    request
}

async fn eventually<F>(view: &Arc<Mutex<BoardView<Arc<MemoryStore>>>>, condition: F)
where
    F: Fn(&BoardView<Arc<MemoryStore>>) -> bool,
{
    for _ in 0..200 {
        if condition(&*view.lock().await) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("view never reached the expected state");
}

#[tokio::test]
async fn drag_across_columns_then_back() {
    let b = board().await;
    let mut view = BoardView::new(b.store.clone(), b.board_id.clone());
    view.refresh().await;

    // "build" to the empty In Progress column.
    view.begin_drag(DragItem::Task(b.tasks[1].clone()));
    view.drag_over(DropTarget::Column(b.doing.clone()));
    let plan = view
        .end_drag(Some(DropTarget::Column(b.doing.clone())))
        .await
        .unwrap();
    assert_eq!(plan.tasks.len(), 3);

    // "design" on top of "build" in the other column.
    view.begin_drag(DragItem::Task(b.tasks[0].clone()));
    view.drag_over(DropTarget::Task(b.tasks[1].clone()));
    view.end_drag(Some(DropTarget::Task(b.tasks[1].clone())))
        .await
        .unwrap();

    let stored = b.store.fetch_board(&b.board_id).await.unwrap().unwrap();
    assert_eq!(stored.task_ids(&b.todo), vec![b.tasks[2].as_str()]);
    assert_eq!(
        stored.task_ids(&b.doing),
        vec![b.tasks[0].as_str(), b.tasks[1].as_str()]
    );
    assert!(stored.task_ids(&b.done).is_empty());
    for column in &stored.columns {
        assert!(is_dense(&column.tasks));
    }
    assert_eq!(view.snapshot(), Some(&stored));
}

#[tokio::test]
async fn column_reorder_survives_refetch() {
    let b = board().await;
    let mut view = BoardView::new(b.store.clone(), b.board_id.clone());
    view.refresh().await;

    view.begin_drag(DragItem::Column(b.done.clone()));
    view.drag_over(DropTarget::Column(b.todo.clone()));
    view.end_drag(Some(DropTarget::Column(b.todo.clone())))
        .await
        .unwrap();

    view.refresh().await;
    let snapshot = view.snapshot().unwrap();
    assert_eq!(
        snapshot.column_ids(),
        vec![b.done.as_str(), b.todo.as_str(), b.doing.as_str()]
    );
    assert!(is_dense(&snapshot.columns));
}

#[tokio::test]
async fn drop_on_self_writes_nothing() {
    let b = board().await;
    let mut view = BoardView::new(b.store.clone(), b.board_id.clone());
    view.refresh().await;
    let fetches = b.store.fetches();

    view.begin_drag(DragItem::Task(b.tasks[0].clone()));
    assert!(!view.drag_over(DropTarget::Task(b.tasks[0].clone())));
    let plan = view
        .end_drag(Some(DropTarget::Task(b.tasks[0].clone())))
        .await
        .unwrap();

    assert!(plan.is_empty());
    assert_eq!(b.store.fetches(), fetches);
}

#[tokio::test]
async fn other_session_edits_reach_open_view() {
    let b = board().await;
    let hub = ChangeHub::new(64);
    let tasks = TasksController {
        store: b.store.clone(),
        hub: hub.clone(),
    };

    let view = Arc::new(Mutex::new(BoardView::new(b.store.clone(), b.board_id.clone())));
    view.lock().await.refresh().await;
    let _listener = InvalidationListener::spawn(
        hub.stream(ChangeFilter::for_board(USER, b.board_id.clone())),
        view.clone(),
    );

    tasks
        .create_task(signed(CreateTaskRequest {
            column_id: b.done.clone(),
            title: "celebrate".into(),
            description: Some("cake".into()),
        }))
        .await
        .unwrap();
    eventually(&view, |view| {
        view.snapshot()
            .map_or(false, |snapshot| snapshot.task_ids(&b.done).len() == 1)
    })
    .await;

    tasks
        .delete_task(signed(TaskId {
            task_id: b.tasks[0].clone(),
        }))
        .await
        .unwrap();
    eventually(&view, |view| {
        view.snapshot()
            .map_or(false, |snapshot| snapshot.task_ids(&b.todo).len() == 2)
    })
    .await;

    let view = view.lock().await;
    assert!(is_dense(&view.snapshot().unwrap().columns[0].tasks));
}

#[tokio::test]
async fn invalidation_during_drag_waits_for_drop() {
    let b = board().await;
    let hub = ChangeHub::new(64);
    let tasks = TasksController {
        store: b.store.clone(),
        hub: hub.clone(),
    };

    let view = Arc::new(Mutex::new(BoardView::new(b.store.clone(), b.board_id.clone())));
    view.lock().await.refresh().await;
    let _listener = InvalidationListener::spawn(
        hub.stream(ChangeFilter::for_board(USER, b.board_id.clone())),
        view.clone(),
    );

    {
        let mut view = view.lock().await;
        view.begin_drag(DragItem::Task(b.tasks[2].clone()));
        view.drag_over(DropTarget::Task(b.tasks[0].clone()));
    }

    tasks
        .create_task(signed(CreateTaskRequest {
            column_id: b.doing.clone(),
            title: "remote".into(),
            description: None,
        }))
        .await
        .unwrap();
    eventually(&view, |view| view.is_stale()).await;

    {
        let view = view.lock().await;
        assert!(view.is_dragging());
        let rendered = view.snapshot().unwrap();
        assert_eq!(rendered.task_ids(&b.todo)[0], b.tasks[2].as_str());
        assert!(rendered.task_ids(&b.doing).is_empty());
    }

    let mut view = view.lock().await;
    view.end_drag(Some(DropTarget::Task(b.tasks[0].clone())))
        .await
        .unwrap();
    let snapshot = view.snapshot().unwrap();
    assert_eq!(snapshot.task_ids(&b.todo)[0], b.tasks[2].as_str());
    assert_eq!(snapshot.task_ids(&b.doing).len(), 1);
    assert!(!view.is_stale());
}

#[tokio::test]
async fn deleted_board_reports_not_found() {
    let b = board().await;
    let mut view = BoardView::new(b.store.clone(), b.board_id.clone());
    view.refresh().await;

    b.store.delete_board(&b.board_id).await.unwrap();
    assert!(view.on_remote_change().await);
    assert_eq!(view.state(), &ViewState::NotFound);
    assert!(b.store.locate(kanban::store::RowRef::Task(b.tasks[0].clone())).await.unwrap().is_none());
}

#[tokio::test]
async fn drop_after_remote_insert_into_destination_stays_dense() {
    let b = board().await;
    let hub = ChangeHub::new(64);
    let tasks = TasksController {
        store: b.store.clone(),
        hub: hub.clone(),
    };

    let view = Arc::new(Mutex::new(BoardView::new(b.store.clone(), b.board_id.clone())));
    view.lock().await.refresh().await;
    let _listener = InvalidationListener::spawn(
        hub.stream(ChangeFilter::for_board(USER, b.board_id.clone())),
        view.clone(),
    );

    {
        let mut view = view.lock().await;
        view.begin_drag(DragItem::Task(b.tasks[0].clone()));
        view.drag_over(DropTarget::Column(b.done.clone()));
    }

    tasks
        .create_task(signed(CreateTaskRequest {
            column_id: b.done.clone(),
            title: "remote".into(),
            description: None,
        }))
        .await
        .unwrap();
    eventually(&view, |view| view.is_stale()).await;

    let mut view = view.lock().await;
    view.end_drag(Some(DropTarget::Column(b.done.clone())))
        .await
        .unwrap();

    let stored = b.store.fetch_board(&b.board_id).await.unwrap().unwrap();
    assert_eq!(stored.task_ids(&b.done).len(), 2);
    assert_eq!(stored.task_ids(&b.todo).len(), 2);
    for column in &stored.columns {
        assert!(is_dense(&column.tasks));
    }
    assert_eq!(view.snapshot(), Some(&stored));
}

use std::{sync::Arc, time::Duration};

use tokio::{net::TcpListener, sync::Mutex};
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use proto::kanban::{
    boards_service_server::BoardsServiceServer,
    realtime_service_server::RealtimeServiceServer,
};

use kanban::{
    auth::Session,
    board::{BoardView, DragItem, DropTarget, ViewState},
    client::RemoteStore,
    controllers::{BoardsController, RealtimeController, SharedStore},
    realtime::{ChangeFilter, ChangeHub, InvalidationListener},
    store::{BoardStore, MemoryStore},
};

async fn serve(store: Arc<MemoryStore>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let shared: SharedStore = store;
    let hub = ChangeHub::new(64);

    let server = Server::builder()
        .add_service(BoardsServiceServer::new(BoardsController {
            store: shared,
            hub: hub.clone(),
        }))
        .add_service(RealtimeServiceServer::new(RealtimeController { hub }))
        .serve_with_incoming(TcpListenerStream::new(listener));
    tokio::spawn(server);

    format!("http://{}", address)
}

fn session(user_id: &str) -> Session {
    Session {
        user_id: user_id.to_string(),
        email: format!("{}@example.com", user_id),
    }
}

#[tokio::test]
async fn drop_in_one_session_refreshes_another() {
    let store = Arc::new(MemoryStore::new());
    let board = store.create_board("u1", "Shared").await.unwrap();
    let todo = store.create_column(&board.id, "To Do").await.unwrap();
    let done = store.create_column(&board.id, "Done").await.unwrap();
    let task = store.create_task(&todo.id, "write tests", None).await.unwrap();
    let url = serve(store.clone()).await;

    let writer = RemoteStore::connect(url.clone(), &session("u1")).await.unwrap();
    let reader = RemoteStore::connect(url, &session("u1")).await.unwrap();

    let watched = Arc::new(Mutex::new(BoardView::new(reader.clone(), board.id.clone())));
    watched.lock().await.refresh().await;
    let changes = reader
        .subscribe(&ChangeFilter::for_board("u1", board.id.clone()))
        .await
        .unwrap();
    let _listener = InvalidationListener::spawn(changes, watched.clone());

    let mut view = BoardView::new(writer, board.id.clone());
    assert_eq!(view.refresh().await, &ViewState::Settled);
    view.begin_drag(DragItem::Task(task.id.clone()));
    view.drag_over(DropTarget::Column(done.id.clone()));
    let plan = view
        .end_drag(Some(DropTarget::Column(done.id.clone())))
        .await
        .unwrap();
    assert_eq!(plan.tasks.len(), 1);
    assert_eq!(view.snapshot().unwrap().task_ids(&done.id), vec![task.id.as_str()]);

    for _ in 0..200 {
        {
            let watched = watched.lock().await;
            let moved = watched
                .snapshot()
                .map_or(false, |snapshot| snapshot.task_ids(&done.id) == vec![task.id.as_str()]);
            if moved {
                assert!(watched.snapshot().unwrap().task_ids(&todo.id).is_empty());
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("second session never saw the move");
}

#[tokio::test]
async fn foreign_board_fails_and_missing_board_is_not_found() {
    let store = Arc::new(MemoryStore::new());
    let board = store.create_board("u1", "Private").await.unwrap();
    let url = serve(store).await;

    let intruder = RemoteStore::connect(url.clone(), &session("u2")).await.unwrap();
    let mut view = BoardView::new(intruder, board.id.clone());
    assert!(matches!(view.refresh().await, ViewState::Failed { .. }));

    let owner = RemoteStore::connect(url, &session("u1")).await.unwrap();
    let mut view = BoardView::new(owner, "no-such-board");
    assert_eq!(view.refresh().await, &ViewState::NotFound);
}

use tonic::{Request, Response, Status};
use tracing::info;
use proto::kanban::{
    tasks_service_server::TasksService,
    CreateTaskRequest,
    Task as ProtoTask,
    TaskId,
    UpdateTaskRequest,
};

use super::{authorize, required_title, user_id, SharedStore};
use crate::{
    error::KanbanError,
    realtime::{ChangeEvent, ChangeHub, ChangeKind},
    store::{normalize_description, RowRef, TaskChanges},
};

pub struct TasksController {
    pub store: SharedStore,
    pub hub: ChangeHub,
}

#[tonic::async_trait]
impl TasksService for TasksController {
    async fn create_task(
        &self,
        request: Request<CreateTaskRequest>,
    ) -> Result<Response<ProtoTask>, Status> {
        let user = user_id(&request)?;
        let data = request.into_inner();
        let title = required_title(&data.title)?;
        let owner = authorize(self.store.as_ref(), &user, RowRef::Column(data.column_id.clone())).await?;

        let task = self
            .store
            .create_task(&data.column_id, &title, normalize_description(data.description))
            .await?;
        info!(task = %task.id, column = %task.column_id, position = task.position, "task created");
        self.hub.publish(ChangeEvent::task(ChangeKind::Insert, &task, &owner));

        Ok(Response::new(task.into()))
    }

    async fn update_task(
        &self,
        request: Request<UpdateTaskRequest>,
    ) -> Result<Response<ProtoTask>, Status> {
        let user = user_id(&request)?;
        let data = request.into_inner();
        let owner = authorize(self.store.as_ref(), &user, RowRef::Task(data.task_id.clone())).await?;

        if let Some(column_id) = &data.column_id {
            let destination = authorize(self.store.as_ref(), &user, RowRef::Column(column_id.clone())).await?;
            if destination.board_id != owner.board_id {
                return Err(KanbanError::invalid_argument("tasks cannot move between boards").into());
            }
        }

        let changes = TaskChanges {
            title: data.title.as_deref().map(required_title).transpose()?,
            description: data.description.map(|text| normalize_description(Some(text))),
            column_id: data.column_id,
        };
        let task = self.store.update_task(&data.task_id, changes).await?;
        self.hub.publish(ChangeEvent::task(ChangeKind::Update, &task, &owner));

        Ok(Response::new(task.into()))
    }

    async fn delete_task(
        &self,
        request: Request<TaskId>,
    ) -> Result<Response<ProtoTask>, Status> {
        let user = user_id(&request)?;
        let task_id = &request.get_ref().task_id;
        let owner = authorize(self.store.as_ref(), &user, RowRef::Task(task_id.clone())).await?;

        let task = self.store.delete_task(task_id).await?;
        info!(task = %task.id, column = %task.column_id, "task deleted");
        self.hub.publish(ChangeEvent::task(ChangeKind::Delete, &task, &owner));

        Ok(Response::new(task.into()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tonic::Code;

    use super::*;
    use crate::board::position::is_dense;
    use crate::controllers::signed;
    use crate::store::{BoardGateway, BoardStore, MemoryStore};

    struct Fixture {
        controller: TasksController,
        store: Arc<MemoryStore>,
        board_id: String,
        todo: String,
        done: String,
    }

    async fn setup() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let board = store.create_board("u1", "Board").await.unwrap();
        let todo = store.create_column(&board.id, "To Do").await.unwrap();
        let done = store.create_column(&board.id, "Done").await.unwrap();
        Fixture {
            controller: TasksController {
                store: store.clone(),
                hub: ChangeHub::new(16),
            },
            store,
            board_id: board.id,
            todo: todo.id,
            done: done.id,
        }
    }

    fn create(column_id: &str, title: &str, description: Option<&str>) -> CreateTaskRequest {
        CreateTaskRequest {
            column_id: column_id.to_string(),
            title: title.to_string(),
            description: description.map(String::from),
        }
    }

    #[tokio::test]
    async fn test_create_stores_blank_description_as_none() {
        let fixture = setup().await;

        let task = fixture
            .controller
            .create_task(signed(create(&fixture.todo, "Write docs", Some("  ")), "u1"))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(task.description, None);
        assert_eq!(task.position, 0);
    }

    #[tokio::test]
    async fn test_update_clears_description() {
        let fixture = setup().await;
        let task = fixture
            .store
            .create_task(&fixture.todo, "Task", Some("details".into()))
            .await
            .unwrap();

        let updated = fixture
            .controller
            .update_task(signed(
                UpdateTaskRequest {
                    task_id: task.id.clone(),
                    title: None,
                    description: Some(String::new()),
                    column_id: None,
                },
                "u1",
            ))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(updated.description, None);
        assert_eq!(updated.title, "Task");
    }

    #[tokio::test]
    async fn test_update_column_moves_to_end_of_destination() {
        let fixture = setup().await;
        let moving = fixture.store.create_task(&fixture.todo, "moving", None).await.unwrap();
        fixture.store.create_task(&fixture.todo, "staying", None).await.unwrap();
        fixture.store.create_task(&fixture.done, "finished", None).await.unwrap();

        let moved = fixture
            .controller
            .update_task(signed(
                UpdateTaskRequest {
                    task_id: moving.id.clone(),
                    title: None,
                    description: None,
                    column_id: Some(fixture.done.clone()),
                },
                "u1",
            ))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(moved.column_id, fixture.done);
        assert_eq!(moved.position, 1);

        let snapshot = fixture.store.fetch_board(&fixture.board_id).await.unwrap().unwrap();
        for column in &snapshot.columns {
            assert!(is_dense(&column.tasks));
        }
    }

    #[tokio::test]
    async fn test_move_to_foreign_column_rejected() {
        let fixture = setup().await;
        let task = fixture.store.create_task(&fixture.todo, "task", None).await.unwrap();
        let other = fixture.store.create_board("u1", "Other").await.unwrap();
        let elsewhere = fixture.store.create_column(&other.id, "Elsewhere").await.unwrap();

        let status = fixture
            .controller
            .update_task(signed(
                UpdateTaskRequest {
                    task_id: task.id.clone(),
                    title: None,
                    description: None,
                    column_id: Some(elsewhere.id.clone()),
                },
                "u1",
            ))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_delete_missing_task_not_found() {
        let fixture = setup().await;

        let status = fixture
            .controller
            .delete_task(signed(TaskId { task_id: "missing".into() }, "u1"))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::NotFound);
    }
}

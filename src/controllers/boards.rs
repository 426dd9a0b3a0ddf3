use std::pin::Pin;

use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::{wrappers::ReceiverStream, StreamExt};
use tonic::{Request, Response, Status};
use tracing::{info, warn};
use proto::kanban::{
    boards_service_server::BoardsService,
    ApplyPositionsResponse,
    Board as ProtoBoard,
    BoardId,
    BoardWithColumns,
    CreateBoardRequest,
    ListBoardsRequest,
    PositionPlan as ProtoPositionPlan,
    UpdateBoardRequest,
};

use super::{authorize, required_title, user_id, SharedStore};
use crate::{
    board::PositionPlan,
    error::KanbanError,
    realtime::{ChangeEvent, ChangeHub, ChangeKind, Table},
    store::RowRef,
};

pub struct BoardsController {
    pub store: SharedStore,
    pub hub: ChangeHub,
}

type BoardStream = Pin<Box<dyn Stream<Item = Result<ProtoBoard, Status>> + Send>>;

#[tonic::async_trait]
impl BoardsService for BoardsController {
    type ListBoardsStream = BoardStream;

    async fn list_boards(
        &self,
        request: Request<ListBoardsRequest>,
    ) -> Result<Response<Self::ListBoardsStream>, Status> {
        let user = user_id(&request)?;
        let boards = self.store.list_boards(&user).await?;

        let mut stream = tokio_stream::iter(boards);
        let (sender, receiver) = mpsc::channel(1);

        tokio::spawn(async move {
            while let Some(board) = stream.next().await {
                if sender.send(Ok(ProtoBoard::from(board))).await.is_err() {
                    break;
                }
            }
        });

        Ok(Response::new(
            Box::pin(ReceiverStream::new(receiver)) as Self::ListBoardsStream
        ))
    }

    async fn get_board(
        &self,
        request: Request<BoardId>,
    ) -> Result<Response<BoardWithColumns>, Status> {
        let user = user_id(&request)?;
        let board_id = &request.get_ref().board_id;
        authorize(self.store.as_ref(), &user, RowRef::Board(board_id.clone())).await?;

        let snapshot = self
            .store
            .fetch_board(board_id)
            .await?
            .ok_or_else(|| KanbanError::not_found("board", board_id.as_str()))?;

        Ok(Response::new(snapshot.into()))
    }

    async fn create_board(
        &self,
        request: Request<CreateBoardRequest>,
    ) -> Result<Response<ProtoBoard>, Status> {
        let user = user_id(&request)?;
        let title = required_title(&request.get_ref().title)?;

        let board = self.store.create_board(&user, &title).await?;
        info!(board = %board.id, user = %user, "board created");
        self.hub.publish(ChangeEvent::board(ChangeKind::Insert, &board));

        Ok(Response::new(board.into()))
    }

    async fn update_board(
        &self,
        request: Request<UpdateBoardRequest>,
    ) -> Result<Response<ProtoBoard>, Status> {
        let user = user_id(&request)?;
        let data = request.get_ref();
        let title = required_title(&data.title)?;
        authorize(self.store.as_ref(), &user, RowRef::Board(data.board_id.clone())).await?;

        let board = self.store.rename_board(&data.board_id, &title).await?;
        self.hub.publish(ChangeEvent::board(ChangeKind::Update, &board));

        Ok(Response::new(board.into()))
    }

    async fn delete_board(
        &self,
        request: Request<BoardId>,
    ) -> Result<Response<ProtoBoard>, Status> {
        let user = user_id(&request)?;
        let board_id = &request.get_ref().board_id;
        authorize(self.store.as_ref(), &user, RowRef::Board(board_id.clone())).await?;

        let board = self.store.delete_board(board_id).await?;
        info!(board = %board.id, "board deleted");
        self.hub.publish(ChangeEvent::board(ChangeKind::Delete, &board));

        Ok(Response::new(board.into()))
    }

    async fn apply_positions(
        &self,
        request: Request<ProtoPositionPlan>,
    ) -> Result<Response<ApplyPositionsResponse>, Status> {
        let user = user_id(&request)?;
        let plan = PositionPlan::from(request.into_inner());
        let owner = authorize(self.store.as_ref(), &user, RowRef::Board(plan.board_id.clone())).await?;

        let updated = match self.store.apply_positions(&plan).await {
            Ok(updated) => updated,
            Err(err) => {
                warn!(board = %plan.board_id, error = %err, "position plan rejected");
                return Err(err.into());
            }
        };

        let columns = plan
            .columns
            .iter()
            .map(|row| ChangeEvent::owned(Table::Columns, ChangeKind::Update, &row.column_id, &owner));
        let tasks = plan
            .tasks
            .iter()
            .map(|row| ChangeEvent::owned(Table::Tasks, ChangeKind::Update, &row.task_id, &owner));
        self.hub.publish_all(columns.chain(tasks));

        Ok(Response::new(ApplyPositionsResponse {
            updated: updated as u32,
        }))
    }
}

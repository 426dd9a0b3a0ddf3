use tonic::{Request, Response, Status};
use tracing::info;
use proto::kanban::{
    columns_service_server::ColumnsService,
    Column as ProtoColumn,
    ColumnId,
    CreateColumnRequest,
    UpdateColumnRequest,
};

use super::{authorize, required_title, user_id, SharedStore};
use crate::{
    realtime::{ChangeEvent, ChangeHub, ChangeKind},
    store::{ColumnChanges, RowRef},
};

pub struct ColumnsController {
    pub store: SharedStore,
    pub hub: ChangeHub,
}

#[tonic::async_trait]
impl ColumnsService for ColumnsController {
    async fn create_column(
        &self,
        request: Request<CreateColumnRequest>,
    ) -> Result<Response<ProtoColumn>, Status> {
        let user = user_id(&request)?;
        let data = request.get_ref();
        let title = required_title(&data.title)?;
        let owner = authorize(self.store.as_ref(), &user, RowRef::Board(data.board_id.clone())).await?;

        let column = self.store.create_column(&data.board_id, &title).await?;
        info!(column = %column.id, board = %column.board_id, position = column.position, "column created");
        self.hub.publish(ChangeEvent::column(ChangeKind::Insert, &column, &owner));

        Ok(Response::new(column.into()))
    }

    async fn update_column(
        &self,
        request: Request<UpdateColumnRequest>,
    ) -> Result<Response<ProtoColumn>, Status> {
        let user = user_id(&request)?;
        let data = request.get_ref();
        let title = data.title.as_deref().map(required_title).transpose()?;
        let owner = authorize(self.store.as_ref(), &user, RowRef::Column(data.column_id.clone())).await?;

        let column = self
            .store
            .update_column(&data.column_id, ColumnChanges { title })
            .await?;
        self.hub.publish(ChangeEvent::column(ChangeKind::Update, &column, &owner));

        Ok(Response::new(column.into()))
    }

    async fn delete_column(
        &self,
        request: Request<ColumnId>,
    ) -> Result<Response<ProtoColumn>, Status> {
        let user = user_id(&request)?;
        let column_id = &request.get_ref().column_id;
        let owner = authorize(self.store.as_ref(), &user, RowRef::Column(column_id.clone())).await?;

        let column = self.store.delete_column(column_id).await?;
        info!(column = %column.id, board = %column.board_id, "column deleted");
        self.hub.publish(ChangeEvent::column(ChangeKind::Delete, &column, &owner));

        Ok(Response::new(column.into()))
    }
}

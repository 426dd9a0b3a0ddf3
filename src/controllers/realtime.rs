use std::pin::Pin;

use futures::Stream;
use tokio_stream::StreamExt;
use tonic::{Request, Response, Status};
use tracing::debug;
use proto::kanban::{
    realtime_service_server::RealtimeService,
    ChangeEvent as ProtoChangeEvent,
    SubscribeRequest,
};

use super::user_id;
use crate::{convert::change_filter, realtime::ChangeHub};

pub struct RealtimeController {
    pub hub: ChangeHub,
}

type ChangeStream = Pin<Box<dyn Stream<Item = Result<ProtoChangeEvent, Status>> + Send>>;

#[tonic::async_trait]
impl RealtimeService for RealtimeController {
    type SubscribeStream = ChangeStream;

    async fn subscribe(
        &self,
        request: Request<SubscribeRequest>,
    ) -> Result<Response<Self::SubscribeStream>, Status> {
        let user = user_id(&request)?;
        let filter = change_filter(request.get_ref(), &user);
        debug!(user = %user, board = ?filter.board_id, tables = ?filter.tables, "subscriber joined");

        let stream = self
            .hub
            .stream(filter)
            .map(|event| Ok(ProtoChangeEvent::from(event)));

        Ok(Response::new(Box::pin(stream) as Self::SubscribeStream))
    }
}

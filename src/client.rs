//! gRPC-backed [`BoardGateway`] for board views running outside the service.

use futures::{future, Stream, StreamExt};
use tonic::{
    metadata::{Ascii, MetadataValue},
    transport::Channel,
    Code, Request,
};
use tracing::warn;
use proto::kanban::{
    boards_service_client::BoardsServiceClient,
    realtime_service_client::RealtimeServiceClient,
    BoardId,
};

use crate::{
    auth::Session,
    board::{BoardSnapshot, PositionPlan},
    controllers::USER_ID_HEADER,
    convert::subscribe_request,
    error::{KanbanError, Result},
    realtime::{ChangeEvent, ChangeFilter},
    store::BoardGateway,
};

#[derive(Clone)]
pub struct RemoteStore {
    boards: BoardsServiceClient<Channel>,
    realtime: RealtimeServiceClient<Channel>,
    user_id: MetadataValue<Ascii>,
}

impl RemoteStore {
    pub async fn connect(url: impl Into<String>, session: &Session) -> Result<Self> {
        let channel = Channel::from_shared(url.into())
            .map_err(|err| KanbanError::config(err.to_string()))?
            .connect()
            .await?;
        Self::with_channel(channel, session)
    }

    pub fn with_channel(channel: Channel, session: &Session) -> Result<Self> {
        let user_id = session
            .user_id
            .parse()
            .map_err(|_| KanbanError::auth("user id is not valid request metadata"))?;
        Ok(RemoteStore {
            boards: BoardsServiceClient::new(channel.clone()),
            realtime: RealtimeServiceClient::new(channel),
            user_id,
        })
    }

    fn signed<T>(&self, message: T) -> Request<T> {
        let mut request = Request::new(message);
        request
            .metadata_mut()
            .insert(USER_ID_HEADER, self.user_id.clone());
        request
    }

    /// Change events for `filter`, ending when the server closes the stream
    /// or reports an error.
    pub async fn subscribe(
        &self,
        filter: &ChangeFilter,
    ) -> Result<impl Stream<Item = ChangeEvent> + Send + 'static> {
        let mut client = self.realtime.clone();
        let response = client.subscribe(self.signed(subscribe_request(filter))).await?;

        let events = response
            .into_inner()
            .take_while(|item| {
                if let Err(status) = item {
                    warn!(code = ?status.code(), message = %status.message(), "change stream failed");
                }
                future::ready(item.is_ok())
            })
            .filter_map(|item| {
                future::ready(item.ok().and_then(|event| ChangeEvent::try_from(event).ok()))
            });
        Ok(events)
    }
}

#[tonic::async_trait]
impl BoardGateway for RemoteStore {
    async fn fetch_board(&self, board_id: &str) -> Result<Option<BoardSnapshot>> {
        let mut client = self.boards.clone();
        let request = self.signed(BoardId {
            board_id: board_id.to_string(),
        });

        match client.get_board(request).await {
            Ok(response) => Ok(Some(BoardSnapshot::try_from(response.into_inner())?)),
            Err(status) if status.code() == Code::NotFound => Ok(None),
            Err(status) => Err(status.into()),
        }
    }

    async fn apply_positions(&self, plan: &PositionPlan) -> Result<usize> {
        let mut client = self.boards.clone();
        let response = client
            .apply_positions(self.signed(plan.clone().into()))
            .await?;
        Ok(response.into_inner().updated as usize)
    }
}

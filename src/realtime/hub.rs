use futures::Stream;
use tokio::sync::broadcast;
use tokio_stream::{
    wrappers::{errors::BroadcastStreamRecvError, BroadcastStream},
    StreamExt,
};
use tracing::{trace, warn};

use super::{ChangeEvent, ChangeFilter};

/// Fan-out of row changes to every live subscriber. Publishing never
/// blocks; a subscriber that falls more than `capacity` events behind
/// loses the oldest ones.
#[derive(Clone)]
pub struct ChangeHub {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        ChangeHub { sender }
    }

    /// Returns the number of subscribers the event reached.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        trace!(table = ?event.table, kind = ?event.kind, row = %event.row_id, "publishing change");
        self.sender.send(event).unwrap_or(0)
    }

    pub fn publish_all(&self, events: impl IntoIterator<Item = ChangeEvent>) {
        for event in events {
            self.publish(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Events matching `filter`, from now on.
    pub fn stream(&self, filter: ChangeFilter) -> impl Stream<Item = ChangeEvent> + Send + 'static {
        BroadcastStream::new(self.sender.subscribe()).filter_map(move |item| match item {
            Ok(event) if filter.matches(&event) => Some(event),
            Ok(_) => None,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(skipped, "change subscriber lagged behind");
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::{ChangeKind, Table};

    fn event(row_id: &str, board_id: &str) -> ChangeEvent {
        ChangeEvent {
            table: Table::Tasks,
            kind: ChangeKind::Insert,
            row_id: row_id.into(),
            board_id: Some(board_id.into()),
            user_id: Some("u1".into()),
        }
    }

    #[tokio::test]
    async fn test_stream_delivers_matching_events() {
        let hub = ChangeHub::new(16);
        let mut stream = Box::pin(hub.stream(ChangeFilter::for_board("u1", "b1")));

        assert_eq!(hub.publish(event("t1", "b2")), 1);
        hub.publish(event("t2", "b1"));

        let received = stream.next().await.unwrap();
        assert_eq!(received.row_id, "t2");
    }

    #[tokio::test]
    async fn test_lagging_subscriber_skips_to_newest() {
        let hub = ChangeHub::new(1);
        let mut stream = Box::pin(hub.stream(ChangeFilter::default()));

        hub.publish(event("t1", "b1"));
        hub.publish(event("t2", "b1"));
        hub.publish(event("t3", "b1"));

        assert_eq!(stream.next().await.unwrap().row_id, "t3");

        hub.publish(event("t4", "b1"));
        assert_eq!(stream.next().await.unwrap().row_id, "t4");
    }

    #[test]
    fn test_publish_without_subscribers() {
        let hub = ChangeHub::new(4);
        assert_eq!(hub.publish(event("t1", "b1")), 0);
        assert_eq!(hub.subscriber_count(), 0);
    }
}

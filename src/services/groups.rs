//! Fan-out substrate for connection endpoints. Connections subscribe to
//! named groups (one group per session, plus the hosts group) and events
//! published to a group are handed to every live subscriber's channel.

use crate::services::game::event::ServerEvent;
use crate::utils::types::ConnectionId;
use hashbrown::HashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Group every current session host is subscribed to. The ticker
/// broadcasts the tick signal here.
pub const HOSTS_GROUP: &str = "session.hosts";

type Subscribers = HashMap<ConnectionId, UnboundedSender<Arc<ServerEvent>>>;

/// Named pub/sub groups of connection endpoints
///
/// Uses a blocking mutex as there is little to no overhead since all
/// operations are just map reads and writes which don't warrant the
/// need for the async variant
#[derive(Default)]
pub struct Groups {
    groups: Mutex<HashMap<String, Subscribers>>,
}

impl Groups {
    /// Adds a connection's channel to a group
    pub fn subscribe(
        &self,
        group: &str,
        id: ConnectionId,
        sender: UnboundedSender<Arc<ServerEvent>>,
    ) {
        let groups = &mut *self.groups.lock();
        groups.entry(group.to_string()).or_default().insert(id, sender);
    }

    /// Removes a connection from a group, dropping the group entirely
    /// when it was the last subscriber
    pub fn unsubscribe(&self, group: &str, id: ConnectionId) {
        let groups = &mut *self.groups.lock();
        if let Some(subscribers) = groups.get_mut(group) {
            subscribers.remove(&id);
            if subscribers.is_empty() {
                groups.remove(group);
            }
        }
    }

    /// Hands the event to every subscriber of the group. Subscribers
    /// whose connection has gone away are dropped on the spot.
    pub fn publish(&self, group: &str, event: Arc<ServerEvent>) {
        let groups = &mut *self.groups.lock();
        if let Some(subscribers) = groups.get_mut(group) {
            subscribers.retain(|_, sender| sender.send(event.clone()).is_ok());
        }
    }
}

#[cfg(test)]
mod test {
    use super::Groups;
    use crate::services::game::event::{EventType, ServerEvent};
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::mpsc::unbounded_channel;

    fn event() -> Arc<ServerEvent> {
        Arc::new(ServerEvent::all(EventType::NewWord, json!("slovo")))
    }

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let groups = Groups::default();
        let (tx1, mut rx1) = unbounded_channel();
        let (tx2, mut rx2) = unbounded_channel();
        groups.subscribe("session-a", 1, tx1);
        groups.subscribe("session-b", 2, tx2);

        groups.publish("session-a", event());

        let received = rx1.recv().await.unwrap();
        assert_eq!(received.ty, EventType::NewWord);
        // A foreign session group receives nothing
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let groups = Groups::default();
        let (tx, mut rx) = unbounded_channel();
        groups.subscribe("session-a", 1, tx);
        groups.unsubscribe("session-a", 1);

        groups.publish("session-a", event());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dead_subscribers_are_dropped() {
        let groups = Groups::default();
        let (tx, rx) = unbounded_channel();
        groups.subscribe("session-a", 1, tx);
        drop(rx);

        // Publishing to a dead channel silently removes it
        groups.publish("session-a", event());
        groups.publish("session-a", event());
    }
}

use std::sync::mpsc::{self, Receiver, Sender};

use crate::graph::{EdgeKey, NodeKind};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GraphEvent {
    NodeCreated { id: String, kind: NodeKind },
    NodeRestored { id: String },
    NodeStale { id: String },
    NodeRemoved { id: String },
    NodePurged { id: String },
    ConnectionCreated { key: EdgeKey },
    ConnectionRestored { key: EdgeKey },
    ConnectionStale { key: EdgeKey },
    ConnectionRemoved { key: EdgeKey },
    ConnectionPurged { key: EdgeKey },
}

/// Fan-out of graph notifications to any number of subscribers.
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<Sender<GraphEvent>>,
}

impl EventBus {
    pub fn subscribe(&mut self) -> Receiver<GraphEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn publish_all(&mut self, events: impl IntoIterator<Item = GraphEvent>) {
        for event in events {
            if self.subscribers.is_empty() {
                return;
            }
            self.subscribers
                .retain(|subscriber| subscriber.send(event.clone()).is_ok());
        }
    }
}

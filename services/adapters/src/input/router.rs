//! Topic routing for inbound payload frames
//!
//! Routes are an ordered list of `(key, channel)` pairs. An incoming topic is
//! delivered to the route whose key equals it; failing that, to the route
//! with the longest key that is a prefix of it. Insertion order never decides.

use codec::DataFrame;
use std::sync::Arc;
use tokio::sync::broadcast;
use types::Topic;

/// Decoded frame as delivered to consumers
pub type StreamMessage = Arc<DataFrame>;

struct Route {
    key: Topic,
    tx: broadcast::Sender<StreamMessage>,
}

pub struct TopicRouter {
    routes: Vec<Route>,
    capacity: usize,
}

impl TopicRouter {
    pub fn new(capacity: usize) -> Self {
        Self {
            routes: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    /// Receiver for `key`, creating the route on first use.
    pub fn subscribe(&mut self, key: &Topic) -> broadcast::Receiver<StreamMessage> {
        if let Some(route) = self.routes.iter().find(|r| &r.key == key) {
            return route.tx.subscribe();
        }
        let (tx, rx) = broadcast::channel(self.capacity);
        self.routes.push(Route {
            key: key.clone(),
            tx,
        });
        rx
    }

    /// Key that `topic` resolves to
    pub fn resolve(&self, topic: &str) -> Option<&Topic> {
        self.find(topic).map(|r| &r.key)
    }

    fn find(&self, topic: &str) -> Option<&Route> {
        if let Some(exact) = self.routes.iter().find(|r| r.key.as_str() == topic) {
            return Some(exact);
        }
        self.routes
            .iter()
            .filter(|r| r.key.covers(topic))
            .max_by_key(|r| r.key.as_str().len())
    }

    /// Deliver `frame` to its route. Returns false when nothing matched.
    pub fn dispatch(&self, frame: StreamMessage) -> bool {
        match self.find(&frame.topic) {
            Some(route) => {
                // No live receivers is not an error: consumers come and go.
                let _ = route.tx.send(frame);
                true
            }
            None => false,
        }
    }

    /// Drop the route for `key`; its receivers observe the channel closing.
    pub fn remove(&mut self, key: &Topic) -> bool {
        let before = self.routes.len();
        self.routes.retain(|r| &r.key != key);
        before != self.routes.len()
    }

    pub fn clear(&mut self) {
        self.routes.clear();
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame(topic: &str) -> StreamMessage {
        Arc::new(DataFrame {
            topic: topic.to_string(),
            kind: None,
            ts: None,
            data: json!([]),
        })
    }

    #[test]
    fn test_exact_match_beats_prefix() {
        let mut router = TopicRouter::new(8);
        let mut prefix = router.subscribe(&Topic::from("kline"));
        let mut exact = router.subscribe(&Topic::from("kline.5.BTCUSDT"));

        assert!(router.dispatch(frame("kline.5.BTCUSDT")));
        assert_eq!(exact.try_recv().unwrap().topic, "kline.5.BTCUSDT");
        assert!(prefix.try_recv().is_err());
    }

    #[test]
    fn test_longest_prefix_wins_regardless_of_order() {
        let mut router = TopicRouter::new(8);
        let _short = router.subscribe(&Topic::from("kline"));
        let _long = router.subscribe(&Topic::from("kline.5"));
        assert_eq!(
            router.resolve("kline.5.ETHUSDT").map(Topic::as_str),
            Some("kline.5")
        );

        let mut router = TopicRouter::new(8);
        let mut long_first = router.subscribe(&Topic::from("kline.5"));
        let mut short = router.subscribe(&Topic::from("kline"));
        assert_eq!(
            router.resolve("kline.5.ETHUSDT").map(Topic::as_str),
            Some("kline.5")
        );

        router.dispatch(frame("kline.5.ETHUSDT"));
        assert!(long_first.try_recv().is_ok());
        assert!(short.try_recv().is_err());
    }

    #[test]
    fn test_unmatched_and_removed_routes() {
        let mut router = TopicRouter::new(8);
        let mut rx = router.subscribe(&Topic::from("tickers.BTCUSDT"));
        assert!(!router.dispatch(frame("position")));

        assert!(router.remove(&Topic::from("tickers.BTCUSDT")));
        assert!(router.is_empty());
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Closed)
        ));
    }

    #[test]
    fn test_same_key_shares_channel() {
        let mut router = TopicRouter::new(8);
        let mut a = router.subscribe(&Topic::from("position"));
        let mut b = router.subscribe(&Topic::from("position"));
        assert_eq!(router.len(), 1);
        router.dispatch(frame("position"));
        assert!(a.try_recv().is_ok());
        assert!(b.try_recv().is_ok());
    }
}

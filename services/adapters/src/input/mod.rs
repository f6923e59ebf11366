//! Input side: the market-data stream and its plumbing

pub mod connection;
pub mod router;
pub mod stream_client;

pub use connection::{ConnectionConfig, Liveness, LivenessSnapshot, ReconnectPolicy};
pub use router::{StreamMessage, TopicRouter};
pub use stream_client::{SessionEnd, StreamClient, StreamStats, TopicReceiver};

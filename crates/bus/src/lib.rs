//! Pub/sub transport used as the hub's cross-session message bus.
pub mod pubsub;

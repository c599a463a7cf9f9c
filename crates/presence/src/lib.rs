//! Presence, derived entirely from who is subscribed to the bus.
//!
//! There is no heartbeat, no sweeper, and no storage table: a user is "present" iff at
//! least one `Session` holds a live subscription to their channel. The channel itself
//! disappearing (on unsubscribe, or on the subscribing task's exit) is the only
//! "went offline" signal this crate produces.

/// Canonical pub/sub channel name for a user's signaling traffic.
pub fn channel_name(user_id: &str) -> String {
    format!("channel-user-{user_id}")
}

/// Read-only presence check backed by the bus's subscriber registry.
#[derive(Debug, Default, Clone, Copy)]
pub struct PresenceRegistry;

impl PresenceRegistry {
    pub fn new() -> Self {
        Self
    }

    /// True iff at least one subscriber is currently connected to `user_id`'s channel.
    pub fn is_present(&self, user_id: &str) -> bool {
        bus::pubsub::channel_exists(&channel_name(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bus::pubsub::Subscriber;

    #[test]
    fn channel_name_is_deterministic() {
        assert_eq!(channel_name("u1"), "channel-user-u1");
    }

    #[tokio::test]
    async fn presence_follows_subscription_lifetime() {
        let user_id = format!("user-{}", uuid::Uuid::new_v4());
        let registry = PresenceRegistry::new();
        assert!(!registry.is_present(&user_id));

        let sub = Subscriber::connect("", &channel_name(&user_id)).unwrap();
        tokio::task::yield_now().await;
        assert!(registry.is_present(&user_id));

        drop(sub.into_receiver());
    }
}

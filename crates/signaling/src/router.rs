//! Best-effort fan-out of signaling messages onto the bus. No retries: a missed
//! publish surfaces to the user as a non-response, which the client already handles
//! via its own timeouts.

use crate::codec::SignalingMessage;
use presence::{channel_name, PresenceRegistry};
use std::sync::Arc;

pub struct Router {
    publisher: Arc<bus::pubsub::Publisher>,
    presence: PresenceRegistry,
}

impl Router {
    pub fn new(publisher: Arc<bus::pubsub::Publisher>, presence: PresenceRegistry) -> Self {
        Self {
            publisher,
            presence,
        }
    }

    /// Initiate a call from `caller_id` to `callee_id`. Returns the message the caller's
    /// own session should write directly to its socket when the callee is offline
    /// (there is nothing to publish in that case).
    pub fn initiate_call(&self, caller_id: &str, callee_id: &str) -> Option<SignalingMessage> {
        if !self.presence.is_present(callee_id) {
            return Some(SignalingMessage::CalleeOffline {
                callee_id: callee_id.to_string(),
            });
        }
        self.forward_to(
            callee_id,
            SignalingMessage::IncomingCall {
                caller_id: caller_id.to_string(),
            },
        );
        None
    }

    /// Forward a `call_reject` back to its caller.
    pub fn forward_to_caller(&self, caller_id: &str, msg: SignalingMessage) {
        self.forward_to(caller_id, msg);
    }

    /// Publish `msg` onto `user_id`'s channel. Errors are logged and swallowed: pub/sub
    /// delivery here is at-most-once by design.
    pub fn forward_to(&self, user_id: &str, msg: SignalingMessage) {
        let payload = match msg.encode() {
            Ok(p) => p,
            Err(err) => {
                tracing::error!(user = %user_id, err = %err, "failed encoding signaling message");
                return;
            }
        };
        if let Err(err) = self
            .publisher
            .publish(&channel_name(user_id), payload.as_bytes())
        {
            tracing::warn!(user = %user_id, err = %err, "failed publishing signaling message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bus::pubsub::Subscriber;

    #[tokio::test]
    async fn initiate_call_reports_offline_callee_without_publishing() {
        let router = Router::new(Arc::new(bus::pubsub::Publisher::bind("").unwrap()), PresenceRegistry::new());
        let result = router.initiate_call("caller", "nobody-home");
        assert_eq!(
            result,
            Some(SignalingMessage::CalleeOffline {
                callee_id: "nobody-home".into()
            })
        );
    }

    #[tokio::test]
    async fn initiate_call_publishes_incoming_call_when_present() {
        let callee = format!("callee-{}", uuid::Uuid::new_v4());
        let mut sub = Subscriber::connect("", &channel_name(&callee)).unwrap();
        tokio::task::yield_now().await;

        let router = Router::new(Arc::new(bus::pubsub::Publisher::bind("").unwrap()), PresenceRegistry::new());
        let result = router.initiate_call("caller-1", &callee);
        assert!(result.is_none());

        let (_topic, payload) = sub.receiver().recv().await.expect("message on bus");
        let text = String::from_utf8(payload).unwrap();
        assert!(text.contains("incoming_call"));
        assert!(text.contains("caller-1"));
    }
}

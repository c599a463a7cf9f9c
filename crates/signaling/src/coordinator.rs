//! Call Coordinator (state machine described in the component design): takes a
//! `call_accept` from the callee and, if both users resolve, mints a token pair for
//! each side and publishes them. The hub holds no other call state between requests.

use crate::codec::SignalingMessage;
use crate::router::Router;
use std::sync::Arc;
use storage::Storage;
use tokens::TokenIssuer;

pub struct CallCoordinator {
    storage: Arc<Storage>,
    issuer: Arc<TokenIssuer>,
    router: Arc<Router>,
}

impl CallCoordinator {
    pub fn new(storage: Arc<Storage>, issuer: Arc<TokenIssuer>, router: Arc<Router>) -> Self {
        Self {
            storage,
            issuer,
            router,
        }
    }

    /// `callee_id` accepted a call originally placed by `caller_id`.
    pub fn accept(&self, callee_id: &str, caller_id: &str) {
        self.router.forward_to(
            caller_id,
            SignalingMessage::CallAccept {
                caller_id: caller_id.to_string(),
            },
        );

        let caller = match self.storage.user_by_id(caller_id) {
            Ok(Some(u)) => u,
            Ok(None) => return self.abort(caller_id, callee_id, "unknown caller"),
            Err(err) => return self.abort(caller_id, callee_id, &err.to_string()),
        };
        let callee = match self.storage.user_by_id(callee_id) {
            Ok(Some(u)) => u,
            Ok(None) => return self.abort(caller_id, callee_id, "unknown callee"),
            Err(err) => return self.abort(caller_id, callee_id, &err.to_string()),
        };

        let room_id = domain::new_id();

        let caller_tokens = match self
            .issuer
            .mint_call_tokens(&room_id, &caller.id, &caller.display_name)
        {
            Ok(t) => t,
            Err(err) => return self.abort(caller_id, callee_id, &err.to_string()),
        };
        let callee_tokens = match self
            .issuer
            .mint_call_tokens(&room_id, &callee.id, &callee.display_name)
        {
            Ok(t) => t,
            Err(err) => return self.abort(caller_id, callee_id, &err.to_string()),
        };

        self.router.forward_to(
            &caller.id,
            SignalingMessage::call_tokens(caller_tokens, callee.id.clone()),
        );
        self.router.forward_to(
            &callee.id,
            SignalingMessage::call_tokens(callee_tokens, caller.id.clone()),
        );
    }

    fn abort(&self, caller_id: &str, callee_id: &str, reason: &str) {
        tracing::error!(caller = %caller_id, callee = %callee_id, reason, "call setup aborted");
        let msg = SignalingMessage::error("Failed to generate tokens");
        self.router.forward_to(caller_id, msg.clone());
        self.router.forward_to(callee_id, msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bus::pubsub::Subscriber;
    use domain::User;
    use presence::{channel_name, PresenceRegistry};

    fn user(id: &str, name: &str) -> User {
        User {
            id: id.to_string(),
            email: format!("{id}@example.com"),
            display_name: name.to_string(),
            team_id: "acme".to_string(),
        }
    }

    fn temp_storage() -> Storage {
        let path = std::env::temp_dir().join(format!("coordinator-test-{}", uuid::Uuid::new_v4()));
        Storage::new(&path).unwrap()
    }

    #[tokio::test]
    async fn accept_publishes_tokens_to_both_sides() {
        let storage = Arc::new(temp_storage());
        let caller = user("caller-1", "Ada");
        let callee = user("callee-1", "Grace");
        storage.put_user(&caller).unwrap();
        storage.put_user(&callee).unwrap();

        let publisher = Arc::new(bus::pubsub::Publisher::bind("").unwrap());
        let router = Arc::new(Router::new(publisher, PresenceRegistry::new()));
        let issuer = Arc::new(TokenIssuer::new("key", "secret"));
        let coordinator = CallCoordinator::new(storage, issuer, router);

        let mut caller_sub = Subscriber::connect("", &channel_name(&caller.id)).unwrap();
        let mut callee_sub = Subscriber::connect("", &channel_name(&callee.id)).unwrap();
        tokio::task::yield_now().await;

        coordinator.accept(&callee.id, &caller.id);

        let (_, first) = caller_sub.receiver().recv().await.unwrap();
        assert!(String::from_utf8(first).unwrap().contains("call_accept"));
        let (_, second) = caller_sub.receiver().recv().await.unwrap();
        let second_text = String::from_utf8(second).unwrap();
        assert!(second_text.contains("call_tokens"));
        assert!(second_text.contains(&callee.id));

        let (_, callee_msg) = callee_sub.receiver().recv().await.unwrap();
        let callee_text = String::from_utf8(callee_msg).unwrap();
        assert!(callee_text.contains("call_tokens"));
        assert!(callee_text.contains(&caller.id));
    }

    #[tokio::test]
    async fn accept_with_unknown_user_publishes_error_to_both() {
        let storage = Arc::new(temp_storage());
        let caller = user("caller-2", "Ada");
        storage.put_user(&caller).unwrap();

        let publisher = Arc::new(bus::pubsub::Publisher::bind("").unwrap());
        let router = Arc::new(Router::new(publisher, PresenceRegistry::new()));
        let issuer = Arc::new(TokenIssuer::new("key", "secret"));
        let coordinator = CallCoordinator::new(storage, issuer, router);

        let mut caller_sub = Subscriber::connect("", &channel_name(&caller.id)).unwrap();
        tokio::task::yield_now().await;

        coordinator.accept("ghost-callee", &caller.id);

        let (_, msg) = caller_sub.receiver().recv().await.unwrap();
        assert!(String::from_utf8(msg).unwrap().contains("Failed to generate tokens"));
    }
}

/*
A selectable pub/sub implementation.

This file exposes the same public API regardless of feature flags:

- Publisher
  - bind(addr: &str) -> Result<Self>
  - dial(addr: &str) -> Result<Self>
  - publish(&self, topic: &str, payload: &[u8]) -> Result<()>

- Subscriber
  - connect(addr: &str, topic: &str) -> Result<Self>
  - into_receiver(self) -> mpsc::Receiver<(String, Vec<u8>)>

Current state:
- Default (no feature): in-memory tokio::broadcast-based implementation. This is the
  authoritative backend for presence (see `channel_exists`/`subscriber_count` below),
  since it is the only transport this crate can introspect.
- feature = "with-nng" / "with-zmq": real wire transports suitable for a multi-process
  deployment. Neither broker exposes subscriber counts to a publisher, so a cluster
  relying on one of these for the bus needs its own channel-existence signal; this
  crate doesn't provide one. Presence in that topology is therefore a deployment
  concern, not something these feature flags solve for free.
*/

use anyhow::Result;
use tokio::sync::mpsc;

#[allow(dead_code)]
mod mem {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Mutex, OnceLock};
    use tokio::sync::broadcast;

    static REGISTRY: OnceLock<Mutex<HashMap<String, broadcast::Sender<Vec<u8>>>>> =
        OnceLock::new();

    fn registry() -> &'static Mutex<HashMap<String, broadcast::Sender<Vec<u8>>>> {
        REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
    }

    static SUB_COUNTS: OnceLock<Mutex<HashMap<String, usize>>> = OnceLock::new();

    fn sub_counts() -> &'static Mutex<HashMap<String, usize>> {
        SUB_COUNTS.get_or_init(|| Mutex::new(HashMap::new()))
    }

    fn incr_subscriber(topic: &str) {
        let mut counts = sub_counts().lock().unwrap();
        *counts.entry(topic.to_string()).or_insert(0) += 1;
    }

    fn decr_subscriber(topic: &str) {
        let mut counts = sub_counts().lock().unwrap();
        if let Some(n) = counts.get_mut(topic) {
            *n = n.saturating_sub(1);
            if *n == 0 {
                counts.remove(topic);
            }
        }
    }

    /// True iff at least one `Subscriber` is currently connected to `topic`.
    pub fn channel_exists(topic: &str) -> bool {
        sub_counts().lock().unwrap().get(topic).copied().unwrap_or(0) > 0
    }

    /// Number of `Subscriber`s currently connected to `topic`.
    pub fn subscriber_count(topic: &str) -> usize {
        sub_counts().lock().unwrap().get(topic).copied().unwrap_or(0)
    }

    /// Drops a subscriber's registered presence when the forwarding task ends,
    /// however it ends (channel closed, lagged out, receiver dropped).
    struct SubscriptionGuard(String);

    impl Drop for SubscriptionGuard {
        fn drop(&mut self) {
            decr_subscriber(&self.0);
        }
    }

    pub struct Publisher {}

    impl Publisher {
        /// Bind a publisher. `addr` is ignored for the in-memory fallback.
        pub fn bind(_addr: &str) -> Result<Self> {
            Ok(Self {})
        }

        /// Dial a publisher. Kept for API parity with the nng-based implementation.
        pub fn dial(_addr: &str) -> Result<Self> {
            Ok(Self {})
        }

        /// Publish a payload to `topic`.
        pub fn publish(&self, topic: &str, payload: &[u8]) -> Result<()> {
            tracing::debug!(topic = %topic, len = payload.len(), "mem pub: sending payload");
            let mut map = registry().lock().unwrap();
            let tx = map
                .entry(topic.to_string())
                .or_insert_with(|| broadcast::channel(1024).0)
                .clone();

            // If there are no subscribers, broadcast::Sender::send returns Err(SendError).
            // For our in-memory dev fallback we treat "no subscribers" as non-fatal and
            // swallow the error so publishers don't fail simply because no one is listening.
            match tx.send(payload.to_vec()) {
                Ok(_) => Ok(()),
                Err(_send_err) => Ok(()), // no receivers; ignore in dev fallback
            }
        }
    }

    pub struct Subscriber {
        receiver: mpsc::Receiver<(String, Vec<u8>)>,
    }

    impl Subscriber {
        /// Connect to a topic. `addr` is ignored for the in-memory fallback.
        pub fn connect(_addr: &str, topic: &str) -> Result<Self> {
            let (tx, rx) = mpsc::channel(256);

            // Ensure a broadcast sender exists for this topic and subscribe.
            let mut map = registry().lock().unwrap();
            let btx = map
                .entry(topic.to_string())
                .or_insert_with(|| broadcast::channel(1024).0)
                .clone();
            let mut brx = btx.subscribe();
            drop(map);

            incr_subscriber(topic);

            // Spawn a tokio task to forward from broadcast receiver -> mpsc sender.
            let topic_owned = topic.to_string();
            tokio::spawn(async move {
                let _guard = SubscriptionGuard(topic_owned.clone());
                loop {
                    match brx.recv().await {
                        Ok(payload) => {
                            tracing::debug!(topic = %topic_owned, len = payload.len(), "mem sub: received payload, forwarding");
                            // best-effort: if receiver closed, stop the task
                            if tx.send((topic_owned.clone(), payload)).await.is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(_)) => {
                            // drop and continue
                            continue;
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            break;
                        }
                    }
                }
            });

            Ok(Self { receiver: rx })
        }

        /// Consume the Subscriber and return the owned receiver for moving into tasks.
        pub fn into_receiver(self) -> mpsc::Receiver<(String, Vec<u8>)> {
            self.receiver
        }

        /// Return the internal receiver to await incoming messages.
        pub fn receiver(&mut self) -> &mut mpsc::Receiver<(String, Vec<u8>)> {
            &mut self.receiver
        }
    }
}

#[allow(dead_code)]
#[cfg(feature = "with-nng")]
mod nng_impl {
    use super::*;
    use anyhow::Result;
    use nng::{Socket, Protocol, Message};
    use nng::options::Options;
    use nng::options::protocol::pubsub::Subscribe;
    use std::thread;
    use tokio::runtime::Handle;

    #[allow(dead_code)]
    pub struct Publisher {
        sock: Socket,
    }

    impl Publisher {
        /// Bind a publisher (listen) on addr.
        pub fn bind(addr: &str) -> Result<Self> {
            let sock = Socket::new(Protocol::Pub0)?;
            sock.listen(addr)?;
            Ok(Self { sock })
        }

        /// Dial a publisher (connect) to addr.
        pub fn dial(addr: &str) -> Result<Self> {
            let sock = Socket::new(Protocol::Pub0)?;
            sock.dial(addr)?;
            Ok(Self { sock })
        }

        /// Publish a topic + payload as: topic\x00payload
        pub fn publish(&self, topic: &str, payload: &[u8]) -> Result<()> {
            let mut buf = Vec::with_capacity(topic.len() + 1 + payload.len());
            buf.extend_from_slice(topic.as_bytes());
            buf.push(0);
            buf.extend_from_slice(payload);
            let msg = Message::from(buf.as_slice());
            self.sock.send(msg).map_err(|(_m, e)| anyhow::anyhow!(e))?;
            Ok(())
        }
    }

    #[allow(dead_code)]
    pub struct Subscriber {
        receiver: mpsc::Receiver<(String, Vec<u8>)>,
    }

    impl Subscriber {
        /// Connect to a topic on addr and subscribe to the topic prefix.
        /// This spawns a blocking thread to recv from the native nng socket and forwards
        /// messages into a tokio mpsc channel using the current runtime handle.
        pub fn connect(addr: &str, topic: &str) -> Result<Self> {
            let sub_sock = Socket::new(Protocol::Sub0)?;
            sub_sock.dial(addr)?;
            // Subscribe to the topic prefix. Use the pubsub Subscribe option.
            sub_sock.set_opt::<Subscribe>(topic.as_bytes().to_vec())?;

            let (tx, rx) = mpsc::channel(256);

            // Capture a handle to the current runtime so the blocking thread can
            // spawn async tasks to forward into the tokio channel.
            let handle = Handle::current();
            let sub_thread = sub_sock;
            let tx_thread = tx.clone();

            // Spawn a blocking OS thread to receive messages from the native nng socket.
            thread::spawn(move || {
                loop {
                    match sub_thread.recv() {
                        Ok(msg) => {
                            let msg_bytes = msg.as_slice().to_vec();
                            // split at first 0x00 separator
                            if let Some(pos) = msg_bytes.iter().position(|&b| b == 0) {
                                let topic_bytes = msg_bytes[..pos].to_vec();
                                let payload = msg_bytes[pos + 1..].to_vec();
                                let topic_str = String::from_utf8_lossy(&topic_bytes).to_string();
                                let tx_async = tx_thread.clone();
                                // forward into tokio mpsc via the runtime
                                let _ = handle.spawn(async move {
                                    let _ = tx_async.send((topic_str, payload)).await;
                                });
                            } else {
                                // No separator, treat whole message as payload with empty topic
                                let payload = msg_bytes;
                                let tx_async = tx_thread.clone();
                                let _ = handle.spawn(async move {
                                    let _ = tx_async.send((String::new(), payload)).await;
                                });
                            }
                        }
                        Err(_) => {
                            // socket closed or error; stop thread
                            break;
                        }
                    }
                }
            });

            Ok(Self { receiver: rx })
        }

        /// Consume the Subscriber and return the owned receiver for moving into tasks.
        pub fn into_receiver(self) -> mpsc::Receiver<(String, Vec<u8>)> {
            self.receiver
        }

        /// Return the internal receiver to await incoming messages.
        pub fn receiver(&mut self) -> &mut mpsc::Receiver<(String, Vec<u8>)> {
            &mut self.receiver
        }
    }
}

#[allow(dead_code)]
#[cfg(all(feature = "with-zmq", not(feature = "with-nng")))]
mod zmq_impl {
    use super::*;
    use anyhow::Result;
    use std::thread;
    use tokio::runtime::Handle;
    use zmq::Context as ZmqContext;

    #[allow(dead_code)]
    pub struct Publisher {
        sock: zmq::Socket,
    }

    impl Publisher {
        /// Bind a publisher (listen) on addr.
        pub fn bind(addr: &str) -> Result<Self> {
            let ctx = ZmqContext::new();
            let sock = ctx.socket(zmq::PUB)?;
            sock.bind(addr)?;
            Ok(Self { sock })
        }

        /// Dial a publisher (connect) to addr.
        pub fn dial(addr: &str) -> Result<Self> {
            let ctx = ZmqContext::new();
            let sock = ctx.socket(zmq::PUB)?;
            sock.connect(addr)?;
            Ok(Self { sock })
        }

        /// Publish a topic + payload as: topic\x00payload
        pub fn publish(&self, topic: &str, payload: &[u8]) -> Result<()> {
            let mut buf = Vec::with_capacity(topic.len() + 1 + payload.len());
            buf.extend_from_slice(topic.as_bytes());
            buf.push(0);
            buf.extend_from_slice(payload);
            self.sock.send(&buf, 0)?;
            Ok(())
        }
    }

    #[allow(dead_code)]
    pub struct Subscriber {
        receiver: mpsc::Receiver<(String, Vec<u8>)>,
    }

    impl Subscriber {
        /// Connect to a topic on addr and subscribe to the topic prefix.
        /// This spawns a blocking thread to recv from the ZMQ SUB socket and forwards
        /// messages into a tokio mpsc channel using the current runtime handle.
        pub fn connect(addr: &str, topic: &str) -> Result<Self> {
            let ctx = ZmqContext::new();
            let sock = ctx.socket(zmq::SUB)?;
            sock.connect(addr)?;
            // subscribe to the topic prefix
            sock.set_subscribe(topic.as_bytes())?;

            let (tx, rx) = mpsc::channel(256);

            let handle = Handle::current();
            let sub_thread_sock = sock;
            let tx_thread = tx.clone();

            thread::spawn(move || {
                loop {
                    match sub_thread_sock.recv_bytes(0) {
                        Ok(msg_bytes) => {
                            // split at first 0x00 separator
                            if let Some(pos) = msg_bytes.iter().position(|&b| b == 0) {
                                let topic_bytes = msg_bytes[..pos].to_vec();
                                let payload = msg_bytes[pos + 1..].to_vec();
                                let topic_str = String::from_utf8_lossy(&topic_bytes).to_string();
                                let tx_async = tx_thread.clone();
                                let _ = handle.spawn(async move {
                                    let _ = tx_async.send((topic_str, payload)).await;
                                });
                            } else {
                                // No separator, treat whole message as payload with empty topic
                                let payload = msg_bytes;
                                let tx_async = tx_thread.clone();
                                let _ = handle.spawn(async move {
                                    let _ = tx_async.send((String::new(), payload)).await;
                                });
                            }
                        }
                        Err(_) => {
                            break;
                        }
                    }
                }
            });

            Ok(Self { receiver: rx })
        }

        /// Consume the Subscriber and return the owned receiver for moving into tasks.
        pub fn into_receiver(self) -> mpsc::Receiver<(String, Vec<u8>)> {
            self.receiver
        }

        /// Return the internal receiver to await incoming messages.
        pub fn receiver(&mut self) -> &mut mpsc::Receiver<(String, Vec<u8>)> {
            &mut self.receiver
        }
    }
}

#[cfg(not(any(feature = "with-nng", feature = "with-zmq")))]
pub use mem::{Publisher, Subscriber};

#[cfg(feature = "with-nng")]
pub use nng_impl::{Publisher, Subscriber};

#[cfg(all(feature = "with-zmq", not(feature = "with-nng")))]
pub use zmq_impl::{Publisher, Subscriber};

// Presence introspection is always backed by the in-memory registry, regardless of
// which transport feature is compiled in — see the module doc comment above.
pub use mem::{channel_exists, subscriber_count};

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_existence_tracks_subscriber_lifetime() {
        let topic = format!("test-topic-{}", uuid::Uuid::new_v4());
        assert!(!channel_exists(&topic));

        let sub = Subscriber::connect("", &topic).unwrap();
        // give the forwarder task a tick to register
        tokio::task::yield_now().await;
        assert!(channel_exists(&topic));
        assert_eq!(subscriber_count(&topic), 1);

        drop(sub.into_receiver());
        // the forwarder task only notices the receiver is gone on its next send,
        // so publish once to force it to observe the closed channel and exit.
        let publisher = Publisher::bind("").unwrap();
        for _ in 0..20 {
            let _ = publisher.publish(&topic, b"{}");
            if !channel_exists(&topic) {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(!channel_exists(&topic));
    }

    #[test]
    fn publish_with_no_subscribers_is_not_an_error() {
        let publisher = Publisher::bind("").unwrap();
        assert!(publisher.publish("nobody-listening", b"{}").is_ok());
    }
}

//! Session (C3): owns exactly one WebSocket after authentication and bridges it with
//! the bus. Two cooperating loops (read, bus) share a single outbound queue so the
//! socket only ever has one writer.

use crate::codec::{self, Decoded, SignalingMessage};
use crate::coordinator::CallCoordinator;
use crate::router::Router;
use axum::extract::ws::{Message, WebSocket};
use domain::User;
use futures_util::{SinkExt, StreamExt};
use presence::{channel_name, PresenceRegistry};
use std::sync::Arc;
use storage::Storage;
use tokio::sync::{mpsc, watch};

/// Outbound frames are queued here; a slow consumer gets an explicit close rather
/// than unbounded memory growth.
const OUTBOUND_QUEUE_CAPACITY: usize = 64;

pub struct Session {
    user: User,
    bus_addr: String,
    storage: Arc<Storage>,
    presence: PresenceRegistry,
    router: Arc<Router>,
    coordinator: Arc<CallCoordinator>,
}

impl Session {
    pub fn new(
        user: User,
        bus_addr: String,
        storage: Arc<Storage>,
        presence: PresenceRegistry,
        router: Arc<Router>,
        coordinator: Arc<CallCoordinator>,
    ) -> Self {
        Self {
            user,
            bus_addr,
            storage,
            presence,
            router,
            coordinator,
        }
    }

    pub async fn run(self, socket: WebSocket) {
        let channel = channel_name(&self.user.id);
        let subscriber = match bus::pubsub::Subscriber::connect(&self.bus_addr, &channel) {
            Ok(s) => s,
            Err(err) => {
                tracing::error!(user = %self.user.id, err = %err, "failed subscribing to presence channel");
                return;
            }
        };

        let (mut ws_sink, mut ws_stream) = socket.split();
        let (out_tx, mut out_rx) = mpsc::channel::<Message>(OUTBOUND_QUEUE_CAPACITY);

        if let Ok(greeting) = SignalingMessage::success("connected").encode() {
            if let Err(err) = out_tx.send(Message::Text(greeting.into())).await {
                tracing::warn!(user = %self.user.id, err = %err, "failed queueing success greeting");
            }
        }

        self.announce_presence_to_teammates();

        let writer = tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                if ws_sink.send(msg).await.is_err() {
                    break;
                }
            }
        });

        // A single shared cancellation signal: whichever loop hits a terminal
        // condition first (socket closed, bus subscription exhausted) flips this and
        // the other loop observes it on its next poll and exits too.
        let (cancel_tx, mut cancel_rx) = watch::channel(false);

        let bus_out_tx = out_tx.clone();
        let mut bus_rx = subscriber.into_receiver();
        let bus_cancel_tx = cancel_tx.clone();
        let mut bus_cancel_rx = cancel_rx.clone();
        let bus_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    msg = bus_rx.recv() => {
                        match msg {
                            Some((_topic, payload)) => {
                                let Ok(text) = String::from_utf8(payload) else {
                                    continue;
                                };
                                let Ok(Decoded::Message(msg)) = codec::decode(&text) else {
                                    continue;
                                };
                                if codec::is_bus_forwardable(&msg)
                                    && bus_out_tx.send(Message::Text(text.into())).await.is_err()
                                {
                                    break;
                                }
                            }
                            None => break,
                        }
                    }
                    _ = bus_cancel_rx.changed() => {
                        if *bus_cancel_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            let _ = bus_cancel_tx.send(true);
        });

        loop {
            tokio::select! {
                frame = ws_stream.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            self.dispatch(&text, &out_tx).await;
                        }
                        Some(Ok(Message::Binary(_))) => {
                            tracing::warn!(user = %self.user.id, "ignoring binary frame");
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => continue,
                        Some(Err(err)) => {
                            tracing::warn!(user = %self.user.id, err = %err, "websocket read error");
                            break;
                        }
                    }
                }
                _ = cancel_rx.changed() => {
                    if *cancel_rx.borrow() {
                        break;
                    }
                }
            }
        }

        let _ = cancel_tx.send(true);
        bus_task.abort();
        drop(out_tx);
        let _ = writer.await;
        tracing::info!(user = %self.user.id, "session closed");
    }

    fn announce_presence_to_teammates(&self) {
        let mates = match self.storage.teammates_of(&self.user.id, &self.user.team_id) {
            Ok(mates) => mates,
            Err(err) => {
                tracing::warn!(user = %self.user.id, err = %err, "failed loading teammates");
                return;
            }
        };
        for mate in mates {
            if self.presence.is_present(&mate.id) {
                self.router.forward_to(
                    &mate.id,
                    SignalingMessage::TeammateOnline {
                        teammate_id: self.user.id.clone(),
                    },
                );
            }
        }
    }

    async fn dispatch(&self, text: &str, out_tx: &mpsc::Sender<Message>) {
        let decoded = match codec::decode(text) {
            Ok(d) => d,
            Err(err) => {
                tracing::warn!(user = %self.user.id, err = %err, "dropping malformed message");
                return;
            }
        };
        let msg = match decoded {
            Decoded::Message(msg) => msg,
            Decoded::UnknownType => {
                tracing::warn!(user = %self.user.id, "dropping message with unknown type");
                return;
            }
        };

        match msg {
            SignalingMessage::CallRequest { callee_id } => {
                if let Some(offline) = self.router.initiate_call(&self.user.id, &callee_id) {
                    if let Ok(encoded) = offline.encode() {
                        let _ = out_tx.send(Message::Text(encoded.into())).await;
                    }
                }
            }
            SignalingMessage::CallAccept { caller_id } => {
                self.coordinator.accept(&self.user.id, &caller_id);
            }
            SignalingMessage::CallReject { caller_id } => {
                self.router.forward_to_caller(
                    &caller_id,
                    SignalingMessage::CallReject {
                        caller_id: caller_id.clone(),
                    },
                );
            }
            SignalingMessage::CallEnd { participant_id } => {
                self.router.forward_to(
                    &participant_id,
                    SignalingMessage::CallEnd {
                        participant_id: participant_id.clone(),
                    },
                );
            }
            SignalingMessage::TeammateOnline { teammate_id } => {
                self.router.forward_to(
                    &teammate_id,
                    SignalingMessage::TeammateOnline {
                        teammate_id: self.user.id.clone(),
                    },
                );
            }
            SignalingMessage::Ping { .. } => {
                if let Ok(encoded) = SignalingMessage::pong().encode() {
                    let _ = out_tx.send(Message::Text(encoded.into())).await;
                }
            }
            other => {
                tracing::warn!(user = %self.user.id, msg = ?other, "dropping unexpected inbound message type");
            }
        }
    }
}

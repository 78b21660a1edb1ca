//! Push-channel lifecycle and reconnect policy.
//!
//! One logical connection per open conversation. The link loops through
//! `Disconnected → Connecting → Open → Closed → (delay) → Connecting …`
//! indefinitely: every close or failed handshake schedules the next attempt
//! after a fixed delay, with no backoff growth and no attempt cap. An
//! announce frame is written immediately after every successful handshake.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::frame::{OutboundFrame, PushFrame};

/// Link lifecycle states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Open,
    Closed,
}

/// Events surfaced to the conversation controller.
#[derive(Clone, Debug)]
pub enum ChannelEvent {
    /// Handshake succeeded; the announce frame has already been written.
    Opened,
    /// A parsed inbound frame. Malformed payloads never reach here.
    Frame(PushFrame),
    /// The link dropped; a reconnect is already scheduled.
    Closed,
}

/// A queued frame plus an optional write acknowledgement. The ack resolves
/// `true` after the sink write succeeds; a dropped sender (queue discarded on
/// link teardown) or `false` means the frame never made it onto the wire.
struct Outbound {
    message: WsMessage,
    ack: Option<oneshot::Sender<bool>>,
}

type OutboundSlot = Arc<Mutex<Option<mpsc::UnboundedSender<Outbound>>>>;

pub struct ConnectionManager {
    state: Arc<Mutex<LinkState>>,
    outbound: OutboundSlot,
    runner: Option<JoinHandle<()>>,
}

impl ConnectionManager {
    /// Open the push channel and start the reconnect loop.
    ///
    /// `announce` is re-written on every successful handshake, so the server
    /// learns about us again after each reconnect.
    pub fn connect(
        url: String,
        announce: OutboundFrame,
        reconnect_delay: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<ChannelEvent>) {
        let state = Arc::new(Mutex::new(LinkState::Disconnected));
        let outbound: OutboundSlot = Arc::new(Mutex::new(None));
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let runner = tokio::spawn(run_link(
            url,
            announce.to_json(),
            Arc::clone(&state),
            Arc::clone(&outbound),
            events_tx,
            reconnect_delay,
        ));

        (
            Self {
                state,
                outbound,
                runner: Some(runner),
            },
            events_rx,
        )
    }

    /// A manager with no link and no reconnect loop; every `send` returns
    /// `false`. Used when the conversation must run REST-only.
    pub fn disconnected() -> Self {
        Self {
            state: Arc::new(Mutex::new(LinkState::Disconnected)),
            outbound: Arc::new(Mutex::new(None)),
            runner: None,
        }
    }

    pub fn state(&self) -> LinkState {
        *self.state.lock()
    }

    pub fn is_open(&self) -> bool {
        self.state() == LinkState::Open
    }

    /// Queue a fire-and-forget write. Returns `false`, never an error, when
    /// the link is not `Open`; used for frames with no delivery guarantee
    /// (typing signals).
    pub fn send(&self, frame: &OutboundFrame) -> bool {
        self.enqueue(frame, None)
    }

    /// Queue a write and hand back its acknowledgement. The receiver resolves
    /// `true` once the frame has actually been written to the socket; `false`
    /// or a dropped sender means it was not, and the caller should retry via
    /// REST. Returns `None` when the link is not `Open`.
    pub fn send_acked(&self, frame: &OutboundFrame) -> Option<oneshot::Receiver<bool>> {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.enqueue(frame, Some(ack_tx)) {
            Some(ack_rx)
        } else {
            None
        }
    }

    fn enqueue(&self, frame: &OutboundFrame, ack: Option<oneshot::Sender<bool>>) -> bool {
        if !self.is_open() {
            return false;
        }
        let guard = self.outbound.lock();
        match guard.as_ref() {
            Some(tx) => tx
                .send(Outbound {
                    message: WsMessage::Text(frame.to_json().into()),
                    ack,
                })
                .is_ok(),
            None => false,
        }
    }

    /// Tear down the socket and stop the reconnect loop. Terminal.
    pub fn close(&mut self) {
        if let Some(runner) = self.runner.take() {
            runner.abort();
        }
        *self.outbound.lock() = None;
        *self.state.lock() = LinkState::Closed;
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_link(
    url: String,
    announce_json: String,
    state: Arc<Mutex<LinkState>>,
    outbound: OutboundSlot,
    events_tx: mpsc::UnboundedSender<ChannelEvent>,
    reconnect_delay: Duration,
) {
    loop {
        *state.lock() = LinkState::Connecting;

        match connect_async(url.as_str()).await {
            Ok((socket, _response)) => {
                let (mut sink, mut stream) = socket.split();

                // Announce ourselves before anything else.
                if sink
                    .send(WsMessage::Text(announce_json.clone().into()))
                    .await
                    .is_err()
                {
                    warn!("push channel announce failed, retrying after delay");
                    *state.lock() = LinkState::Closed;
                } else {
                    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();
                    *outbound.lock() = Some(tx);
                    *state.lock() = LinkState::Open;
                    info!("push channel open: {}", url);
                    if events_tx.send(ChannelEvent::Opened).is_err() {
                        return;
                    }

                    loop {
                        tokio::select! {
                            queued = rx.recv() => match queued {
                                Some(Outbound { message, ack }) => {
                                    let wrote = sink.send(message).await.is_ok();
                                    if let Some(ack) = ack {
                                        let _ = ack.send(wrote);
                                    }
                                    if !wrote {
                                        break;
                                    }
                                }
                                None => break,
                            },
                            inbound = stream.next() => match inbound {
                                Some(Ok(WsMessage::Text(text))) => {
                                    match PushFrame::parse(text.as_str()) {
                                        Ok(frame) => {
                                            if events_tx.send(ChannelEvent::Frame(frame)).is_err() {
                                                return;
                                            }
                                        }
                                        // Treated as opaque text, never a crash.
                                        Err(e) => warn!("dropping push frame: {}", e),
                                    }
                                }
                                Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                                Some(Ok(_)) => {}
                            },
                        }
                    }

                    *outbound.lock() = None;
                    *state.lock() = LinkState::Closed;
                    debug!("push channel closed: {}", url);
                    if events_tx.send(ChannelEvent::Closed).is_err() {
                        return;
                    }
                }
            }
            Err(e) => {
                warn!("push channel connect failed: {}", e);
                *state.lock() = LinkState::Closed;
            }
        }

        // Unconditional fixed-interval retry.
        tokio::time::sleep(reconnect_delay).await;
    }
}

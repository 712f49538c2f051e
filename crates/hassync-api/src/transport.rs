//! Transport abstraction over the WebSocket connection.
//!
//! The sync engine never touches a socket directly: it consumes
//! [`TransportEvent`]s from, and writes text frames to, a [`Transport`]
//! channel pair produced by a [`Connector`]. Production code uses
//! [`WsConnector`] (tokio-tungstenite); tests inject a connector backed
//! by plain channels and drive the engine with synthetic events.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::Error;

const INBOUND_CAPACITY: usize = 256;
const OUTBOUND_CAPACITY: usize = 64;

// ── TransportEvent ───────────────────────────────────────────────────

/// One discrete occurrence on an open connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A text frame arrived.
    Message(String),

    /// The peer closed the connection (close frame or stream end).
    Closed {
        code: Option<u16>,
        reason: Option<String>,
    },

    /// The connection failed mid-stream.
    Failed(String),
}

// ── Transport ────────────────────────────────────────────────────────

/// Channel pair for one established connection.
///
/// Dropping the transport closes the outbound channel, which tells the
/// pump task to send a close frame and wind down.
pub struct Transport {
    outbound: mpsc::Sender<String>,
    inbound: mpsc::Receiver<TransportEvent>,
}

impl Transport {
    /// Assemble a transport from raw channel ends.
    ///
    /// [`WsConnector`] wires these to a real socket; tests keep the peer
    /// ends and script the conversation.
    pub fn new(outbound: mpsc::Sender<String>, inbound: mpsc::Receiver<TransportEvent>) -> Self {
        Self { outbound, inbound }
    }

    /// Queue one text frame for sending.
    pub async fn send(&self, text: String) -> Result<(), Error> {
        self.outbound
            .send(text)
            .await
            .map_err(|_| Error::ChannelClosed)
    }

    /// Receive the next event. `None` means the pump task is gone.
    pub async fn recv(&mut self) -> Option<TransportEvent> {
        self.inbound.recv().await
    }
}

// ── Connector ────────────────────────────────────────────────────────

/// Establishes one connection attempt, yielding a [`Transport`].
///
/// The sync engine calls this once per connection attempt, including
/// every reconnect, so a connector must be reusable.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self) -> impl Future<Output = Result<Transport, Error>> + Send;
}

// ── WsConnector ──────────────────────────────────────────────────────

/// Real WebSocket connector backed by tokio-tungstenite.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: Url,
}

impl WsConnector {
    pub fn new(url: Url) -> Self {
        Self { url }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl Connector for WsConnector {
    async fn connect(&self) -> Result<Transport, Error> {
        tracing::info!(url = %self.url, "Connecting to WebSocket");

        let (ws_stream, _response) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|e| Error::Connect(e.to_string()))?;

        tracing::info!("WebSocket connected");

        let (out_tx, out_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let (in_tx, in_rx) = mpsc::channel(INBOUND_CAPACITY);

        tokio::spawn(pump(ws_stream, out_rx, in_tx));

        Ok(Transport::new(out_tx, in_rx))
    }
}

// ── Socket pump ──────────────────────────────────────────────────────

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Shuttle frames between the socket and the channel pair until either
/// side goes away.
async fn pump(
    ws_stream: WsStream,
    mut outbound: mpsc::Receiver<String>,
    inbound: mpsc::Sender<TransportEvent>,
) {
    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            biased;
            out = outbound.recv() => {
                match out {
                    Some(text) => {
                        if let Err(e) = write.send(Message::Text(text.into())).await {
                            let _ = inbound
                                .send(TransportEvent::Failed(e.to_string()))
                                .await;
                            break;
                        }
                    }
                    // Transport dropped: the session is over.
                    None => {
                        let _ = write.close().await;
                        break;
                    }
                }
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        if inbound
                            .send(TransportEvent::Message(text.to_string()))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(_))) => {
                        // tungstenite handles pong replies automatically
                        tracing::trace!("WebSocket ping");
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = match frame {
                            Some(cf) => (Some(u16::from(cf.code)), Some(cf.reason.to_string())),
                            None => (None, None),
                        };
                        let _ = inbound.send(TransportEvent::Closed { code, reason }).await;
                        break;
                    }
                    Some(Err(e)) => {
                        let _ = inbound
                            .send(TransportEvent::Failed(e.to_string()))
                            .await;
                        break;
                    }
                    None => {
                        // Stream ended without a close frame
                        let _ = inbound
                            .send(TransportEvent::Closed { code: None, reason: None })
                            .await;
                        break;
                    }
                    _ => {
                        // Binary, Pong, Frame -- ignore
                    }
                }
            }
        }
    }

    tracing::debug!("WebSocket pump exiting");
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn transport_send_and_recv_over_channels() {
        let (out_tx, mut out_rx) = mpsc::channel(4);
        let (in_tx, in_rx) = mpsc::channel(4);
        let mut transport = Transport::new(out_tx, in_rx);

        transport.send("hello".into()).await.unwrap();
        assert_eq!(out_rx.recv().await.unwrap(), "hello");

        in_tx
            .send(TransportEvent::Message("world".into()))
            .await
            .unwrap();
        assert_eq!(
            transport.recv().await.unwrap(),
            TransportEvent::Message("world".into())
        );
    }

    #[tokio::test]
    async fn send_fails_after_peer_drops() {
        let (out_tx, out_rx) = mpsc::channel(4);
        let (_in_tx, in_rx) = mpsc::channel(4);
        let transport = Transport::new(out_tx, in_rx);

        drop(out_rx);
        assert!(matches!(
            transport.send("hello".into()).await,
            Err(Error::ChannelClosed)
        ));
    }

    #[tokio::test]
    async fn recv_returns_none_when_pump_is_gone() {
        let (out_tx, _out_rx) = mpsc::channel(4);
        let (in_tx, in_rx) = mpsc::channel::<TransportEvent>(4);
        let mut transport = Transport::new(out_tx, in_rx);

        drop(in_tx);
        assert!(transport.recv().await.is_none());
    }
}

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use log::{debug, info, warn};
use tokio::{net::TcpStream, time};
use tokio_tungstenite::{
    connect_async,
    tungstenite::protocol::Message,
    MaybeTlsStream, WebSocketStream,
};

use super::{
    endpoint::Endpoint,
    message_types::{ClientEvent, ServerEvent},
    protocol::{self, Frame, ENGINE_PONG},
};
use crate::{errors::WsError, prelude::*, Error};

/// An established session on one namespace.
#[async_trait]
pub trait Link: Send {
    async fn send(&mut self, event: &ClientEvent) -> Result<()>;

    /// Next event for the namespace; `None` once the server closed the session.
    async fn recv(&mut self) -> Option<Result<ServerEvent>>;

    async fn close(&mut self);
}

/// Opens links; swapped for an in-memory implementation in tests.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn Link>>;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Socket.IO v4 over a websocket.
#[derive(Debug, Clone)]
pub struct SocketIoConnector {
    connect_timeout: Duration,
}

impl SocketIoConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        // wss endpoints need a process-wide rustls provider
        if rustls::crypto::ring::default_provider()
            .install_default()
            .is_err()
        {
            debug!("rustls crypto provider already installed");
        }
        Self { connect_timeout }
    }

    async fn handshake(endpoint: &Endpoint) -> Result<SocketIoLink> {
        let url = endpoint.handshake_url();
        info!("Connecting to {url} namespace={}", endpoint.namespace());

        let (stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| Error::ws_connection(e.to_string()))?;
        let (writer, reader) = stream.split();
        let mut link = SocketIoLink {
            writer,
            reader,
            namespace: endpoint.namespace().to_string(),
            pending_pong: false,
        };

        let open = loop {
            match link.handshake_frame().await? {
                Frame::Open(open) => break open,
                Frame::Ping => link.send_text(ENGINE_PONG.to_string()).await?,
                other => debug!("Ignoring frame before open: {other:?}"),
            }
        };
        debug!(
            "Engine.IO session opened sid={} ping_interval={}ms ping_timeout={}ms",
            open.sid, open.ping_interval, open.ping_timeout
        );

        link.send_text(protocol::encode_connect(&link.namespace))
            .await?;

        loop {
            match link.handshake_frame().await? {
                Frame::Connected { namespace } if namespace == link.namespace => {
                    info!("Joined namespace {namespace}");
                    return Ok(link);
                }
                Frame::ConnectError { namespace, message } if namespace == link.namespace => {
                    return Err(WsError::Rejected { namespace, message }.into());
                }
                Frame::Ping => link.send_text(ENGINE_PONG.to_string()).await?,
                Frame::Close => {
                    return Err(WsError::Handshake("closed during handshake".to_string()).into())
                }
                other => debug!("Ignoring frame during handshake: {other:?}"),
            }
        }
    }
}

#[async_trait]
impl Connector for SocketIoConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn Link>> {
        let link = time::timeout(self.connect_timeout, Self::handshake(endpoint))
            .await
            .map_err(|_| Error::Ws(WsError::Timeout(self.connect_timeout)))??;
        Ok(Box::new(link))
    }
}

pub(crate) struct SocketIoLink {
    writer: SplitSink<WsStream, Message>,
    reader: SplitStream<WsStream>,
    namespace: String,
    /// Engine.IO ping received and not yet answered
    pending_pong: bool,
}

impl SocketIoLink {
    async fn send_text(&mut self, text: String) -> Result<()> {
        debug!("Sending frame {text}");
        self.writer
            .send(Message::Text(text))
            .await
            .map_err(|e| Error::ws_send(e.to_string()))
    }

    /// Next decodable frame; `None` when the stream ended.
    async fn next_frame(&mut self) -> Option<Result<Frame>> {
        loop {
            let message = match self.reader.next().await? {
                Ok(message) => message,
                Err(err) => return Some(Err(Error::ws_connection(err.to_string()))),
            };
            match message {
                Message::Text(text) => match protocol::decode_frame(&text) {
                    Ok(frame) => return Some(Ok(frame)),
                    Err(err) => warn!("Dropping undecodable frame: {err}"),
                },
                Message::Close(frame) => {
                    debug!("Received websocket close frame: {frame:?}");
                    return Some(Ok(Frame::Close));
                }
                Message::Binary(_) => debug!("Ignoring binary websocket message"),
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }

    async fn handshake_frame(&mut self) -> Result<Frame> {
        self.next_frame().await.unwrap_or_else(|| {
            Err(WsError::Handshake("connection ended during handshake".to_string()).into())
        })
    }
}

#[async_trait]
impl Link for SocketIoLink {
    async fn send(&mut self, event: &ClientEvent) -> Result<()> {
        let payload = event.payload()?;
        let text = protocol::encode_event(&self.namespace, event.name(), payload.as_ref())?;
        self.send_text(text).await
    }

    async fn recv(&mut self) -> Option<Result<ServerEvent>> {
        loop {
            if self.pending_pong {
                if let Err(err) = self.send_text(ENGINE_PONG.to_string()).await {
                    return Some(Err(err));
                }
                self.pending_pong = false;
            }

            match self.next_frame().await? {
                Err(err) => return Some(Err(err)),
                Ok(Frame::Ping) => self.pending_pong = true,
                Ok(Frame::Close) => return None,
                Ok(Frame::Disconnected { namespace }) if namespace == self.namespace => {
                    info!("Server disconnected namespace {namespace}");
                    return None;
                }
                Ok(Frame::Event {
                    namespace,
                    name,
                    payload,
                }) if namespace == self.namespace => {
                    return Some(Ok(ServerEvent::from_named(&name, payload)));
                }
                Ok(Frame::ConnectError { namespace, message }) if namespace == self.namespace => {
                    return Some(Err(WsError::Rejected { namespace, message }.into()));
                }
                Ok(other) => debug!("Ignoring frame {other:?}"),
            }
        }
    }

    async fn close(&mut self) {
        let disconnect = protocol::encode_disconnect(&self.namespace);
        if let Err(err) = self.send_text(disconnect).await {
            debug!("Error sending namespace disconnect: {err}");
        }
        if let Err(err) = self.writer.close().await {
            debug!("Error sending close frame: {err}");
        }
    }
}

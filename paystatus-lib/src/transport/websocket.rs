//! Live status channel over tokio-tungstenite.

use super::{ChannelFrame, ChannelKind, CloseCode, StatusChannel, StatusConnector};
use crate::{Result, StatusError};
use async_trait::async_trait;
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens websocket connections to the merchant-status endpoint.
#[derive(Clone, Debug, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    /// Create a connector.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StatusConnector for WebSocketConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn StatusChannel>> {
        let (stream, response) = connect_async(url)
            .await
            .map_err(|e| StatusError::connection_failed(url, e))?;
        debug!(url, status = %response.status(), "websocket handshake complete");
        Ok(Box::new(WebSocketChannel {
            stream: Some(stream),
        }))
    }
}

/// A connected websocket carrying status frames.
pub struct WebSocketChannel {
    stream: Option<WsStream>,
}

#[async_trait]
impl StatusChannel for WebSocketChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Live
    }

    async fn next_frame(&mut self) -> ChannelFrame {
        let Some(stream) = self.stream.as_mut() else {
            return ChannelFrame::closed(CloseCode::NORMAL);
        };

        loop {
            let frame = match stream.next().await {
                Some(Ok(Message::Text(text))) => ChannelFrame::Text(text),
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                    Ok(text) => ChannelFrame::Text(text),
                    Err(_) => {
                        debug!("ignoring non-UTF-8 binary frame");
                        continue;
                    }
                },
                Some(Ok(Message::Close(Some(close)))) => ChannelFrame::Closed {
                    code: u16::from(close.code),
                    reason: close.reason.into_owned(),
                },
                Some(Ok(Message::Close(None))) => ChannelFrame::closed(CloseCode::NO_STATUS),
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                Some(Err(e)) => ChannelFrame::Closed {
                    code: CloseCode::ABNORMAL,
                    reason: e.to_string(),
                },
                None => ChannelFrame::closed(CloseCode::ABNORMAL),
            };

            if matches!(frame, ChannelFrame::Closed { .. }) {
                self.stream = None;
            }
            return frame;
        }
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.close(None).await {
                debug!(error = %e, "websocket close handshake failed");
            }
        }
    }
}

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::debug;
use url::Url;

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("invalid relay address: {0}")]
    InvalidAddress(String),
    #[error("connect timed out after {0:?}")]
    Timeout(Duration),
    #[error("websocket handshake failed: {0}")]
    Handshake(String),
}

/// A live relay connection, bridged onto plain channels so the session task
/// never touches the socket directly. Dropping either half tears the
/// connection down.
pub struct RelayConnection {
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<String>,
}

/// Dials the relay. The session task owns reconnection policy; a connector
/// only performs a single attempt.
#[async_trait]
pub trait RelayConnector: Send + Sync {
    async fn connect(&self, address: &str) -> Result<RelayConnection, ConnectorError>;
}

/// Production connector speaking websocket to the relay.
pub struct WsConnector {
    connect_timeout: Duration,
}

impl WsConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait]
impl RelayConnector for WsConnector {
    async fn connect(&self, address: &str) -> Result<RelayConnection, ConnectorError> {
        let url = relay_url(address)?;
        let (stream, _) = timeout(self.connect_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| ConnectorError::Timeout(self.connect_timeout))?
            .map_err(|err| ConnectorError::Handshake(err.to_string()))?;

        let (mut sink, mut source) = stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            while let Some(text) = outbound_rx.recv().await {
                if sink.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        tokio::spawn(async move {
            while let Some(frame) = source.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        if inbound_tx.send(text.as_str().to_owned()).is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
            debug!("relay socket reader finished");
        });

        Ok(RelayConnection {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}

/// Normalize a user-supplied relay address into a websocket URL. Bare
/// `host:port` strings get a `ws://` scheme and the `/ws` endpoint path.
fn relay_url(address: &str) -> Result<Url, ConnectorError> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(ConnectorError::InvalidAddress(
            "relay address is empty".to_string(),
        ));
    }

    let with_scheme = if trimmed.starts_with("ws://") || trimmed.starts_with("wss://") {
        trimmed.to_string()
    } else if let Some(rest) = trimmed.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = trimmed.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        format!("ws://{trimmed}")
    };

    let mut url = Url::parse(&with_scheme)
        .map_err(|err| ConnectorError::InvalidAddress(format!("{trimmed}: {err}")))?;
    if url.path() == "/" || url.path().is_empty() {
        url.set_path("/ws");
    }
    Ok(url)
}

//! WebSocket client for a single-symbol Binance depth stream

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::protocol::Message,
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, error, info, warn};

use crate::error::{BookError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Diff depth stream name for a symbol
pub fn depth_stream_url(endpoint: &str, symbol: &str) -> String {
    format!(
        "{}/{}@depth@100ms",
        endpoint.trim_end_matches('/'),
        symbol.to_lowercase()
    )
}

/// WebSocket client for one depth subscription
pub struct WebSocketClient {
    stream: Option<WsStream>,
    url: String,
}

impl WebSocketClient {
    pub fn new(endpoint: &str, symbol: &str) -> Self {
        Self {
            stream: None,
            url: depth_stream_url(endpoint, symbol),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Connect to the depth stream
    pub async fn connect(&mut self) -> Result<()> {
        info!(url = %self.url, "Connecting to depth stream");

        let (ws_stream, response) = connect_async(&self.url).await.map_err(|e| {
            BookError::WebSocketConnection(format!("Failed to connect: {}", e))
        })?;

        info!(status = ?response.status(), "Depth stream connected");
        self.stream = Some(ws_stream);

        Ok(())
    }

    /// Receive the next data message; `None` for control frames
    pub async fn recv(&mut self) -> Result<Option<String>> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| BookError::WebSocketConnection("Not connected".to_string()))?;

        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                debug!(len = text.len(), "Received text message");
                Ok(Some(text))
            }
            Some(Ok(Message::Binary(data))) => {
                Ok(Some(String::from_utf8_lossy(&data).into_owned()))
            }
            Some(Ok(Message::Ping(data))) => {
                debug!("Received ping, sending pong");
                if let Err(e) = stream.send(Message::Pong(data)).await {
                    warn!(error = %e, "Failed to answer ping");
                }
                Ok(None)
            }
            Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => Ok(None),
            Some(Ok(Message::Close(frame))) => {
                warn!(frame = ?frame, "Received close frame");
                self.stream = None;
                Err(BookError::WebSocketConnection("Connection closed".to_string()))
            }
            Some(Err(e)) => {
                error!(error = %e, "WebSocket error");
                self.stream = None;
                Err(BookError::WebSocketMessage(e.to_string()))
            }
            None => {
                warn!("Depth stream ended");
                self.stream = None;
                Err(BookError::WebSocketConnection("Stream ended".to_string()))
            }
        }
    }

    /// Send a ping to keep connection alive
    pub async fn ping(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.as_mut() {
            stream
                .send(Message::Ping(vec![]))
                .await
                .map_err(|e| BookError::WebSocketMessage(e.to_string()))?;
        }
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Close the connection
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.close(None).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_stream_url() {
        assert_eq!(
            depth_stream_url("wss://stream.binance.com:9443/ws", "BTCUSDT"),
            "wss://stream.binance.com:9443/ws/btcusdt@depth@100ms"
        );
        assert_eq!(
            depth_stream_url("ws://localhost:9000/ws/", "EthUsdt"),
            "ws://localhost:9000/ws/ethusdt@depth@100ms"
        );
    }

    #[tokio::test]
    async fn test_recv_without_connection_fails() {
        let mut client = WebSocketClient::new("ws://localhost:1/ws", "BTCUSDT");
        assert!(!client.is_connected());
        let err = client.recv().await.unwrap_err();
        assert!(matches!(err, BookError::WebSocketConnection(_)));
        client.ping().await.unwrap();
        client.close().await;
    }
}

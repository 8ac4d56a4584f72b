//! Publisher module for IPC communication
//!
//! Forwards render frames to an external display over a Unix socket. Frames are
//! MessagePack with a 4-byte big-endian length prefix.

use std::path::Path;
use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{BookError, Result};
use crate::render::RenderFrame;

/// Encode a frame as a length-prefixed MessagePack message
pub fn encode_frame(frame: &RenderFrame) -> Result<Vec<u8>> {
    let data = rmp_serde::to_vec_named(frame)
        .map_err(|e| BookError::SerializationError(format!("Failed to serialize: {}", e)))?;

    let len = u32::try_from(data.len())
        .map_err(|_| BookError::SerializationError("Frame too large".to_string()))?
        .to_be_bytes();
    let mut message = Vec::with_capacity(4 + data.len());
    message.extend_from_slice(&len);
    message.extend_from_slice(&data);
    Ok(message)
}

/// Publisher for sending render frames via Unix socket
pub struct Publisher {
    socket_path: String,
    stream: Mutex<Option<UnixStream>>,
}

impl Publisher {
    /// Create a new publisher
    pub async fn new(socket_path: &str) -> Result<Self> {
        let publisher = Self {
            socket_path: socket_path.to_string(),
            stream: Mutex::new(None),
        };

        // The display may start later; publish retries the connection
        if let Err(e) = publisher.connect().await {
            warn!(error = %e, "Initial IPC connection failed, will retry on publish");
        }

        Ok(publisher)
    }

    /// Connect to the Unix socket
    async fn connect(&self) -> Result<()> {
        let path = Path::new(&self.socket_path);

        if !path.exists() {
            return Err(BookError::IpcError(format!(
                "Socket path does not exist: {}",
                self.socket_path
            )));
        }

        let stream = UnixStream::connect(path).await.map_err(|e| {
            BookError::IpcError(format!("Failed to connect to {}: {}", self.socket_path, e))
        })?;

        *self.stream.lock().await = Some(stream);

        info!(path = %self.socket_path, "Connected to IPC socket");
        Ok(())
    }

    pub async fn is_connected(&self) -> bool {
        self.stream.lock().await.is_some()
    }

    /// Publish one frame.
    ///
    /// Delivery failures are logged and swallowed; only encoding errors are returned.
    pub async fn publish(&self, frame: &RenderFrame) -> Result<()> {
        let message = encode_frame(frame)?;

        if !self.is_connected().await {
            if let Err(e) = self.connect().await {
                debug!(error = %e, "Failed to reconnect to IPC socket");
                return Ok(());
            }
        }

        let mut guard = self.stream.lock().await;
        if let Some(stream) = guard.as_mut() {
            match stream.write_all(&message).await {
                Ok(()) => {
                    debug!(
                        symbol = %frame.symbol,
                        bands = frame.view.len(),
                        "Published render frame"
                    );
                }
                Err(e) => {
                    warn!(error = %e, "Failed to write to IPC socket");
                    *guard = None; // Mark as disconnected
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::{Band, BandedView};
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use tokio::io::AsyncReadExt;
    use tokio::net::UnixListener;

    fn frame() -> RenderFrame {
        RenderFrame {
            symbol: "BTCUSDT".to_string(),
            taken_at: Utc::now(),
            mid_price: dec!(50000.5),
            view: BandedView {
                step: dec!(10),
                bands: vec![Band {
                    price: dec!(50000),
                    bid_quantity: dec!(1.5),
                    ask_quantity: dec!(2.25),
                }],
            },
        }
    }

    #[test]
    fn test_encode_frame_prefixes_length() {
        let message = encode_frame(&frame()).unwrap();
        let len = u32::from_be_bytes([message[0], message[1], message[2], message[3]]) as usize;
        assert_eq!(len, message.len() - 4);
    }

    #[tokio::test]
    async fn test_publish_delivers_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("heatmap.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let publisher = Publisher::new(path.to_str().unwrap()).await.unwrap();
        let (mut server, _) = listener.accept().await.unwrap();
        assert!(publisher.is_connected().await);

        let sent = frame();
        publisher.publish(&sent).await.unwrap();

        let mut len = [0u8; 4];
        server.read_exact(&mut len).await.unwrap();
        let mut body = vec![0u8; u32::from_be_bytes(len) as usize];
        server.read_exact(&mut body).await.unwrap();

        let received: RenderFrame = rmp_serde::from_slice(&body).unwrap();
        assert_eq!(received, sent);
    }

    #[tokio::test]
    async fn test_publish_without_listener_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.sock");

        let publisher = Publisher::new(path.to_str().unwrap()).await.unwrap();
        assert!(!publisher.is_connected().await);
        publisher.publish(&frame()).await.unwrap();
        assert!(!publisher.is_connected().await);
    }
}

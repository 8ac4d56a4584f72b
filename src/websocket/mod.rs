//! Depth stream connection and replica maintenance

mod client;
mod manager;

pub use client::{depth_stream_url, WebSocketClient};
pub use manager::{backoff_delay, next_attempt, FeedManager};

//! Parser module for Binance depth messages
//!
//! Numeric strings are validated here, at the boundary. A depth update with any
//! unparsable field is rejected whole, never partially applied.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::str::FromStr;

use crate::error::{BookError, Result};
use crate::orderbook::{DeltaBatch, PriceLevel};

/// Binance diff depth event
#[derive(Debug, Clone, Deserialize)]
pub struct DepthUpdate {
    /// Event type
    #[serde(rename = "e", default)]
    pub event_type: Option<String>,

    /// Event time (milliseconds)
    #[serde(rename = "E", default)]
    pub event_time: Option<u64>,

    /// Symbol
    #[serde(rename = "s", default)]
    pub symbol: Option<String>,

    /// First update ID in event
    #[serde(rename = "U", default)]
    pub first_update_id: Option<u64>,

    /// Final update ID in event
    #[serde(rename = "u", default)]
    pub final_update_id: Option<u64>,

    /// Bids to update
    #[serde(rename = "b", deserialize_with = "deserialize_price_levels")]
    pub bids: Vec<PriceLevel>,

    /// Asks to update
    #[serde(rename = "a", deserialize_with = "deserialize_price_levels")]
    pub asks: Vec<PriceLevel>,
}

impl DepthUpdate {
    /// Consume the event into the batch applied to the replica
    pub fn into_batch(self) -> DeltaBatch {
        DeltaBatch::new(self.bids, self.asks)
    }
}

/// Order book snapshot from REST API, kept as raw strings for the loader
#[derive(Debug, Clone, Deserialize)]
pub struct DepthSnapshot {
    /// Last update ID
    #[serde(rename = "lastUpdateId", default)]
    pub last_update_id: Option<u64>,

    pub bids: Vec<(String, String)>,

    pub asks: Vec<(String, String)>,
}

impl DepthSnapshot {
    /// Decode a REST depth response body
    pub fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| BookError::SnapshotUnavailable(e.to_string()))
    }
}

/// Parsed WebSocket message
#[derive(Debug, Clone)]
pub enum ParsedMessage {
    DepthUpdate(DepthUpdate),
    /// Anything without both `b` and `a`: subscription acks, other streams
    Unknown(String),
}

impl ParsedMessage {
    /// Parse a raw WebSocket message.
    ///
    /// Accepts raw events and combined-stream wrappers (`{"stream": .., "data": ..}`).
    pub fn parse(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw)?;

        let payload = match (value.get("stream"), value.get("data")) {
            (Some(_), Some(data)) => data,
            _ => &value,
        };

        if payload.get("b").is_none() || payload.get("a").is_none() {
            return Ok(ParsedMessage::Unknown(raw.to_string()));
        }

        // Trade events also carry "b"/"a" (order ids)
        if let Some(event) = payload.get("e").and_then(Value::as_str) {
            if event != "depthUpdate" {
                return Ok(ParsedMessage::Unknown(raw.to_string()));
            }
        }

        let depth = DepthUpdate::deserialize(payload)
            .map_err(|e| BookError::MalformedDelta(e.to_string()))?;
        Ok(ParsedMessage::DepthUpdate(depth))
    }
}

/// Parse one `[price, quantity]` pair of strings
fn parse_level(pair: &[String]) -> std::result::Result<PriceLevel, String> {
    if pair.len() != 2 {
        return Err(format!("Invalid price level format: {:?}", pair));
    }
    let price =
        Decimal::from_str(pair[0].trim()).map_err(|e| format!("price {:?}: {}", pair[0], e))?;
    let quantity =
        Decimal::from_str(pair[1].trim()).map_err(|e| format!("quantity {:?}: {}", pair[1], e))?;

    let negative = |v: &Decimal| v.is_sign_negative() && !v.is_zero();
    if negative(&price) || negative(&quantity) {
        return Err(format!("negative value in level {:?}", pair));
    }

    Ok(PriceLevel { price, quantity })
}

/// Custom deserializer for price levels from array of string pairs
fn deserialize_price_levels<'de, D>(
    deserializer: D,
) -> std::result::Result<Vec<PriceLevel>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<Vec<String>> = Deserialize::deserialize(deserializer)?;
    raw.iter()
        .map(|pair| parse_level(pair).map_err(serde::de::Error::custom))
        .collect()
}

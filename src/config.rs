//! Configuration module for the depth heatmap

use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{BookError, Result};
use crate::orderbook::{aggregate, bucket_count, OrderBookReplica};

/// Smallest bucket width accepted, the finest exchange tick (1e-8)
fn min_step() -> Decimal {
    Decimal::new(1, 8)
}

/// Price window the heatmap covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BandRange {
    /// Fixed `[lower, upper]` window
    Fixed { lower: Decimal, upper: Decimal },
    /// `mid_price ± range`, recomputed every render cycle
    AroundMid { range: Decimal },
}

/// Bucketing parameters consumed by the aggregator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandConfig {
    /// Bucket width in quote currency
    pub step: Decimal,
    pub range: BandRange,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Trading symbol (e.g. "BTCUSDT")
    pub symbol: String,

    /// WebSocket endpoint for Binance
    pub ws_endpoint: String,

    /// REST API endpoint for snapshots
    pub rest_endpoint: String,

    /// Depth limit requested from the snapshot endpoint
    pub snapshot_depth: usize,

    pub band: BandConfig,

    /// Render cadence in milliseconds
    pub render_interval_ms: u64,

    /// Base reconnection delay
    pub reconnect_delay_ms: u64,

    /// Port for /health and /metrics
    pub health_port: u16,

    /// IPC socket path for publishing render frames, if any
    pub ipc_socket_path: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from any key lookup; used by `load` and tests
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let symbol = lookup("SYMBOL")
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.symbol);

        let step = parse_or(&lookup, "BAND_STEP", defaults.band.step)?;
        if step <= Decimal::ZERO {
            return Err(BookError::ConfigError(format!(
                "BAND_STEP must be positive, got {}",
                step
            )));
        }
        if step < min_step() {
            return Err(BookError::ConfigError(format!(
                "BAND_STEP must be at least {}, got {}",
                min_step(),
                step
            )));
        }

        let range = match (lookup("BAND_LOWER"), lookup("BAND_UPPER")) {
            (Some(lower), Some(upper)) => {
                let lower = parse_value::<Decimal>("BAND_LOWER", &lower)?;
                let upper = parse_value::<Decimal>("BAND_UPPER", &upper)?;
                if lower > upper {
                    return Err(BookError::ConfigError(format!(
                        "BAND_LOWER ({}) is above BAND_UPPER ({})",
                        lower, upper
                    )));
                }
                aggregate(&OrderBookReplica::new(), lower, upper, step)
                    .map_err(|e| BookError::ConfigError(format!("BAND_LOWER/BAND_UPPER: {}", e)))?;
                BandRange::Fixed { lower, upper }
            }
            (None, None) => {
                let range = parse_or(&lookup, "BAND_RANGE", Decimal::from(2000))?;
                if range < Decimal::ZERO {
                    return Err(BookError::ConfigError(format!(
                        "BAND_RANGE must not be negative, got {}",
                        range
                    )));
                }
                range
                    .checked_mul(Decimal::from(2))
                    .ok_or_else(|| {
                        BookError::ConfigError(format!("BAND_RANGE {} is too large", range))
                    })
                    .and_then(|width| {
                        bucket_count(width, step)
                            .map_err(|e| BookError::ConfigError(format!("BAND_RANGE: {}", e)))
                    })?;
                BandRange::AroundMid { range }
            }
            _ => {
                return Err(BookError::ConfigError(
                    "BAND_LOWER and BAND_UPPER must be set together".to_string(),
                ))
            }
        };

        Ok(Self {
            symbol,
            ws_endpoint: lookup("WS_ENDPOINT").unwrap_or(defaults.ws_endpoint),
            rest_endpoint: lookup("REST_ENDPOINT").unwrap_or(defaults.rest_endpoint),
            snapshot_depth: parse_or(&lookup, "SNAPSHOT_DEPTH", defaults.snapshot_depth)?,
            band: BandConfig { step, range },
            render_interval_ms: parse_or(
                &lookup,
                "RENDER_INTERVAL_MS",
                defaults.render_interval_ms,
            )?,
            reconnect_delay_ms: parse_or(
                &lookup,
                "RECONNECT_DELAY_MS",
                defaults.reconnect_delay_ms,
            )?,
            health_port: parse_or(&lookup, "HEALTH_PORT", defaults.health_port)?,
            ipc_socket_path: lookup("IPC_SOCKET_PATH").filter(|p| !p.is_empty()),
        })
    }

    pub fn render_interval(&self) -> Duration {
        Duration::from_millis(self.render_interval_ms.max(1))
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| BookError::ConfigError(format!("{}={:?}: {}", key, raw, e)))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            symbol: "BTCUSDT".to_string(),
            ws_endpoint: "wss://stream.binance.com:9443/ws".to_string(),
            rest_endpoint: "https://api.binance.com/api/v3".to_string(),
            snapshot_depth: 5000,
            band: BandConfig {
                step: Decimal::from(10),
                range: BandRange::AroundMid {
                    range: Decimal::from(2000),
                },
            },
            render_interval_ms: 2000,
            reconnect_delay_ms: 1000,
            health_port: 9090,
            ipc_socket_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config.symbol, "BTCUSDT");
        assert_eq!(config.snapshot_depth, 5000);
        assert_eq!(config.band.step, dec!(10));
        assert_eq!(config.band.range, BandRange::AroundMid { range: dec!(2000) });
        assert!(config.ipc_socket_path.is_none());
    }

    #[test]
    fn test_fixed_range_takes_precedence() {
        let config = Config::from_lookup(lookup_from(&[
            ("SYMBOL", " ethusdt "),
            ("BAND_STEP", "0.5"),
            ("BAND_RANGE", "100"),
            ("BAND_LOWER", "3000"),
            ("BAND_UPPER", "3100"),
        ]))
        .unwrap();

        assert_eq!(config.symbol, "ETHUSDT");
        assert_eq!(config.band.step, dec!(0.5));
        assert_eq!(
            config.band.range,
            BandRange::Fixed {
                lower: dec!(3000),
                upper: dec!(3100)
            }
        );
    }

    #[test]
    fn test_rejects_non_positive_step() {
        let err = Config::from_lookup(lookup_from(&[("BAND_STEP", "0")])).unwrap_err();
        assert!(matches!(err, BookError::ConfigError(_)));
    }

    #[test]
    fn test_rejects_windows_that_cannot_be_bucketed() {
        for pairs in [
            &[("BAND_STEP", "0.0000000000000000000000001")][..],
            &[("BAND_STEP", "0.001"), ("BAND_RANGE", "2000")][..],
            &[("BAND_RANGE", "79228162514264337593543950335")][..],
            &[("BAND_STEP", "1"), ("BAND_LOWER", "0"), ("BAND_UPPER", "1000000")][..],
        ] {
            let err = Config::from_lookup(lookup_from(pairs)).unwrap_err();
            assert!(matches!(err, BookError::ConfigError(_)), "{:?}", pairs);
        }

        // 2 * 2000 / 0.1 + 1 buckets is still within bounds
        let config =
            Config::from_lookup(lookup_from(&[("BAND_STEP", "0.1"), ("BAND_RANGE", "2000")]))
                .unwrap();
        assert_eq!(config.band.step, dec!(0.1));
    }

    #[test]
    fn test_rejects_half_fixed_range() {
        let err = Config::from_lookup(lookup_from(&[("BAND_LOWER", "100")])).unwrap_err();
        assert!(matches!(err, BookError::ConfigError(_)));
    }

    #[test]
    fn test_rejects_garbage_numbers() {
        let err =
            Config::from_lookup(lookup_from(&[("RENDER_INTERVAL_MS", "soon")])).unwrap_err();
        assert!(matches!(err, BookError::ConfigError(_)));
    }
}

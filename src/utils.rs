//! Utility functions and helpers
//!
//! Logging setup, time helpers and hex parsing shared by the binary and the
//! backend.

use crate::config::LogFormat;
use crate::{Error, Result};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer};

/// Install the global tracing subscriber
///
/// `RUST_LOG` overrides `level` when it is set.
pub fn init_logging(level: tracing::Level, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(LevelFilter::from_level(level).into()));

    let layer = match format {
        LogFormat::Compact => fmt::layer().compact().with_target(false).boxed(),
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
        LogFormat::Json => fmt::layer().json().with_current_span(false).boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .try_init()
        .map_err(|e| Error::config(format!("Failed to initialise logging: {}", e)))
}

/// Serde adapter writing durations the way humans type them ("10m", "30s")
pub mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

/// Get current timestamp in seconds since Unix epoch
pub fn current_timestamp_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Current time as a Boost header timestamp
///
/// Headers carry 32-bit seconds; saturates after 2106.
pub fn header_timestamp() -> u32 {
    u32::try_from(current_timestamp_secs()).unwrap_or(u32::MAX)
}

/// Format duration as a human-readable string
pub fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else if seconds < 86400 {
        let hours = seconds / 3600;
        let minutes = (seconds % 3600) / 60;
        let secs = seconds % 60;
        format!("{}h {}m {}s", hours, minutes, secs)
    } else {
        let days = seconds / 86400;
        let hours = (seconds % 86400) / 3600;
        format!("{}d {}h", days, hours)
    }
}

/// Validate hex string format
pub fn validate_hex_string(s: &str, expected_len: Option<usize>) -> Result<()> {
    if let Some(len) = expected_len {
        if s.len() != len {
            return Err(Error::script(format!(
                "Expected {} hex characters, got {}",
                len,
                s.len()
            )));
        }
    }

    if s.len() % 2 != 0 {
        return Err(Error::script("Hex string has an odd number of characters"));
    }

    if !s.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::script("String contains non-hexadecimal characters"));
    }

    Ok(())
}

/// Convert hex string to bytes, tolerating surrounding whitespace and a `0x` prefix
pub fn hex_to_bytes(hex: &str) -> Result<Vec<u8>> {
    let hex = hex.trim();
    let hex = hex.strip_prefix("0x").unwrap_or(hex);
    validate_hex_string(hex, None)?;
    hex::decode(hex).map_err(|e| Error::script(format!("Invalid hex: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Wrapper {
        #[serde(with = "humantime_duration")]
        interval: Duration,
    }

    #[test]
    fn test_humantime_duration_serde() {
        let w = Wrapper {
            interval: Duration::from_secs(90),
        };
        let json = serde_json::to_string(&w).unwrap();
        assert_eq!(json, r#"{"interval":"1m 30s"}"#);
        assert_eq!(serde_json::from_str::<Wrapper>(&json).unwrap(), w);

        let yaml: Wrapper = serde_yaml::from_str("interval: 10m").unwrap();
        assert_eq!(yaml.interval, Duration::from_secs(600));
        assert!(serde_json::from_str::<Wrapper>(r#"{"interval":"soon"}"#).is_err());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(30), "30s");
        assert_eq!(format_duration(90), "1m 30s");
        assert_eq!(format_duration(3661), "1h 1m 1s");
        assert_eq!(format_duration(90000), "1d 1h");
    }

    #[test]
    fn test_validate_hex_string() {
        assert!(validate_hex_string("deadbeef", Some(8)).is_ok());
        assert!(validate_hex_string("DEADBEEF", Some(8)).is_ok());
        assert!(validate_hex_string("deadbeef", Some(10)).is_err());
        assert!(validate_hex_string("deadbzzf", None).is_err());
        assert!(validate_hex_string("abc", None).is_err());
    }

    #[test]
    fn test_hex_to_bytes() {
        assert_eq!(hex_to_bytes("deadbeef").unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(hex_to_bytes(" 0x00ff\n").unwrap(), vec![0x00, 0xff]);
        assert!(hex_to_bytes("0xg0").is_err());
    }

    #[test]
    fn test_current_timestamp() {
        let ts = current_timestamp_secs();
        assert!(ts > 1_600_000_000);
        assert!(header_timestamp() as u64 >= ts);
    }
}

//! Simple TOML parser for device configuration
//!
//! This is a minimal TOML parser that handles only the subset needed for
//! `livepixel.toml`. It does NOT support the full TOML spec.
//!
//! Supported features:
//! - Key = value pairs (string, integer)
//! - [section] headers
//! - Comments (# ...)
//!
//! NOT supported:
//! - Arrays and inline tables
//! - Multi-line strings
//! - Dotted keys

use heapless::String;
use livepixel_protocol::{CanvasDim, Color565, Endpoint, EndpointError};

use super::types::{
    CanvasConfig, DeviceConfig, PipelineConfig, SessionConfig, WifiConfig, MIN_QUEUE_CAPACITY,
};
use crate::pipeline::MAX_RENDER_BATCH;
use crate::queue::QUEUE_SLOTS;

/// Parse error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Unknown or malformed section header
    InvalidSection,
    /// Value has the wrong type or is out of range
    InvalidValue,
    /// String longer than its fixed buffer
    TooLong,
    /// `[server] url` is required
    MissingUrl,
    /// `[server] url` is not a valid `ws://` URL
    InvalidUrl(EndpointError),
    /// `[canvas] dim` must be 32 or 64
    InvalidDim,
    /// `[pipeline] queue_capacity` must be in 256..=4096
    InvalidCapacity,
}

/// Current parsing context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Root,
    Wifi,
    Server,
    Canvas,
    Pipeline,
}

/// Parse TOML configuration into DeviceConfig
pub fn parse_config(input: &str) -> Result<DeviceConfig, ConfigError> {
    let mut section = Section::Root;
    let mut wifi = WifiConfig::default();
    let mut endpoint: Option<Endpoint> = None;
    let mut canvas = CanvasConfig::default();
    let mut pipeline = PipelineConfig::default();

    for line in input.lines() {
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.starts_with('[') && line.ends_with(']') {
            section = parse_section_header(&line[1..line.len() - 1])?;
            continue;
        }

        let Some((key, value)) = parse_key_value(line) else {
            continue;
        };

        match section {
            Section::Root => {
                debug!("ignoring top-level key {}", key);
            }
            Section::Wifi => match key {
                "ssid" => wifi.ssid = parse_bounded(value)?,
                "password" => wifi.password = parse_bounded(value)?,
                _ => debug!("ignoring wifi key {}", key),
            },
            Section::Server => match key {
                "url" => {
                    let url = parse_string(value)?;
                    endpoint = Some(Endpoint::parse(url).map_err(ConfigError::InvalidUrl)?);
                }
                _ => debug!("ignoring server key {}", key),
            },
            Section::Canvas => match key {
                "dim" => {
                    canvas.dim =
                        CanvasDim::from_cells(parse_int(value)?).ok_or(ConfigError::InvalidDim)?;
                }
                "size_px" => canvas.size_px = parse_nonzero(value)?,
                "background" => {
                    canvas.background = Color565::from_hex(parse_string(value)?)
                        .ok_or(ConfigError::InvalidValue)?;
                }
                _ => debug!("ignoring canvas key {}", key),
            },
            Section::Pipeline => match key {
                "queue_capacity" => {
                    let capacity: usize = parse_int(value)?;
                    if !(MIN_QUEUE_CAPACITY..=QUEUE_SLOTS).contains(&capacity) {
                        return Err(ConfigError::InvalidCapacity);
                    }
                    pipeline.queue_capacity = capacity;
                }
                "reconnect_interval_ms" => pipeline.reconnect_interval_ms = parse_nonzero(value)?,
                "direct_draw_threshold" => pipeline.direct_draw_threshold = parse_int(value)?,
                "render_batch" => {
                    let batch: usize = parse_nonzero(value)?;
                    if batch > MAX_RENDER_BATCH {
                        return Err(ConfigError::InvalidValue);
                    }
                    pipeline.render_batch = batch;
                }
                "yield_interval_ms" => pipeline.yield_interval_ms = parse_nonzero(value)?,
                "poll_interval_ms" => pipeline.poll_interval_ms = parse_nonzero(value)?,
                _ => debug!("ignoring pipeline key {}", key),
            },
        }
    }

    let endpoint = endpoint.ok_or(ConfigError::MissingUrl)?;

    Ok(DeviceConfig {
        wifi,
        session: SessionConfig {
            endpoint,
            canvas,
            pipeline,
        },
    })
}

fn parse_section_header(header: &str) -> Result<Section, ConfigError> {
    match header.trim() {
        "wifi" => Ok(Section::Wifi),
        "server" => Ok(Section::Server),
        "canvas" => Ok(Section::Canvas),
        "pipeline" => Ok(Section::Pipeline),
        _ => Err(ConfigError::InvalidSection),
    }
}

/// Split `key = value`, dropping a trailing comment outside quotes
fn parse_key_value(line: &str) -> Option<(&str, &str)> {
    let eq_pos = line.find('=')?;
    let key = line[..eq_pos].trim();
    let value = line[eq_pos + 1..].trim();

    // Remove inline comments
    let value = if let Some(hash_pos) = value.find('#') {
        // Make sure # is not inside a string
        let quote_count = value[..hash_pos].matches('"').count();
        if quote_count % 2 == 0 {
            value[..hash_pos].trim()
        } else {
            value
        }
    } else {
        value
    };

    if key.is_empty() || value.is_empty() {
        return None;
    }

    Some((key, value))
}

fn parse_string(value: &str) -> Result<&str, ConfigError> {
    if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
        Ok(&value[1..value.len() - 1])
    } else {
        // Allow unquoted strings for simple values
        Ok(value)
    }
}

fn parse_bounded<const N: usize>(value: &str) -> Result<String<N>, ConfigError> {
    String::try_from(parse_string(value)?).map_err(|_| ConfigError::TooLong)
}

fn parse_int<T: core::str::FromStr>(value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue)
}

fn parse_nonzero<T: core::str::FromStr + PartialEq + Default>(
    value: &str,
) -> Result<T, ConfigError> {
    let parsed: T = parse_int(value)?;
    if parsed == T::default() {
        return Err(ConfigError::InvalidValue);
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
# Live pixel device configuration

[wifi]
ssid = "pixelnet"
password = "hunter22"   # not a real one

[server]
url = "ws://192.168.1.208:8080/ws"

[canvas]
dim = 64
size_px = 128
background = "0000"

[pipeline]
queue_capacity = 2048
reconnect_interval_ms = 3000
render_batch = 16
"#;

    #[test]
    fn test_parse_sample() {
        let config = parse_config(SAMPLE).unwrap();

        assert_eq!(config.wifi.ssid.as_str(), "pixelnet");
        assert_eq!(config.wifi.password.as_str(), "hunter22");

        let session = config.session;
        assert_eq!(session.endpoint.host(), "192.168.1.208");
        assert_eq!(session.endpoint.port(), 8080);
        assert_eq!(session.endpoint.path(), "/ws");
        assert_eq!(session.canvas.dim, CanvasDim::D64);
        assert_eq!(session.canvas.background, Color565::BLACK);
        assert_eq!(session.pipeline.queue_capacity, 2048);
        assert_eq!(session.pipeline.reconnect_interval_ms, 3000);
        assert_eq!(session.pipeline.render_batch, 16);
        // Untouched keys keep their defaults
        assert_eq!(session.pipeline.direct_draw_threshold, 50);
        assert_eq!(session.pipeline.yield_interval_ms, 50);
    }

    #[test]
    fn test_defaults_with_only_url() {
        let config = parse_config("[server]\nurl = \"ws://pixels.local\"\n").unwrap();
        assert_eq!(config.session.canvas, CanvasConfig::default());
        assert_eq!(config.session.pipeline, PipelineConfig::default());
        assert!(config.wifi.ssid.is_empty());
    }

    #[test]
    fn test_missing_url() {
        assert_eq!(
            parse_config("[canvas]\ndim = 32\n"),
            Err(ConfigError::MissingUrl)
        );
    }

    #[test]
    fn test_invalid_values() {
        assert_eq!(
            parse_config("[server]\nurl = \"http://x/\"\n"),
            Err(ConfigError::InvalidUrl(EndpointError::UnsupportedScheme))
        );
        assert_eq!(
            parse_config("[canvas]\ndim = 48\n"),
            Err(ConfigError::InvalidDim)
        );
        assert_eq!(
            parse_config("[pipeline]\nqueue_capacity = 5000\n"),
            Err(ConfigError::InvalidCapacity)
        );
        assert_eq!(
            parse_config("[pipeline]\nqueue_capacity = 0\n"),
            Err(ConfigError::InvalidCapacity)
        );
        assert_eq!(
            parse_config("[pipeline]\nqueue_capacity = 255\n"),
            Err(ConfigError::InvalidCapacity)
        );
        assert_eq!(
            parse_config("[pipeline]\nrender_batch = 65\n"),
            Err(ConfigError::InvalidValue)
        );
        assert_eq!(
            parse_config("[pipeline]\nreconnect_interval_ms = 0\n"),
            Err(ConfigError::InvalidValue)
        );
        assert_eq!(
            parse_config("[canvas]\nbackground = \"purple\"\n"),
            Err(ConfigError::InvalidValue)
        );
        assert_eq!(
            parse_config("[display]\n"),
            Err(ConfigError::InvalidSection)
        );
    }

    #[test]
    fn test_parse_key_value() {
        assert_eq!(parse_key_value("dim = 32"), Some(("dim", "32")));
        assert_eq!(parse_key_value("dim = 32 # cells"), Some(("dim", "32")));
        assert_eq!(
            parse_key_value("ssid = \"a#b\""),
            Some(("ssid", "\"a#b\""))
        );
        assert_eq!(parse_key_value("dim ="), None);
        assert_eq!(parse_key_value("no equals"), None);
    }

    #[test]
    fn test_string_too_long() {
        let mut input: String<128> = String::new();
        input.push_str("[wifi]\nssid = \"").unwrap();
        for _ in 0..40 {
            input.push('x').unwrap();
        }
        input.push_str("\"\n").unwrap();

        assert_eq!(parse_config(&input), Err(ConfigError::TooLong));
    }
}

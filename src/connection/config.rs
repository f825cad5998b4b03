use std::fmt;
use std::time::Duration;
use url::Url;
use crate::{Error, Result};
use crate::flow::TokenBucketConfig;
use crate::protocol::{DEFAULT_WINDOW_SIZE, MAX_CHUNK_HEADER_SIZE, MAX_CHUNK_SIZE, MIN_CHUNK_SIZE};

#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Connection timeout
    pub connect_timeout: Duration,

    /// Outgoing chunk size, announced at start when not the protocol default
    pub chunk_size: u32,

    /// Window acknowledgement size
    pub window_ack_size: u32,

    /// Egress limit; `None` sends as fast as the transport accepts
    pub egress: Option<TokenBucketConfig>,

    /// Pause between retries while the peer's window is full
    pub backpressure_retry_interval: Duration,

    /// Largest single read from the transport
    pub receive_buffer_size: usize,

    /// Outbound queue limit
    pub max_pending_messages: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            connect_timeout: Duration::from_secs(10),
            chunk_size: 4096,
            window_ack_size: DEFAULT_WINDOW_SIZE,
            egress: None,
            backpressure_retry_interval: Duration::from_millis(10),
            receive_buffer_size: 4096,
            max_pending_messages: 1000,
        }
    }
}

impl ConnectionConfig {
    /// Create config builder
    pub fn builder() -> ConnectionConfigBuilder {
        ConnectionConfigBuilder::new()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&self.chunk_size) {
            return Err(Error::ChunkSizeRejected {
                requested: self.chunk_size,
                min: MIN_CHUNK_SIZE,
                max: MAX_CHUNK_SIZE,
            });
        }

        if self.window_ack_size == 0 {
            return Err(Error::config("Window acknowledgement size must be positive"));
        }

        if self.receive_buffer_size == 0 {
            return Err(Error::config("Receive buffer size must be positive"));
        }

        if self.max_pending_messages == 0 {
            return Err(Error::config("Pending message limit must be positive"));
        }

        if let Some(egress) = &self.egress {
            check_bucket_fits_chunk(egress, self.chunk_size)?;
        }

        Ok(())
    }
}

/// The egress bucket has to admit one full chunk with its largest header,
/// otherwise the sender could never make progress
pub(crate) fn check_bucket_fits_chunk(egress: &TokenBucketConfig, chunk_size: u32) -> Result<()> {
    let needed = chunk_size as u64 + MAX_CHUNK_HEADER_SIZE as u64;
    if egress.capacity < needed {
        return Err(Error::config(format!(
            "Token bucket capacity {} cannot hold a {} byte chunk ({} bytes needed)",
            egress.capacity, chunk_size, needed
        )));
    }
    if egress.refill_per_second <= 0.0 {
        return Err(Error::config("Token bucket refill rate must be positive"));
    }
    Ok(())
}

/// Builder for ConnectionConfig
pub struct ConnectionConfigBuilder {
    config: ConnectionConfig,
}

impl ConnectionConfigBuilder {
    /// Create new builder
    pub fn new() -> Self {
        ConnectionConfigBuilder {
            config: ConnectionConfig::default(),
        }
    }

    /// Set connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set chunk size
    pub fn chunk_size(mut self, size: u32) -> Self {
        self.config.chunk_size = size;
        self
    }

    pub fn window_ack_size(mut self, size: u32) -> Self {
        self.config.window_ack_size = size;
        self
    }

    /// Limit egress to `refill_per_second` bytes with bursts of `capacity`
    pub fn egress_limit(mut self, capacity: u64, refill_per_second: f64) -> Self {
        self.config.egress = Some(TokenBucketConfig::new(capacity, refill_per_second));
        self
    }

    pub fn backpressure_retry_interval(mut self, interval: Duration) -> Self {
        self.config.backpressure_retry_interval = interval;
        self
    }

    pub fn receive_buffer_size(mut self, size: usize) -> Self {
        self.config.receive_buffer_size = size;
        self
    }

    pub fn max_pending_messages(mut self, limit: usize) -> Self {
        self.config.max_pending_messages = limit;
        self
    }

    /// Build configuration
    pub fn build(self) -> Result<ConnectionConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConnectionConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Where to connect, as parsed from an `rtmp://` or `rtmps://` URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportTarget {
    pub host: String,
    pub port: u16,
    pub tls: bool,
}

impl TransportTarget {
    pub fn parse(url: &str) -> Result<Self> {
        // Parse URL
        let parsed = Url::parse(url)
            .map_err(|e| Error::config(format!("Invalid URL: {}", e)))?;

        // Validate scheme
        let (tls, default_port) = match parsed.scheme() {
            "rtmp" => (false, 1935),
            "rtmps" => (true, 443),
            scheme => return Err(Error::config(format!("Unsupported scheme: {}", scheme))),
        };

        let host = parsed.host_str()
            .ok_or_else(|| Error::config("Missing host in URL"))?;

        Ok(TransportTarget {
            host: host.to_string(),
            port: parsed.port().unwrap_or(default_port),
            tls,
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for TransportTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = if self.tls { "rtmps" } else { "rtmp" };
        write!(f, "{}://{}:{}", scheme, self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ConnectionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.window_ack_size, 2_500_000);
        assert_eq!(config.backpressure_retry_interval, Duration::from_millis(10));
    }

    #[test]
    fn test_builder_rejects_bad_chunk_size() {
        let err = ConnectionConfig::builder().chunk_size(0).build().unwrap_err();
        assert!(matches!(err, Error::ChunkSizeRejected { requested: 0, .. }));
    }

    #[test]
    fn test_builder_rejects_small_bucket() {
        let result = ConnectionConfig::builder()
            .chunk_size(4096)
            .egress_limit(4096, 1_000_000.0)
            .build();
        assert!(result.is_err());

        let config = ConnectionConfig::builder()
            .chunk_size(4096)
            .egress_limit(4096 + 18, 1_000_000.0)
            .build()
            .unwrap();
        assert_eq!(config.egress.unwrap().capacity, 4114);
    }

    #[test]
    fn test_builder_rejects_zero_window() {
        assert!(ConnectionConfig::builder().window_ack_size(0).build().is_err());
    }

    #[test]
    fn test_parse_targets() {
        let plain = TransportTarget::parse("rtmp://live.example.com/app/key").unwrap();
        assert_eq!(plain, TransportTarget { host: "live.example.com".into(), port: 1935, tls: false });

        let secure = TransportTarget::parse("rtmps://live.example.com/app").unwrap();
        assert_eq!(secure.port, 443);
        assert!(secure.tls);

        let custom = TransportTarget::parse("rtmp://127.0.0.1:19350/live").unwrap();
        assert_eq!(custom.address(), "127.0.0.1:19350");
    }

    #[test]
    fn test_parse_rejects_other_schemes() {
        assert!(TransportTarget::parse("http://example.com/live").is_err());
        assert!(TransportTarget::parse("not a url").is_err());
    }
}

use std::time::Duration;

/// Default TCP port of the SCPI control channel.
pub const DEFAULT_PORT: u16 = 5555;

#[derive(Debug, Clone)]
pub struct Config {
    /// Deadline of the connection attempt that checks the instrument is reachable.
    pub probe_timeout: Duration,
    pub write_timeout: Duration,
    /// Deadline of every single read, both for replies and for each part of a block.
    pub read_timeout: Duration,
    /// Pause between two `*OPC?` polls that were answered with something other than `1`.
    pub poll_interval: Duration,
    /// Upper bound on the time spent waiting for the instrument to become ready.
    /// `None` polls forever.
    pub ready_timeout: Option<Duration>,
    /// Largest block payload that will be accepted.
    pub max_block_len: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_secs(2),
            write_timeout: Duration::from_secs(1),
            read_timeout: Duration::from_secs(1),
            poll_interval: Duration::from_millis(100),
            ready_timeout: Some(Duration::from_secs(30)),
            max_block_len: 32 * 1024 * 1024,
        }
    }
}

/// Builder to create a [Config] and modify individual options
///
/// # Example
///
/// ```
/// use scope_client::config::Builder;
/// use std::time::Duration;
///
/// let config = Builder::new()
///     .read_timeout(Duration::from_secs(2))
///     .ready_timeout(None)
///     .build();
/// assert_eq!(config.read_timeout, Duration::from_secs(2));
/// ```
#[derive(Default)]
pub struct Builder {
    config: Config,
}

impl Builder {
    pub fn new() -> Builder {
        Builder::default()
    }

    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.config.probe_timeout = timeout;
        self
    }

    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.config.write_timeout = timeout;
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Bound the readiness wait, or wait forever with `None`.
    pub fn ready_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.ready_timeout = timeout;
        self
    }

    pub fn max_block_len(mut self, len: usize) -> Self {
        self.config.max_block_len = len;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

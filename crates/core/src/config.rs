use std::time::Duration;

const DEFAULT_SWITCH_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_MESSAGE_LEN: usize = 2000;

/// Builder for [`StoreConfig`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct StoreConfigBuilder {
    switch_timeout: Option<Duration>,
    send_timeout: Option<Duration>,
    refresh_timeout: Option<Duration>,
    max_message_len: Option<usize>,
}

impl StoreConfigBuilder {
    /// Creates a builder with every option at its default.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how long switching conversations may take.
    #[inline]
    pub fn with_switch_timeout(mut self, timeout: Duration) -> Self {
        self.switch_timeout = Some(timeout);
        self
    }

    /// Sets how long sending a message may take.
    #[inline]
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = Some(timeout);
        self
    }

    /// Sets how long refreshing the conversation list may take. Defaults
    /// to the switch timeout.
    #[inline]
    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = Some(timeout);
        self
    }

    /// Sets the maximum message length, in characters.
    #[inline]
    pub fn with_max_message_len(mut self, len: usize) -> Self {
        self.max_message_len = Some(len);
        self
    }

    /// Builds the configuration.
    #[inline]
    pub fn build(self) -> StoreConfig {
        let switch_timeout =
            self.switch_timeout.unwrap_or(DEFAULT_SWITCH_TIMEOUT);
        StoreConfig {
            switch_timeout,
            send_timeout: self.send_timeout.unwrap_or(DEFAULT_SEND_TIMEOUT),
            refresh_timeout: self.refresh_timeout.unwrap_or(switch_timeout),
            max_message_len: self
                .max_message_len
                .unwrap_or(DEFAULT_MAX_MESSAGE_LEN),
        }
    }
}

/// Configuration for the conversation store.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StoreConfig {
    pub(crate) switch_timeout: Duration,
    pub(crate) send_timeout: Duration,
    pub(crate) refresh_timeout: Duration,
    pub(crate) max_message_len: usize,
}

impl Default for StoreConfig {
    #[inline]
    fn default() -> Self {
        StoreConfigBuilder::new().build()
    }
}

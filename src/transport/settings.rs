/// Network settings for ACME connections
use std::time::Duration;

use url::Url;

use crate::error::{AcmeError, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeouts, proxy and compression settings for the HTTP transport
#[derive(Debug, Clone)]
pub struct NetworkSettings {
    connect_timeout: Duration,
    read_timeout: Duration,
    proxy: Option<Url>,
    gzip: bool,
    user_agent: String,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_TIMEOUT,
            read_timeout: DEFAULT_TIMEOUT,
            proxy: None,
            gzip: true,
            user_agent: concat!("acmekit/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl NetworkSettings {
    /// Create settings with the defaults: 30 second timeouts, no proxy,
    /// gzip enabled
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the read timeout
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Route requests through a proxy; credentials may be given in the
    /// URL userinfo
    pub fn with_proxy(mut self, proxy: Url) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Enable or disable gzip compression of responses
    pub fn with_gzip(mut self, gzip: bool) -> Self {
        self.gzip = gzip;
        self
    }

    /// Connection timeout
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Read timeout
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// Configured proxy, if any
    pub fn proxy(&self) -> Option<&Url> {
        self.proxy.as_ref()
    }

    /// Whether gzip compression is enabled
    pub fn gzip(&self) -> bool {
        self.gzip
    }

    pub(crate) fn build_client(&self) -> Result<reqwest::blocking::Client> {
        let mut builder = reqwest::blocking::Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.read_timeout)
            .gzip(self.gzip)
            .user_agent(self.user_agent.clone());
        if let Some(proxy) = &self.proxy {
            let proxy = reqwest::Proxy::all(proxy.as_str())
                .map_err(|err| AcmeError::network(format!("invalid proxy: {err}")))?;
            builder = builder.proxy(proxy);
        }
        builder
            .build()
            .map_err(|err| AcmeError::network(format!("failed to build HTTP client: {err}")))
    }
}

//! Injected exchange endpoint configuration.

use crate::error::{ExchangeError, Result};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// Which deployment of the exchange to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Production.
    #[default]
    Mainnet,
    /// Sandbox.
    Testnet,
}

impl Network {
    /// Lowercase name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_tls() -> bool {
    true
}

/// Host and port of one service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Endpoint {
    /// Host name.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Whether the service is reached over TLS.
    #[serde(default = "default_tls")]
    pub tls: bool,
}

impl Endpoint {
    /// Creates a TLS endpoint.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            tls: true,
        }
    }

    fn url(&self, secure_scheme: &str, plain_scheme: &str) -> String {
        let scheme = if self.tls { secure_scheme } else { plain_scheme };
        format!("{scheme}://{}:{}", self.host, self.port)
    }
}

/// REST and stream endpoints of one network.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NetworkEndpoints {
    /// REST API, used for snapshots.
    pub rest: Endpoint,
    /// WebSocket stream, used for diffs.
    pub stream: Endpoint,
}

/// Endpoint and request settings of one exchange.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// Exchange name used in pair keys.
    pub name: String,
    /// Selected network.
    pub network: Network,
    /// Production endpoints.
    pub mainnet: Option<NetworkEndpoints>,
    /// Sandbox endpoints.
    pub testnet: Option<NetworkEndpoints>,
    /// REST path of the depth snapshot.
    pub snapshot_path: String,
    /// Stream suffix appended to the lowercase symbol.
    pub stream_suffix: String,
    /// Timeout handed to the HTTP collaborator per snapshot request.
    pub request_timeout: Duration,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self::binance()
    }
}

impl ExchangeConfig {
    /// Binance spot endpoints.
    #[must_use]
    pub fn binance() -> Self {
        Self {
            name: "binance".to_string(),
            network: Network::Mainnet,
            mainnet: Some(NetworkEndpoints {
                rest: Endpoint::new("api.binance.com", 443),
                stream: Endpoint::new("stream.binance.com", 9443),
            }),
            testnet: Some(NetworkEndpoints {
                rest: Endpoint::new("testnet.binance.vision", 443),
                stream: Endpoint::new("testnet.binance.vision", 443),
            }),
            snapshot_path: "/api/v3/depth".to_string(),
            stream_suffix: "@depth@100ms".to_string(),
            request_timeout: Duration::from_secs(5),
        }
    }

    /// Selects the network.
    #[must_use]
    pub fn with_network(mut self, network: Network) -> Self {
        self.network = network;
        self
    }

    /// Endpoints of the selected network.
    ///
    /// # Errors
    /// Returns [`ExchangeError::NetworkUnavailable`] if none are configured.
    pub fn endpoints(&self) -> Result<&NetworkEndpoints> {
        let endpoints = match self.network {
            Network::Mainnet => self.mainnet.as_ref(),
            Network::Testnet => self.testnet.as_ref(),
        };
        endpoints.ok_or(ExchangeError::NetworkUnavailable {
            network: self.network.as_str(),
        })
    }

    /// Base URL of the REST API.
    ///
    /// # Errors
    /// Returns [`ExchangeError::NetworkUnavailable`] if no endpoints exist.
    pub fn rest_base_url(&self) -> Result<String> {
        Ok(self.endpoints()?.rest.url("https", "http"))
    }

    /// Snapshot request URL for `symbol`.
    ///
    /// # Errors
    /// Returns [`ExchangeError::NetworkUnavailable`] if no endpoints exist.
    pub fn snapshot_url(&self, symbol: &str, depth: u32) -> Result<String> {
        Ok(format!(
            "{}{}?symbol={}&limit={depth}",
            self.rest_base_url()?,
            self.snapshot_path,
            symbol.to_uppercase()
        ))
    }

    /// Diff stream URL for `symbol`.
    ///
    /// # Errors
    /// Returns [`ExchangeError::NetworkUnavailable`] if no endpoints exist.
    pub fn stream_url(&self, symbol: &str) -> Result<String> {
        Ok(format!(
            "{}/ws/{}{}",
            self.endpoints()?.stream.url("wss", "ws"),
            symbol.to_lowercase(),
            self.stream_suffix
        ))
    }
}

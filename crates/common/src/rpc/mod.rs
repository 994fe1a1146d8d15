//! Chain node RPC utilities.
//!
//! Commands never talk to a node directly. Instead, they receive a [`ChainClient`]
//! bound to a single platform and issue JSON-RPC requests through it, which allows
//! the same command code to target any configured chain.
//!
//! # Connections
//!
//! Clients are created by a [`ConnectionFactory`]. The default implementation,
//! [`ConfiguredConnections`], maps platform names from the `[chains]` configuration
//! section onto [`JsonRpcClient`] instances.
//!
//! # Block dates
//!
//! Reporting commands usually need a date per block without requesting every block
//! from a node. See the [`timestamps`] module for the bounded interpolation scheme
//! used for that purpose.

/// HTTP JSON-RPC client implementation.
mod client;

/// Lazily populated RPC method table.
pub mod methods;

/// Block timestamp estimation.
pub mod timestamps;

/// Mock chain client used in tests.
#[cfg(feature = "test-utils")]
pub mod testing;

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use derive_more::{Display, Error, From};
use serde::Deserialize;
use serde_json::Value;

use crate::config::Chains;

pub use client::JsonRpcClient;

/// Errors that may occur while communicating with a chain node.
#[derive(Debug, Display, Error, From)]
pub enum RpcError {
    /// HTTP transport error.
    Transport(reqwest::Error),

    /// Unable to (de)serialize a JSON-RPC payload.
    Json(serde_json::Error),

    /// Node responded with a JSON-RPC error object.
    #[display(fmt = "rpc error {}: {}", code, message)]
    #[from(ignore)]
    Response { code: i64, message: String },

    /// Node responded with a value of an unexpected shape.
    #[display(fmt = "unexpected rpc response: {}", _0)]
    #[from(ignore)]
    UnexpectedResponse(#[error(not(source))] String),

    /// Requested block is unknown to the node.
    #[display(fmt = "block {} not found", _0)]
    #[from(ignore)]
    BlockNotFound(#[error(not(source))] u64),
}

/// Errors that may occur while establishing a chain connection.
#[derive(Debug, Display, Error, From)]
pub enum ConnectError {
    /// Platform name is absent from the chain configuration.
    #[display(fmt = "unknown platform `{}`", _0)]
    UnknownPlatform(#[error(not(source))] String),

    /// Unable to build an HTTP client.
    Transport(reqwest::Error),
}

/// Block number and timestamp pair returned by a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockTime {
    /// Block number.
    pub number: u64,

    /// Block timestamp, in seconds.
    pub timestamp: u64,
}

/// Client bound to a single chain.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Name of the platform this client is connected to.
    fn platform(&self) -> &str;

    /// Send a single JSON-RPC request and return its `result` value.
    async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError>;

    /// Send multiple requests and return their `result` values in call order.
    ///
    /// Clients that support JSON-RPC batches send all calls in a single round trip.
    async fn batch(&self, calls: Vec<(&str, Vec<Value>)>) -> Result<Vec<Value>, RpcError> {
        let mut results = Vec::with_capacity(calls.len());

        for (method, params) in calls {
            results.push(self.request(method, params).await?);
        }

        Ok(results)
    }

    /// Get number and timestamp of every provided block.
    ///
    /// Implementations should fetch all blocks within a single logical round trip.
    /// The returned order is unspecified.
    async fn get_blocks(&self, numbers: &[u64]) -> Result<Vec<BlockTime>, RpcError>;
}

/// Factory of platform-bound chain clients.
pub trait ConnectionFactory: Send + Sync {
    /// Create a new client connected to the provided platform.
    fn connect(&self, platform: &str) -> Result<Arc<dyn ChainClient>, ConnectError>;
}

/// [`ConnectionFactory`] backed by the `[chains]` configuration section.
pub struct ConfiguredConnections {
    /// Endpoint URLs, keyed by platform name.
    endpoints: BTreeMap<String, String>,
}

impl ConfiguredConnections {
    /// Create new factory from the chain configuration.
    pub fn from_config(chains: &Chains) -> Self {
        Self {
            endpoints: chains
                .platforms
                .iter()
                .map(|(name, platform)| (name.clone(), platform.url.clone()))
                .collect(),
        }
    }
}

impl ConnectionFactory for ConfiguredConnections {
    fn connect(&self, platform: &str) -> Result<Arc<dyn ChainClient>, ConnectError> {
        let url = self
            .endpoints
            .get(platform)
            .ok_or_else(|| ConnectError::UnknownPlatform(platform.to_owned()))?;

        Ok(Arc::new(JsonRpcClient::new(platform, url)?))
    }
}

/// Encode a number as a hex JSON-RPC quantity.
pub fn to_quantity(value: u64) -> String {
    format!("{value:#x}")
}

/// Decode a hex JSON-RPC quantity.
pub fn parse_quantity(value: &str) -> Result<u64, RpcError> {
    let digits = value
        .strip_prefix("0x")
        .ok_or_else(|| RpcError::UnexpectedResponse(format!("`{value}` is not a quantity")))?;

    u64::from_str_radix(digits, 16)
        .map_err(|_| RpcError::UnexpectedResponse(format!("`{value}` is not a quantity")))
}

/// Block header fields relevant to timestamp lookups.
#[derive(Deserialize)]
struct BlockHeader {
    number: String,
    timestamp: String,
}

impl TryFrom<BlockHeader> for BlockTime {
    type Error = RpcError;

    fn try_from(header: BlockHeader) -> Result<Self, Self::Error> {
        Ok(BlockTime {
            number: parse_quantity(&header.number)?,
            timestamp: parse_quantity(&header.timestamp)?,
        })
    }
}

/// Decode an `eth_getBlockByNumber` result into a [`BlockTime`].
pub(crate) fn block_time(requested: u64, value: Value) -> Result<BlockTime, RpcError> {
    if value.is_null() {
        return Err(RpcError::BlockNotFound(requested));
    }

    serde_json::from_value::<BlockHeader>(value)?.try_into()
}

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use super::{block_time, to_quantity, BlockTime, ChainClient, RpcError};

/// JSON-RPC 2.0 request envelope.
#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Vec<Value>,
}

/// JSON-RPC 2.0 error object.
#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// JSON-RPC 2.0 response envelope.
#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    id: Option<u64>,

    #[serde(default)]
    result: Value,

    #[serde(default)]
    error: Option<RpcErrorObject>,
}

impl RpcResponse {
    fn into_result(self) -> Result<Value, RpcError> {
        match self.error {
            Some(RpcErrorObject { code, message }) => Err(RpcError::Response { code, message }),
            None => Ok(self.result),
        }
    }
}

/// [`ChainClient`] implementation that speaks JSON-RPC over HTTP.
pub struct JsonRpcClient {
    platform: String,
    url: String,
    http: Client,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    /// Create new client for the provided platform name and endpoint URL.
    pub fn new(platform: &str, url: &str) -> Result<Self, reqwest::Error> {
        Ok(Self {
            platform: platform.to_owned(),
            url: url.to_owned(),
            http: Client::builder().build()?,
            next_id: AtomicU64::new(1),
        })
    }

    fn request_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

#[async_trait]
impl ChainClient for JsonRpcClient {
    fn platform(&self) -> &str {
        &self.platform
    }

    async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.request_id(),
            method,
            params,
        };

        debug!(platform = %self.platform, method, "sending rpc request");

        self.http
            .post(&self.url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json::<RpcResponse>()
            .await?
            .into_result()
    }

    async fn batch(&self, calls: Vec<(&str, Vec<Value>)>) -> Result<Vec<Value>, RpcError> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }

        let first_id = self.next_id.fetch_add(calls.len() as u64, Ordering::Relaxed);

        let requests: Vec<_> = calls
            .into_iter()
            .enumerate()
            .map(|(offset, (method, params))| RpcRequest {
                jsonrpc: "2.0",
                id: first_id + offset as u64,
                method,
                params,
            })
            .collect();

        debug!(platform = %self.platform, size = requests.len(), "sending rpc batch");

        let mut responses: Vec<RpcResponse> = self
            .http
            .post(&self.url)
            .json(&requests)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if responses.len() != requests.len() {
            return Err(RpcError::UnexpectedResponse(format!(
                "expected {} batch responses, received {}",
                requests.len(),
                responses.len()
            )));
        }

        responses.sort_by_key(|response| response.id);

        responses.into_iter().map(RpcResponse::into_result).collect()
    }

    async fn get_blocks(&self, numbers: &[u64]) -> Result<Vec<BlockTime>, RpcError> {
        if numbers.is_empty() {
            return Ok(Vec::new());
        }

        let calls = numbers
            .iter()
            .map(|number| ("eth_getBlockByNumber", vec![json!(to_quantity(*number)), json!(false)]))
            .collect();

        self.batch(calls)
            .await?
            .into_iter()
            .zip(numbers)
            .map(|(value, number)| block_time(*number, value))
            .collect()
    }
}

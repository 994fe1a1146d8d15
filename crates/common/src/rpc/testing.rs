use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use serde_json::Value;

use super::{BlockTime, ChainClient, ConnectError, ConnectionFactory, RpcError};

type BlockClock = Box<dyn Fn(u64) -> u64 + Send + Sync>;

/// In-memory [`ChainClient`] with canned responses.
///
/// Every request is recorded and can be inspected after the test run.
pub struct MockClient {
    platform: String,
    responses: Mutex<HashMap<String, Value>>,
    clock: Option<BlockClock>,
    requests: Mutex<Vec<(String, Vec<Value>)>>,
    block_lookups: Mutex<Vec<Vec<u64>>>,
    batches: Mutex<Vec<usize>>,
}

impl MockClient {
    /// Create new mock client bound to the provided platform.
    pub fn new(platform: &str) -> Self {
        Self {
            platform: platform.to_owned(),
            responses: Mutex::new(HashMap::new()),
            clock: None,
            requests: Mutex::new(Vec::new()),
            block_lookups: Mutex::new(Vec::new()),
            batches: Mutex::new(Vec::new()),
        }
    }

    /// Respond to every call of `method` with the provided value.
    pub fn with_response(self, method: &str, value: Value) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(method.to_owned(), value);
        self
    }

    /// Derive block timestamps from block numbers using the provided function.
    pub fn with_block_clock(mut self, clock: impl Fn(u64) -> u64 + Send + Sync + 'static) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }

    /// All recorded RPC requests.
    pub fn requests(&self) -> Vec<(String, Vec<Value>)> {
        self.requests.lock().unwrap().clone()
    }

    /// Recorded RPC requests of the provided method.
    pub fn calls(&self, method: &str) -> Vec<Vec<Value>> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| name == method)
            .map(|(_, params)| params.clone())
            .collect()
    }

    /// Sizes of all recorded request batches.
    pub fn batches(&self) -> Vec<usize> {
        self.batches.lock().unwrap().clone()
    }

    /// All recorded block lookups.
    pub fn block_lookups(&self) -> Vec<Vec<u64>> {
        self.block_lookups.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainClient for MockClient {
    fn platform(&self) -> &str {
        &self.platform
    }

    async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        self.requests
            .lock()
            .unwrap()
            .push((method.to_owned(), params));

        self.responses
            .lock()
            .unwrap()
            .get(method)
            .cloned()
            .ok_or_else(|| RpcError::Response {
                code: -32601,
                message: format!("the method {method} does not exist/is not available"),
            })
    }

    async fn batch(&self, calls: Vec<(&str, Vec<Value>)>) -> Result<Vec<Value>, RpcError> {
        self.batches.lock().unwrap().push(calls.len());

        let mut results = Vec::with_capacity(calls.len());

        for (method, params) in calls {
            results.push(self.request(method, params).await?);
        }

        Ok(results)
    }

    async fn get_blocks(&self, numbers: &[u64]) -> Result<Vec<BlockTime>, RpcError> {
        self.block_lookups.lock().unwrap().push(numbers.to_vec());

        let clock = self.clock.as_ref().ok_or_else(|| RpcError::Response {
            code: -32000,
            message: String::from("header not found"),
        })?;

        Ok(numbers
            .iter()
            .map(|number| BlockTime {
                number: *number,
                timestamp: clock(*number),
            })
            .collect())
    }
}

/// [`ConnectionFactory`] that hands out pre-built mock clients.
#[derive(Default)]
pub struct MockConnections {
    clients: HashMap<String, Arc<MockClient>>,
}

impl MockConnections {
    /// Create new factory without any known platforms.
    pub fn new() -> Self {
        Default::default()
    }

    /// Register a client for its platform.
    pub fn with_client(mut self, client: Arc<MockClient>) -> Self {
        self.clients.insert(client.platform().to_owned(), client);
        self
    }
}

impl ConnectionFactory for MockConnections {
    fn connect(&self, platform: &str) -> Result<Arc<dyn ChainClient>, ConnectError> {
        self.clients
            .get(platform)
            .map(|client| client.clone() as Arc<dyn ChainClient>)
            .ok_or_else(|| ConnectError::UnknownPlatform(platform.to_owned()))
    }
}

//! RPC method capability table.
//!
//! Arbitrary method names received from users are never invoked reflectively.
//! Each name is registered in a [`MethodTable`] the first time it is used,
//! and every call goes through the registered [`RpcMethod`] entry.

use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

use serde_json::Value;
use tracing::debug;

use super::{ChainClient, RpcError};

/// Methods registered in every new [`MethodTable::with_defaults`] table.
const DEFAULT_METHODS: &[&str] = &[
    "eth_blockNumber",
    "eth_chainId",
    "eth_gasPrice",
    "eth_getBalance",
    "eth_getBlockByNumber",
    "eth_getCode",
    "eth_getLogs",
    "eth_getStorageAt",
    "eth_getTransactionByHash",
    "eth_getTransactionCount",
    "eth_getTransactionReceipt",
    "eth_sendRawTransaction",
];

/// A registered RPC method.
#[derive(Debug, PartialEq, Eq)]
pub struct RpcMethod {
    /// Name the method is invoked by.
    pub name: String,

    /// Wire method name sent to a node.
    pub call: String,
}

impl RpcMethod {
    /// Send the method call using the provided client.
    pub async fn call<C>(&self, client: &C, params: Vec<Value>) -> Result<Value, RpcError>
    where
        C: ChainClient + ?Sized,
    {
        client.request(&self.call, params).await
    }
}

/// Table of RPC methods, extended on demand.
#[derive(Default)]
pub struct MethodTable {
    methods: RwLock<HashMap<String, Arc<RpcMethod>>>,
}

impl MethodTable {
    /// Create new table with commonly used methods pre-registered.
    pub fn with_defaults() -> Self {
        let table = Self::default();

        for name in DEFAULT_METHODS {
            table.method(name);
        }

        table
    }

    /// Get the method registered under the provided name, registering it if absent.
    pub fn method(&self, name: &str) -> Arc<RpcMethod> {
        if let Some(method) = self
            .methods
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return method.clone();
        }

        self.methods
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.to_owned())
            .or_insert_with(|| {
                debug!(method = name, "registering rpc method");

                Arc::new(RpcMethod {
                    name: name.to_owned(),
                    call: name.to_owned(),
                })
            })
            .clone()
    }

    /// Check if the method was already registered.
    pub fn contains(&self, name: &str) -> bool {
        self.methods
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Call the method with the provided name, registering it first if needed.
    pub async fn call<C>(&self, client: &C, name: &str, params: Vec<Value>) -> Result<Value, RpcError>
    where
        C: ChainClient + ?Sized,
    {
        self.method(name).call(client, params).await
    }
}

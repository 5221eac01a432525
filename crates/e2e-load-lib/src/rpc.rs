// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! The RPC surface of a node the load is submitted through.

use crate::{testnet::Node, transaction_generator::Transaction};
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use reqwest::{Client as ReqwestClient, Url};
use serde::{Deserialize, de::DeserializeOwned};
use std::time::Duration;

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub struct SyncInfo {
    /// The node has not synced up to the head of the network yet.
    pub catching_up: bool,
}

/// A client bound to the RPC endpoint of one node.
#[async_trait]
pub trait EndpointClient: Send + Sync {
    fn name(&self) -> &str;

    async fn status(&self) -> Result<SyncInfo>;

    /// Only asks the node to accept the transaction into its mempool, not to
    /// wait for it to be committed.
    async fn broadcast_tx_sync(&self, txn: &Transaction) -> Result<()>;
}

// Lets test assertion macros such as `assert_err!` format a boxed client.
#[cfg(test)]
impl std::fmt::Debug for dyn EndpointClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointClient").field("name", &self.name()).finish()
    }
}

/// Builds a fresh client for a node. Every call returns a new client, so
/// workers never share them, though the transport underneath may be shared.
pub trait Connector: Send + Sync {
    fn connect(&self, node: &Node) -> Result<Box<dyn EndpointClient>>;
}

/// Hands out clients backed by a single reqwest client. Building a reqwest
/// client loads the TLS roots, so it is done once here and every
/// `HttpRpcClient` gets a clone of the handle.
#[derive(Clone, Debug)]
pub struct HttpConnector {
    inner: ReqwestClient,
}

impl HttpConnector {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let inner = ReqwestClient::builder().timeout(timeout).build()?;
        Ok(Self { inner })
    }
}

impl Connector for HttpConnector {
    fn connect(&self, node: &Node) -> Result<Box<dyn EndpointClient>> {
        let client = HttpRpcClient::new(
            node.name.clone(),
            node.rpc_address.clone(),
            self.inner.clone(),
        )?;
        Ok(Box::new(client))
    }
}

/// Talks to the URI flavour of the CometBFT JSON-RPC interface.
#[derive(Clone, Debug)]
pub struct HttpRpcClient {
    name: String,
    base_url: Url,
    inner: ReqwestClient,
}

impl HttpRpcClient {
    pub fn new(name: String, base_url: Url, inner: ReqwestClient) -> Result<Self> {
        if base_url.cannot_be_a_base() {
            bail!("RPC address {} of {} cannot be a base URL", base_url, name);
        }
        Ok(Self {
            name,
            base_url,
            inner,
        })
    }

    fn endpoint(&self, method: &str) -> Url {
        let mut url = self.base_url.clone();
        // Checked in the constructor.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(method);
        }
        url
    }

    async fn call<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self.inner.get(url).send().await?;
        let status_code = response.status();
        let body = response.text().await?;
        parse_rpc_response(&body).with_context(|| {
            format!("{} responded to the RPC with HTTP {}", self.name, status_code)
        })
    }
}

#[async_trait]
impl EndpointClient for HttpRpcClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn status(&self) -> Result<SyncInfo> {
        let status: StatusResult = self.call(self.endpoint("status")).await?;
        Ok(status.sync_info)
    }

    async fn broadcast_tx_sync(&self, txn: &Transaction) -> Result<()> {
        let mut url = self.endpoint("broadcast_tx_sync");
        url.query_pairs_mut()
            .append_pair("tx", &format!("0x{}", hex::encode(txn)));
        let result: BroadcastResult = self.call(url).await?;
        if result.code != 0 {
            bail!(
                "{} rejected transaction {} with code {}: {}",
                self.name,
                result.hash,
                result.code,
                result.log
            );
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
    #[serde(default)]
    data: String,
}

#[derive(Debug, Deserialize)]
struct StatusResult {
    sync_info: SyncInfo,
}

#[derive(Debug, Deserialize)]
struct BroadcastResult {
    code: u32,
    #[serde(default)]
    log: String,
    #[serde(default)]
    hash: String,
}

fn parse_rpc_response<T: DeserializeOwned>(body: &str) -> Result<T> {
    let response: RpcResponse<T> =
        serde_json::from_str(body).context("Malformed JSON-RPC response")?;
    match (response.result, response.error) {
        (_, Some(error)) => Err(anyhow!(
            "JSON-RPC error {}: {} {}",
            error.code,
            error.message,
            error.data
        )),
        (Some(result), None) => Ok(result),
        (None, None) => Err(anyhow!("JSON-RPC response has neither a result nor an error")),
    }
}

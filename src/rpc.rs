//! Typed JSON-RPC client for the node's tip height and block time.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::NodeConfig;
use crate::error::RpcError;
use crate::models::BlockInfo;

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct BlockHeader {
    time: i64,
}

impl<T> RpcResponse<T> {
    fn into_result(self, method: &str) -> Result<T, RpcError> {
        if let Some(err) = self.error {
            return Err(RpcError::Protocol { code: err.code, message: err.message });
        }
        self.result.ok_or_else(|| RpcError::EmptyResult(method.to_string()))
    }
}

pub struct NodeRpcClient {
    http: reqwest::Client,
    url: String,
    username: String,
    password: String,
}

impl NodeRpcClient {
    pub fn new(node: &NodeConfig, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: reqwest::Client::builder().timeout(timeout).build()?,
            url: node.url(),
            username: node.username.clone(),
            password: node.password.clone(),
        })
    }

    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> Result<T, RpcError> {
        let payload = json!({ "jsonrpc": "1.0", "id": 1, "method": method, "params": params });
        let response: RpcResponse<T> = self
            .http
            .post(&self.url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&payload)
            .send()
            .await?
            .json()
            .await?;
        response.into_result(method)
    }

    pub async fn block_count(&self) -> Result<u64, RpcError> {
        self.call("getblockcount", vec![]).await
    }

    pub async fn block_hash(&self, height: u64) -> Result<String, RpcError> {
        self.call("getblockhash", vec![json!(height)]).await
    }

    pub async fn block_time(&self, hash: &str) -> Result<i64, RpcError> {
        let header: BlockHeader = self.call("getblock", vec![json!(hash)]).await?;
        Ok(header.time)
    }

    /// Height, hash and time of the current tip. Age fields are filled in
    /// by the caller.
    pub async fn tip(&self) -> Result<BlockInfo, RpcError> {
        let block_height = self.block_count().await?;
        let block_hash = self.block_hash(block_height).await?;
        let block_time = self.block_time(&block_hash).await?;
        Ok(BlockInfo { block_height, block_hash, block_time, ..Default::default() })
    }
}

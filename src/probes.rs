use async_trait::async_trait;
use hickory_resolver::config::ResolverConfig;
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::TokioResolver;
use std::time::Duration;
use tracing::info;

use crate::config::NodeConfig;
use crate::error::{ProbeError, RpcError};
use crate::models::BlockInfo;
use crate::rpc::NodeRpcClient;

/// Body and metadata of a successful GET.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub http_code: u16,
    /// Raw body length in bytes, before any charset decoding.
    pub content_size: usize,
    pub body: String,
}

/// The network collaborators used by one poll cycle.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Resolves `host` and returns the number of addresses.
    async fn resolve(&self, host: &str) -> Result<usize, ProbeError>;

    async fn fetch(&self, url: &str) -> Result<Fetched, ProbeError>;

    /// `None` when no node is configured.
    async fn tip(&self) -> Option<Result<BlockInfo, RpcError>>;
}

/// Empty expected text always matches; anything else must be a substring.
pub fn content_matches(body: &str, expected: &str) -> bool {
    expected.is_empty() || body.contains(expected)
}

pub struct NetworkProber {
    dns_resolver: TokioResolver,
    http_client: reqwest::Client,
    rpc: Option<NodeRpcClient>,
}

impl NetworkProber {
    pub fn new(timeout: Duration, node: Option<&NodeConfig>) -> Result<Self, reqwest::Error> {
        let dns_resolver = TokioResolver::builder_with_config(
            ResolverConfig::cloudflare(),
            TokioConnectionProvider::default(),
        ).build();

        info!("DNS resolver configured: Cloudflare 1.1.1.1 / 1.0.0.1");

        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        let rpc = match node {
            Some(node) if node.enabled => Some(NodeRpcClient::new(node, timeout)?),
            _ => None,
        };

        Ok(Self { dns_resolver, http_client, rpc })
    }
}

#[async_trait]
impl Prober for NetworkProber {
    async fn resolve(&self, host: &str) -> Result<usize, ProbeError> {
        let lookup = self
            .dns_resolver
            .lookup_ip(host)
            .await
            .map_err(|e| ProbeError::Dns(e.to_string()))?;
        Ok(lookup.iter().count())
    }

    async fn fetch(&self, url: &str) -> Result<Fetched, ProbeError> {
        let response = self.http_client.get(url).send().await?;
        let code = response.status();
        let raw = response.bytes().await?;

        if !code.is_success() {
            return Err(ProbeError::Status { code: code.as_u16(), content_size: raw.len() });
        }

        Ok(Fetched {
            http_code: code.as_u16(),
            content_size: raw.len(),
            body: String::from_utf8_lossy(&raw).into_owned(),
        })
    }

    async fn tip(&self) -> Option<Result<BlockInfo, RpcError>> {
        let rpc = self.rpc.as_ref()?;
        Some(rpc.tip().await)
    }
}

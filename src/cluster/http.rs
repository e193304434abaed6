//! HTTP cluster transport.
//!
//! # Responsibilities
//! - POST each [`ClusterRequest`] as JSON to every peer's `/cluster/rpc`
//! - Collect one nullable reply per peer
//!
//! # Design Decisions
//! - Static membership from configuration; this node is never in the list
//! - Every failure (connect, timeout, status, decode) becomes an absent reply;
//!   retrying is left to the next status cycle
//! - Requests to all peers run concurrently; the call completes when every
//!   peer has answered or timed out

use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use futures_util::future::join_all;
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;
use url::Url;

use crate::cluster::rpc::{ClusterRequest, ClusterResponse, ClusterRpc};
use crate::observability::metrics;

/// Path of the cluster RPC endpoint on every node.
pub const RPC_PATH: &str = "/cluster/rpc";

/// Transport-level failures. Never surfaced to callers of [`ClusterRpc`].
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid peer URL '{url}': {source}")]
    Url { url: String, source: url::ParseError },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Peer returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("Encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Cluster RPC over HTTP/JSON.
#[derive(Clone)]
pub struct HttpClusterRpc {
    client: reqwest::Client,
    endpoints: Arc<Vec<Url>>,
    timeout: Duration,
}

impl HttpClusterRpc {
    /// Create a transport for the given peer base URLs.
    pub fn new(peers: &[String], timeout: Duration) -> Result<Self, TransportError> {
        let endpoints = peers
            .iter()
            .map(|peer| {
                Url::parse(peer)
                    .and_then(|base| base.join(RPC_PATH))
                    .map_err(|source| TransportError::Url { url: peer.clone(), source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(peers = endpoints.len(), timeout_ms = timeout.as_millis() as u64, "Cluster transport ready");

        Ok(Self {
            client: reqwest::Client::new(),
            endpoints: Arc::new(endpoints),
            timeout,
        })
    }

    pub fn peer_count(&self) -> usize {
        self.endpoints.len()
    }

    async fn call_peer(&self, endpoint: &Url, body: Vec<u8>) -> Result<Option<ClusterResponse>, TransportError> {
        let response = self
            .client
            .post(endpoint.clone())
            .timeout(self.timeout)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status));
        }
        Ok(response.json::<Option<ClusterResponse>>().await?)
    }

    async fn broadcast(&self, op: &'static str, body: Vec<u8>) -> Vec<Option<ClusterResponse>> {
        let calls = self.endpoints.iter().map(|endpoint| {
            let body = body.clone();
            async move {
                match self.call_peer(endpoint, body).await {
                    Ok(reply) => reply,
                    Err(e) => {
                        tracing::warn!(peer = %endpoint, op, error = %e, "Cluster member did not answer");
                        metrics::record_peer_failure(op);
                        None
                    }
                }
            }
        });
        join_all(calls).await
    }
}

#[async_trait]
impl ClusterRpc for HttpClusterRpc {
    async fn call_all(&self, request: ClusterRequest) -> Vec<Option<ClusterResponse>> {
        let op = request.name();
        match serde_json::to_vec(&request) {
            Ok(body) => self.broadcast(op, body).await,
            Err(e) => {
                tracing::error!(op, error = %e, "Failed to encode cluster request");
                vec![None; self.endpoints.len()]
            }
        }
    }

    fn notify_all(&self, request: ClusterRequest) {
        let op = request.name();
        let body = match serde_json::to_vec(&request) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(op, error = %e, "Failed to encode cluster notification");
                return;
            }
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(op, "No runtime available, notification dropped");
            return;
        };
        let transport = self.clone();
        runtime.spawn(async move {
            transport.broadcast(op, body).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_resolve_rpc_path() {
        let rpc = HttpClusterRpc::new(
            &["http://10.0.0.2:8090".to_string(), "http://node3:8090/".to_string()],
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(rpc.peer_count(), 2);
        assert_eq!(rpc.endpoints[0].as_str(), "http://10.0.0.2:8090/cluster/rpc");
        assert_eq!(rpc.endpoints[1].as_str(), "http://node3:8090/cluster/rpc");
    }

    #[test]
    fn test_invalid_peer_rejected() {
        let err = HttpClusterRpc::new(&["not a url".to_string()], Duration::from_secs(1)).err().unwrap();
        assert!(matches!(err, TransportError::Url { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_peer_is_absent() {
        // Port 9 (discard) on localhost is closed in test environments.
        let rpc = HttpClusterRpc::new(&["http://127.0.0.1:9".to_string()], Duration::from_millis(500)).unwrap();
        let replies = rpc.call_all(ClusterRequest::IsProxyHealthOk).await;
        assert_eq!(replies, vec![None]);
    }
}

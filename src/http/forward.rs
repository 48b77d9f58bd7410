use std::time::Duration;

use async_trait::async_trait;
use reqwest::header;

use crate::error::{MeshError, Result};
use crate::http::ErrorBody;
use crate::job::{Job, JobRequest};

/// Forwarding RPCs to peer nodes. Submissions travel as an HTTP POST of
/// the full request; kills as an HTTP DELETE to the job's kill URI. The
/// peer's response, success or error, is relayed verbatim.
#[async_trait]
pub trait PeerClient: Send + Sync {
    async fn forward_submit(&self, uri: &str, request: &JobRequest) -> Result<Job>;

    async fn forward_kill(&self, kill_uri: &str) -> Result<Job>;
}

/// `reqwest`-backed peer client with a per-request timeout. A timeout or
/// connection failure is an internal error, not a job outcome; the job's
/// true state may still need to be queried at the peer.
pub struct HttpPeerClient {
    client: reqwest::Client,
}

impl HttpPeerClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Map a peer response onto the local taxonomy so the original caller
    /// sees the peer's outcome unchanged.
    async fn decode(response: reqwest::Response) -> Result<Job> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<Job>().await?);
        }

        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.message,
            Err(_) => format!("peer returned status {status}"),
        };
        Err(match status.as_u16() {
            400 => MeshError::InvalidRequest(message),
            404 => MeshError::NotFound(message),
            409 => MeshError::Conflict(message),
            412 => MeshError::PreconditionFailed(message),
            503 => MeshError::CapacityExceeded(message),
            _ => MeshError::Internal(message),
        })
    }
}

#[async_trait]
impl PeerClient for HttpPeerClient {
    async fn forward_submit(&self, uri: &str, request: &JobRequest) -> Result<Job> {
        let response = self
            .client
            .post(uri)
            .header(header::ACCEPT, "application/json")
            .json(request)
            .send()
            .await?;
        tracing::info!(uri = %uri, status = %response.status(), "Forwarded job submission");
        Self::decode(response).await
    }

    async fn forward_kill(&self, kill_uri: &str) -> Result<Job> {
        let response = self
            .client
            .delete(kill_uri)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;
        tracing::info!(uri = %kill_uri, status = %response.status(), "Forwarded kill request");
        Self::decode(response).await
    }
}

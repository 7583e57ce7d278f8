//! The seam between the controller and the network.
//!
//! # Design
//! The controller never performs I/O itself: it hands an `HttpRequest` to a
//! `Transport` and awaits the `HttpResponse`. Status codes are data here;
//! only failures that produce no response at all become
//! `ApiError::Transport`. Tests swap in a scripted transport.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Executes one HTTP round-trip.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        (**self).execute(request).await
    }
}

/// Blocking `ureq` agent driven from tokio's blocking pool.
///
/// ureq's automatic status-as-error behavior is disabled so 4xx/5xx
/// responses come back as data for `TodoClient` to interpret.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for UreqTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let agent = self.agent.clone();
        tokio::task::spawn_blocking(move || execute_blocking(&agent, request))
            .await
            .map_err(|e| ApiError::Transport(format!("request task failed: {e}")))?
    }
}

fn execute_blocking(agent: &ureq::Agent, req: HttpRequest) -> Result<HttpResponse, ApiError> {
    debug!(method = %req.method, path = %req.path, "sending request");

    let result = match (req.method, req.body) {
        (HttpMethod::Get, _) => with_headers(agent.get(&req.path), &req.headers).call(),
        (HttpMethod::Delete, _) => with_headers(agent.delete(&req.path), &req.headers).call(),
        (HttpMethod::Post, Some(body)) => with_headers(agent.post(&req.path), &req.headers).send(body.as_bytes()),
        (HttpMethod::Post, None) => with_headers(agent.post(&req.path), &req.headers).send_empty(),
        (HttpMethod::Put, Some(body)) => with_headers(agent.put(&req.path), &req.headers).send(body.as_bytes()),
        (HttpMethod::Put, None) => with_headers(agent.put(&req.path), &req.headers).send_empty(),
    };
    let mut response = result.map_err(|e| ApiError::Transport(e.to_string()))?;

    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| Some((name.as_str().to_string(), value.to_str().ok()?.to_string())))
        .collect();
    let body = response
        .body_mut()
        .read_to_string()
        .map_err(|e| ApiError::Transport(e.to_string()))?;

    debug!(status, "received response");
    Ok(HttpResponse { status, headers, body })
}

fn with_headers<B>(mut builder: ureq::RequestBuilder<B>, headers: &[(String, String)]) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

use super::logging::{debug_payload_enabled, emit_debug_payload};
use crate::types::AgentInfo;
use crate::util::is_local_endpoint_url;
use anyhow::{anyhow, bail, Result};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde_json::Value;
use std::pin::Pin;
#[cfg(test)]
use std::sync::Arc;
use std::time::Duration;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Startup probes fail fast so a down service degrades startup by seconds.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
/// Total cap on a single-shot invoke, and on the wait for stream response
/// headers. The stream body itself has no total cap; silence between chunks
/// is bounded separately by the turn loop.
const TURN_TIMEOUT: Duration = Duration::from_secs(60);

#[cfg(test)]
pub trait MockStreamProducer: Send + Sync {
    fn create_mock_stream(&self, agent_id: &str, payload: &Value) -> Result<ByteStream>;
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    api_url: String,
    bearer_token: Option<String>,
    #[cfg(test)]
    mock_stream_producer: Option<Arc<dyn MockStreamProducer>>,
}

impl ApiClient {
    pub fn new(api_url: &str, bearer_token: Option<&str>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            bearer_token: bearer_token.map(str::to_string),
            #[cfg(test)]
            mock_stream_producer: None,
        }
    }

    #[cfg(test)]
    pub fn new_mock(mock_producer: Arc<dyn MockStreamProducer>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: "http://localhost:8080".to_string(),
            bearer_token: None,
            mock_stream_producer: Some(mock_producer),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// `GET /health`. Any error means the service is unreachable, which the
    /// config resolver treats as degraded mode, never as fatal.
    pub async fn health(&self) -> Result<()> {
        let url = format!("{}/health", self.api_url);
        let response = self
            .authorize(self.http.get(&url).timeout(PROBE_TIMEOUT))
            .send()
            .await
            .map_err(|error| map_api_request_error(error, &url))?;
        response
            .error_for_status()
            .map_err(|error| map_api_request_error(error, &url))?;
        Ok(())
    }

    /// `GET /agents`, normalized to [`AgentInfo`] rows.
    pub async fn list_agents(&self) -> Result<Vec<AgentInfo>> {
        let url = format!("{}/agents", self.api_url);
        let response = self
            .authorize(self.http.get(&url).timeout(PROBE_TIMEOUT))
            .send()
            .await
            .map_err(|error| map_api_request_error(error, &url))?
            .error_for_status()
            .map_err(|error| map_api_request_error(error, &url))?;

        let agents: Vec<AgentInfo> = response
            .json()
            .await
            .map_err(|error| anyhow!("agents list from '{url}' is not valid JSON: {error}"))?;
        Ok(agents
            .into_iter()
            .filter(|agent| !agent.id.is_empty())
            .collect())
    }

    /// `POST /{agent_id}/invoke`: one complete response body.
    pub async fn invoke(&self, agent_id: &str, payload: &Value) -> Result<Value> {
        let url = format!("{}/{agent_id}/invoke", self.api_url);
        if debug_payload_enabled() {
            emit_debug_payload(&url, payload);
        }

        let response = self
            .authorize(self.http.post(&url).timeout(TURN_TIMEOUT).json(payload))
            .send()
            .await
            .map_err(|error| map_api_request_error(error, &url))?;
        let response = reject_error_status(response, &url).await?;

        response
            .json()
            .await
            .map_err(|error| anyhow!("response from '{url}' is not valid JSON: {error}"))
    }

    /// `POST /{agent_id}/stream`: the live event stream for one turn.
    pub async fn create_stream(&self, agent_id: &str, payload: &Value) -> Result<ByteStream> {
        #[cfg(test)]
        {
            if let Some(producer) = &self.mock_stream_producer {
                return producer.create_mock_stream(agent_id, payload);
            }
        }

        let url = format!("{}/{agent_id}/stream", self.api_url);
        if debug_payload_enabled() {
            emit_debug_payload(&url, payload);
        }

        // A request-level timeout would also cap the body, killing long but
        // healthy streams. Bound only the wait for response headers here.
        let send = self.authorize(self.http.post(&url).json(payload)).send();
        let response = tokio::time::timeout(TURN_TIMEOUT, send)
            .await
            .map_err(|_| {
                anyhow!(
                    "request to '{url}' timed out: no response within {}s",
                    TURN_TIMEOUT.as_secs()
                )
            })?
            .map_err(|error| map_api_request_error(error, &url))?;
        let response = reject_error_status(response, &url).await?;

        let url_for_stream = url.clone();
        let stream = response
            .bytes_stream()
            .map(move |item| item.map_err(|error| map_api_request_error(error, &url_for_stream)));
        Ok(Box::pin(stream))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

/// Surface the service's own error detail instead of a bare status line.
async fn reject_error_status(
    response: reqwest::Response,
    url: &str,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    bail!("'{url}' returned HTTP {status}: {}", error_detail(&body));
}

fn error_detail(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<Value>(body) {
        if let Some(detail) = parsed.get("detail") {
            return detail
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| detail.to_string());
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "<empty body>".to_string()
    } else {
        trimmed.to_string()
    }
}

fn map_api_request_error(error: reqwest::Error, request_url: &str) -> anyhow::Error {
    if error.is_connect() && is_local_endpoint_url(request_url) {
        return anyhow!(
            "cannot reach local agent service '{}': {}. Start the service or pass --api-url.",
            request_url,
            error
        );
    }
    if error.is_connect() {
        return anyhow!("cannot reach agent service '{}': {}", request_url, error);
    }
    if error.is_timeout() {
        return anyhow!("request to '{}' timed out: {}", request_url, error);
    }
    if let Some(status) = error.status() {
        return anyhow!("'{}' returned HTTP {}: {}", request_url, status, error);
    }
    anyhow!("request to '{}' failed: {}", request_url, error)
}

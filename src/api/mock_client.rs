use crate::api::client::{ByteStream, MockStreamProducer};
use anyhow::Result;
use bytes::Bytes;
use futures::stream;
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// Scripted stream source for tests. Each configured response is a sequence
/// of raw byte chunks, delivered exactly as written so tests control where
/// chunk boundaries fall relative to frame boundaries.
#[derive(Clone)]
pub struct MockApiClient {
    responses: Arc<Mutex<Vec<Vec<String>>>>,
    requests: Arc<Mutex<Vec<(String, Value)>>>,
}

impl MockApiClient {
    pub fn new(responses: Vec<Vec<String>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Outbound (agent_id, payload) pairs seen so far.
    pub fn recorded_requests(&self) -> Vec<(String, Value)> {
        self.requests.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl MockStreamProducer for MockApiClient {
    fn create_mock_stream(&self, agent_id: &str, payload: &Value) -> Result<ByteStream> {
        self.requests
            .lock()
            .unwrap()
            .push((agent_id.to_string(), payload.clone()));

        let mut responses_guard = self.responses.lock().unwrap();
        if responses_guard.is_empty() {
            return Err(anyhow::anyhow!("MockApiClient: no more responses configured"));
        }
        let chunks: Vec<Result<Bytes>> = responses_guard
            .remove(0)
            .into_iter()
            .map(|chunk| Ok(Bytes::from(chunk)))
            .collect();

        Ok(Box::pin(stream::iter(chunks)))
    }
}

//! Scripted transport for tests

use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::{Result, bail};
use async_trait::async_trait;
use serde_json::Value;

use super::error::ApiError;
use super::request::ApiRequest;
use super::transport::HttpTransport;

/// Replays queued responses in order and records every request
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<Result<Value, ApiError>>>,
    requests: Mutex<Vec<ApiRequest>>,
    page_limit: Option<usize>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_limit(mut self, limit: usize) -> Self {
        self.page_limit = Some(limit);
        self
    }

    /// Queue a successful response body
    pub fn respond(&self, body: Value) -> &Self {
        self.responses.lock().unwrap().push_back(Ok(body));
        self
    }

    /// Queue an error response
    pub fn fail(&self, status: u16, body: &str) -> &Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(ApiError::new(status, "", "", body)));
        self
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// `"METHOD uri"` for each recorded request
    pub fn calls(&self) -> Vec<String> {
        self.requests().iter().map(ToString::to_string).collect()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: ApiRequest) -> Result<Value> {
        self.requests.lock().unwrap().push(request.clone());

        let Some(response) = self.responses.lock().unwrap().pop_front() else {
            bail!("No scripted response for {}", request);
        };

        response.map_err(|e| {
            ApiError::new(e.status, request.http_method(), request.uri(), e.body).into()
        })
    }

    fn page_limit(&self) -> Option<usize> {
        self.page_limit
    }
}

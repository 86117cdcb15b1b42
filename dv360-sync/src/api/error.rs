//! Typed API failure

use serde_json::Value;

/// A non-2xx response, returned after the transport gave up retrying
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    pub status: u16,
    pub method: String,
    pub uri: String,
    /// Response body text as received
    pub body: String,
}

impl ApiError {
    pub fn new(
        status: u16,
        method: impl Into<String>,
        uri: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            status,
            method: method.into(),
            uri: uri.into(),
            body: body.into(),
        }
    }

    /// `error.message` of a Google-style error body, or the raw body
    pub fn message(&self) -> String {
        serde_json::from_str::<Value>(&self.body)
            .ok()
            .and_then(|json| {
                json.pointer("/error/message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| self.body.trim().to_string())
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "HTTP {} on {} {}: {}",
            self.status,
            self.method,
            self.uri,
            self.message()
        )
    }
}

impl std::error::Error for ApiError {}

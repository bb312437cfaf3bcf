//! Requests as the server saw them, kept for matching and verification.

use axum::extract::Query;
use axum::http::Uri;
use serde::{Deserialize, Serialize};

use crate::error::ServerError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    /// Raw (still encoded) query string.
    pub query: Option<String>,
    /// Decoded query pairs in arrival order.
    pub query_params: Vec<(String, String)>,
    /// Header names are stored lower-case.
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    pub fn new(
        method: &str,
        target: &str,
        headers: Vec<(String, String)>,
        body: String,
    ) -> Result<Self, ServerError> {
        let uri: Uri = target
            .parse()
            .map_err(|_| ServerError::BadRequest(format!("invalid request target {target:?}")))?;
        let query_params = match uri.query() {
            Some(_) => {
                let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(&uri)
                    .map_err(|e| ServerError::BadRequest(format!("invalid query string: {e}")))?;
                pairs
            }
            None => Vec::new(),
        };
        Ok(Self {
            method: method.to_ascii_uppercase(),
            path: uri.path().to_string(),
            query: uri.query().map(str::to_string),
            query_params,
            headers: headers
                .into_iter()
                .map(|(name, value)| (name.to_ascii_lowercase(), value))
                .collect(),
            body,
        })
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Path and raw query, as it appeared on the request line.
    pub fn url(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{query}", self.path),
            None => self.path.clone(),
        }
    }
}

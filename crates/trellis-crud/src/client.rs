//! CRUD API client
//!
//! Generic call boundary to the backing basicCrud HTTP service. The gateway
//! core treats every non-success response and every transport error the same
//! way, as a routed failure, so both collapse into [`CrudError`].

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Default base URL of the basicCrud API.
pub const DEFAULT_CRUD_API_URL: &str = "http://localhost:3000";

/// Successful response payload from the CRUD API.
#[derive(Debug, Clone)]
pub struct CrudResponse {
    pub body: String,
}

/// Failures at the executor boundary.
#[derive(Debug, Error)]
pub enum CrudError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{body}")]
    Api { status: u16, body: String },
}

/// Call interface to the external data store.
///
/// Handlers depend on this trait, not on the HTTP client, so tests can
/// substitute an in-memory fake.
#[async_trait]
pub trait CrudApi: Send + Sync {
    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<CrudResponse, CrudError>;
}

/// Production client over reqwest. Built once at startup and shared.
#[derive(Debug, Clone)]
pub struct HttpCrudClient {
    base_url: String,
    http: reqwest::Client,
}

impl HttpCrudClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl CrudApi for HttpCrudClient {
    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<CrudResponse, CrudError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, %url, "calling CRUD API");

        let mut request = self.http.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            Ok(CrudResponse { body: text })
        } else {
            Err(CrudError::Api {
                status: status.as_u16(),
                body: text,
            })
        }
    }
}

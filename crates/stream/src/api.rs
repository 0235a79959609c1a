//! REST client for the research job endpoints.
//!
//! Wraps job submission (`/research/stock`, `/research/sector`) and the
//! health probe using [`reqwest`]. Submission returns the session id
//! whose progress stream is then followed by a
//! [`ProgressAggregator`](crate::aggregator::ProgressAggregator).

use serde::Deserialize;

use analyst_core::stages::JobKind;
use analyst_core::types::SessionId;

/// Fallback message when a rejected submission carries no `error` field.
const SUBMIT_FAILED: &str = "Failed to start research";

/// HTTP client for a research backend.
pub struct ResearchApi {
    client: reqwest::Client,
    api_url: String,
}

/// What to research.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobRequest {
    Stock {
        symbol: String,
        exchange: String,
    },
    Sector {
        sector: String,
        exchange: String,
        num_companies: u32,
    },
}

impl JobRequest {
    pub fn kind(&self) -> JobKind {
        match self {
            JobRequest::Stock { .. } => JobKind::Stock,
            JobRequest::Sector { .. } => JobKind::Sector,
        }
    }

    /// Symbol or sector name, for display.
    pub fn target(&self) -> &str {
        match self {
            JobRequest::Stock { symbol, .. } => symbol,
            JobRequest::Sector { sector, .. } => sector,
        }
    }

    fn path(&self) -> &'static str {
        match self {
            JobRequest::Stock { .. } => "research/stock",
            JobRequest::Sector { .. } => "research/sector",
        }
    }

    fn body(&self) -> serde_json::Value {
        match self {
            JobRequest::Stock { symbol, exchange } => serde_json::json!({
                "symbol": symbol,
                "exchange": exchange,
            }),
            JobRequest::Sector {
                sector,
                exchange,
                num_companies,
            } => serde_json::json!({
                "sector": sector,
                "exchange": exchange,
                "num_companies": num_companies,
            }),
        }
    }
}

/// Body returned by the submission endpoints.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    #[serde(default)]
    pub success: bool,
    pub session_id: Option<SessionId>,
    pub error: Option<String>,
}

/// Errors from the research REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend returned a non-2xx status code.
    #[error("Research API error ({status}): {message}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// The body's `error` field, or a generic message.
        message: String,
    },

    /// A 2xx response that did not start a session.
    #[error("Research was not started: {0}")]
    Rejected(String),
}

impl ResearchApi {
    /// * `api_url` - Base HTTP URL, e.g. `http://host:5001`.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    /// Reuse an existing [`reqwest::Client`] (shared connection pool).
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// `GET /health`. Any failure counts as unhealthy.
    pub async fn health_check(&self) -> bool {
        match self
            .client
            .get(format!("{}/health", self.api_url))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::warn!(error = %e, "Health check failed");
                false
            }
        }
    }

    /// Submit a job and return its session id.
    ///
    /// `token` is sent as an `Authorization: Bearer` header.
    pub async fn submit(
        &self,
        request: &JobRequest,
        token: Option<&str>,
    ) -> Result<SessionId, ApiError> {
        let mut builder = self
            .client
            .post(format!("{}/{}", self.api_url, request.path()))
            .json(&request.body());
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }

        let response = Self::ensure_success(builder.send().await?).await?;
        let body: SubmitResponse = response.json().await?;

        match body {
            SubmitResponse {
                success: true,
                session_id: Some(session_id),
                ..
            } => {
                tracing::info!(
                    kind = %request.kind(),
                    research_target = request.target(),
                    session_id = %session_id,
                    "Research submitted",
                );
                Ok(session_id)
            }
            SubmitResponse { error, .. } => Err(ApiError::Rejected(
                error.unwrap_or_else(|| "no session id returned".to_string()),
            )),
        }
    }

    pub async fn submit_stock(
        &self,
        symbol: &str,
        exchange: &str,
        token: Option<&str>,
    ) -> Result<SessionId, ApiError> {
        let request = JobRequest::Stock {
            symbol: symbol.to_string(),
            exchange: exchange.to_string(),
        };
        self.submit(&request, token).await
    }

    pub async fn submit_sector(
        &self,
        sector: &str,
        exchange: &str,
        num_companies: u32,
        token: Option<&str>,
    ) -> Result<SessionId, ApiError> {
        let request = JobRequest::Sector {
            sector: sector.to_string(),
            exchange: exchange.to_string(),
            num_companies,
        };
        self.submit(&request, token).await
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code, turning failures
    /// into [`ApiError::ApiError`] with the body's `error` field.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|body| body.get("error").and_then(|e| e.as_str()).map(str::to_string))
            .unwrap_or_else(|| SUBMIT_FAILED.to_string());

        Err(ApiError::ApiError {
            status: status.as_u16(),
            message,
        })
    }
}

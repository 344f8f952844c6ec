//! Relay to the Bhuvan API and the external query executor.
//!
//! Every call injects the matching secret, forwards the caller's parameters as
//! proper query-string pairs, and hands the upstream answer back unchanged.
//! Nothing is retried.

pub mod handlers;

use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bhuvan_shared::models::USER_ID_HEADER;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::UpstreamConfig;
use crate::identity::UserId;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Upstream answered with a non-2xx status.
    #[error("{reason}")]
    Upstream {
        status: StatusCode,
        reason: String,
        details: Value,
    },
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
    #[error("query executor is not configured")]
    ExecutorUnavailable,
    /// Executor answered 2xx but reported a failure in its payload.
    #[error("query failed: {0}")]
    Executor(String),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match self {
            GatewayError::Upstream {
                status,
                reason,
                details,
            } => (status, Json(json!({ "error": reason, "details": details }))).into_response(),
            GatewayError::ExecutorUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": self.to_string() })),
            )
                .into_response(),
            GatewayError::Transport(_) | GatewayError::Executor(_) => (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": self.to_string() })),
            )
                .into_response(),
        }
    }
}

/// An upstream 2xx answer, passed through as-is.
#[derive(Debug)]
pub struct Relayed {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
}

impl Relayed {
    pub fn json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

impl IntoResponse for Relayed {
    fn into_response(self) -> Response {
        let mut resp = (self.status, self.body).into_response();
        if let Some(ct) = self.content_type {
            resp.headers_mut().insert(header::CONTENT_TYPE, ct);
        }
        resp
    }
}

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RoutingQuery {
    pub lat1: f64,
    pub lon1: f64,
    pub lat2: f64,
    pub lon2: f64,
}

#[derive(Debug, Deserialize)]
pub struct ThematicQuery {
    pub lat: f64,
    pub lon: f64,
    pub year: String,
}

#[derive(Debug, Deserialize)]
pub struct VillageQuery {
    pub village: String,
}

#[derive(Debug, Deserialize)]
pub struct EllipsoidQuery {
    pub id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FloodRunoffQuery {
    pub catchment_id: String,
    pub outlet_lat: f64,
    pub outlet_lon: f64,
}

#[derive(Debug, Deserialize)]
pub struct QueryBody {
    #[serde(default)]
    pub query: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct Gateway {
    client: reqwest::Client,
    upstream: Arc<UpstreamConfig>,
    executor_url: Option<Arc<str>>,
}

impl Gateway {
    pub fn new(upstream: UpstreamConfig, executor_url: Option<String>) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("bhuvan-backend/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Gateway {
            client,
            upstream: Arc::new(upstream),
            executor_url: executor_url.map(Arc::from),
        })
    }

    pub fn has_executor(&self) -> bool {
        self.executor_url.is_some()
    }

    async fn get(
        &self,
        path: &str,
        query: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<reqwest::Response, GatewayError> {
        let url = format!("{}{}", self.upstream.base_url, path);
        debug!(%url, "upstream request");
        let resp = self
            .client
            .get(&url)
            .query(query)
            .timeout(timeout)
            .send()
            .await
            .inspect_err(|e| warn!(%url, error = %e, "upstream unreachable"))?;
        ensure_success(resp).await
    }

    pub async fn routing(&self, q: &RoutingQuery) -> Result<Relayed, GatewayError> {
        let (lat1, lon1, lat2, lon2) = (
            q.lat1.to_string(),
            q.lon1.to_string(),
            q.lat2.to_string(),
            q.lon2.to_string(),
        );
        let resp = self
            .get(
                "/api/routing/curl_routing_state.php",
                &[
                    ("lat1", lat1.as_str()),
                    ("lon1", lon1.as_str()),
                    ("lat2", lat2.as_str()),
                    ("lon2", lon2.as_str()),
                    ("token", self.upstream.tokens.route.as_str()),
                ],
                self.upstream.timeout,
            )
            .await?;
        relay(resp).await
    }

    pub async fn thematic(&self, q: &ThematicQuery) -> Result<Relayed, GatewayError> {
        let (lat, lon) = (q.lat.to_string(), q.lon.to_string());
        let resp = self
            .get(
                "/api/lulc250k/curl_lulc250k_point.php",
                &[
                    ("lat", lat.as_str()),
                    ("lon", lon.as_str()),
                    ("year", q.year.as_str()),
                    ("token", self.upstream.tokens.thematic.as_str()),
                ],
                self.upstream.thematic_timeout,
            )
            .await?;
        relay(resp).await
    }

    pub async fn village(&self, q: &VillageQuery) -> Result<Relayed, GatewayError> {
        let resp = self
            .get(
                "/api/api_proximity/curl_village_geocode.php",
                &[
                    ("village", q.village.as_str()),
                    ("token", self.upstream.tokens.village.as_str()),
                ],
                self.upstream.timeout,
            )
            .await?;
        relay(resp).await
    }

    pub async fn flood_runoff(&self, q: &FloodRunoffQuery) -> Result<Relayed, GatewayError> {
        let (lat, lon) = (q.outlet_lat.to_string(), q.outlet_lon.to_string());
        let resp = self
            .get(
                "/api/floodrunoff",
                &[
                    ("catchmentId", q.catchment_id.as_str()),
                    ("outletLat", lat.as_str()),
                    ("outletLon", lon.as_str()),
                    ("token", self.upstream.tokens.flood.as_str()),
                ],
                self.upstream.timeout,
            )
            .await?;
        relay(resp).await
    }

    /// Stream the geoid archive for `id` back as a zip attachment.
    pub async fn ellipsoid(&self, q: &EllipsoidQuery) -> Result<Response, GatewayError> {
        let resp = self
            .get(
                "/api/geoid/curl_gdal_api.php",
                &[
                    ("id", q.id.as_str()),
                    ("datum", "elipsoid"),
                    ("se", "CDEM"),
                    ("key", self.upstream.tokens.geoid.as_str()),
                ],
                self.upstream.timeout,
            )
            .await?;
        let disposition = HeaderValue::from_str(&format!(
            "attachment; filename=\"{}.zip\"",
            attachment_name(&q.id)
        ))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
        Ok((
            resp.status(),
            [
                (header::CONTENT_TYPE, HeaderValue::from_static("application/zip")),
                (header::CONTENT_DISPOSITION, disposition),
            ],
            Body::from_stream(resp.bytes_stream()),
        )
            .into_response())
    }

    async fn execute(&self, endpoint: &str, user: &UserId, query: &str) -> Result<Relayed, GatewayError> {
        let base = self
            .executor_url
            .as_deref()
            .ok_or(GatewayError::ExecutorUnavailable)?;
        let url = format!("{base}/api/bhuvan/{endpoint}");
        debug!(%url, user = %user, "executor request");
        let resp = self
            .client
            .post(&url)
            .header(USER_ID_HEADER, user.as_str())
            .json(&json!({ "query": query }))
            .timeout(self.upstream.timeout)
            .send()
            .await
            .inspect_err(|e| warn!(%url, error = %e, "executor unreachable"))?;
        relay(ensure_success(resp).await?).await
    }

    pub async fn execute_query(&self, user: &UserId, query: &str) -> Result<Relayed, GatewayError> {
        self.execute("execute-query", user, query).await
    }

    pub async fn execute_central_query(
        &self,
        user: &UserId,
        query: &str,
    ) -> Result<Relayed, GatewayError> {
        self.execute("execute-central-query", user, query).await
    }

    /// Run `query` on the caller's database and return the `data` rows.
    ///
    /// An `error` member in a 2xx payload is treated as a failure.
    pub async fn query_rows(&self, user: &UserId, query: &str) -> Result<Vec<Value>, GatewayError> {
        let relayed = self.execute_query(user, query).await?;
        let payload = relayed
            .json()
            .map_err(|e| GatewayError::Executor(format!("unreadable executor response: {e}")))?;
        if let Some(err) = payload.get("error") {
            let message = err.as_str().map(String::from).unwrap_or_else(|| err.to_string());
            return Err(GatewayError::Executor(message));
        }
        Ok(payload
            .get("data")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }
}

async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let reason = status
        .canonical_reason()
        .unwrap_or("Upstream Error")
        .to_string();
    let bytes = resp.bytes().await?;
    let details = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    warn!(status = %status, "upstream returned an error");
    Err(GatewayError::Upstream {
        status,
        reason,
        details,
    })
}

async fn relay(resp: reqwest::Response) -> Result<Relayed, GatewayError> {
    let status = resp.status();
    let content_type = resp.headers().get(header::CONTENT_TYPE).cloned();
    let body = resp.bytes().await?;
    Ok(Relayed {
        status,
        content_type,
        body,
    })
}

// Keep only characters that are safe inside a quoted filename.
fn attachment_name(id: &str) -> String {
    let name: String = id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect();
    if name.is_empty() {
        "ellipsoid".to_string()
    } else {
        name
    }
}

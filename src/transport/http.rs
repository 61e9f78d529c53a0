use super::{CompletionTransport, HealthStatus, TransportError, TransportResult};
use crate::config::InferenceConfig;
use crate::error::ApiError;
use crate::error_code::ErrorKind;
use crate::types::request::CompletionRequest;
use crate::Result;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde_json::Value;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

/// Fixed timeout for health probes, independent of the completion timeout.
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Characters of a non-200 body kept in error details.
const RESPONSE_TEXT_LIMIT: usize = 200;

const HEALTH_SEGMENT: &str = "health";

/// Blocking HTTP transport bound to one completion endpoint.
///
/// Holds one pooled `reqwest` client for its whole life. `close()` drops the
/// client; calls made after that fail with `network_error` without touching
/// the network.
pub struct HttpTransport {
    client: RwLock<Option<Client>>,
    endpoint: Url,
    timeout_secs: f64,
}

impl HttpTransport {
    pub fn new(config: &InferenceConfig) -> Result<Self> {
        let endpoint = parse_endpoint(&config.endpoint_url)?;
        let timeout = timeout_duration(config.timeout_secs)?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .build()
            .map_err(TransportError::Build)?;

        Ok(Self {
            client: RwLock::new(Some(client)),
            endpoint,
            timeout_secs: config.timeout_secs,
        })
    }

    /// Health route derived from the endpoint: the completion segment is replaced by `health`.
    pub fn health_url(&self) -> Url {
        self.derived_url(Some(HEALTH_SEGMENT))
    }

    /// The endpoint with its completion segment removed.
    pub fn root_url(&self) -> Url {
        self.derived_url(None)
    }

    fn derived_url(&self, last_segment: Option<&str>) -> Url {
        let mut url = self.endpoint.clone();
        url.set_query(None);
        url.set_fragment(None);
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().pop();
            if let Some(segment) = last_segment {
                segments.push(segment);
            }
        }
        url
    }

    fn client(&self) -> Option<Client> {
        match self.client.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn closed_error(&self) -> ApiError {
        ApiError::new(ErrorKind::NetworkError, "HTTP client is closed")
            .with_detail("endpoint", self.endpoint.as_str())
    }

    /// Maps a `reqwest` failure onto the closed error taxonomy.
    fn classify(&self, err: &reqwest::Error, latency_ms: f64) -> TransportResult {
        if err.is_timeout() {
            let error = ApiError::new(
                ErrorKind::Timeout,
                format!("Request exceeded {}s timeout", self.timeout_secs),
            )
            .with_detail("endpoint", self.endpoint.as_str());
            TransportResult::failure(error, Some(latency_ms))
        } else if err.is_connect() {
            let error = ApiError::new(ErrorKind::NetworkError, "Cannot connect to inference server")
                .with_detail("endpoint", self.endpoint.as_str())
                .with_detail("error", err.to_string());
            TransportResult::failure(error, None)
        } else {
            let error = ApiError::new(ErrorKind::Unknown, format!("Unexpected error: {}", err))
                .with_detail("exception_type", exception_type_name(err))
                .with_detail("endpoint", self.endpoint.as_str());
            TransportResult::failure(error, None)
        }
    }

    fn probe_root(&self, client: &Client) -> HealthStatus {
        let root = self.root_url();
        match client.get(root.clone()).timeout(HEALTH_TIMEOUT).send() {
            Ok(resp) if matches!(resp.status().as_u16(), 200 | 404) => {
                // A 404 only proves something is listening on the port.
                warn!(
                    url = root.as_str(),
                    http_status = resp.status().as_u16(),
                    "health route unavailable; treating root response as healthy (weak signal)"
                );
                HealthStatus::up()
            }
            Ok(resp) => HealthStatus::down(format!(
                "Server unhealthy (status {})",
                resp.status().as_u16()
            )),
            Err(e) if e.is_timeout() => HealthStatus::down("Connection timeout"),
            Err(e) if e.is_connect() => {
                HealthStatus::down(format!("Cannot connect to {}", self.endpoint))
            }
            Err(e) => HealthStatus::down(format!("Health check error: {}", e)),
        }
    }
}

impl CompletionTransport for HttpTransport {
    fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    fn post_completion(&self, payload: &CompletionRequest) -> TransportResult {
        let Some(client) = self.client() else {
            return TransportResult::failure(self.closed_error(), None);
        };

        let request_id = Uuid::new_v4().to_string();
        let start = Instant::now();

        let sent = client
            .post(self.endpoint.clone())
            .header("x-request-id", request_id.as_str())
            .json(payload)
            .send();

        let response = match sent {
            Ok(resp) => resp,
            Err(e) => {
                let result = self.classify(&e, elapsed_ms(start));
                log_failure(&request_id, self.endpoint.as_str(), None, &result);
                return result;
            }
        };

        let status = response.status().as_u16();
        let body = match response.text() {
            Ok(body) => body,
            Err(e) => {
                let result = self.classify(&e, elapsed_ms(start));
                log_failure(&request_id, self.endpoint.as_str(), Some(status), &result);
                return result;
            }
        };
        let latency_ms = elapsed_ms(start);

        if status != 200 {
            let error = ApiError::new(ErrorKind::ServerError, format!("HTTP {}", status))
                .with_detail("status", status)
                .with_detail(
                    "response_text",
                    body.chars().take(RESPONSE_TEXT_LIMIT).collect::<String>(),
                );
            let result = TransportResult::failure(error, Some(latency_ms));
            log_failure(&request_id, self.endpoint.as_str(), Some(status), &result);
            return result;
        }

        let result = match serde_json::from_str::<Value>(&body) {
            Ok(Value::Object(map)) => TransportResult::success(map, latency_ms),
            Ok(other) => TransportResult::failure(
                ApiError::new(ErrorKind::InvalidResponse, "Expected a JSON object in response")
                    .with_detail("json_type", json_type_name(&other)),
                Some(latency_ms),
            ),
            Err(e) => TransportResult::failure(
                ApiError::new(ErrorKind::InvalidResponse, "Invalid JSON in response")
                    .with_detail("parse_error", e.to_string()),
                Some(latency_ms),
            ),
        };

        if result.succeeded() {
            info!(
                request_id = request_id.as_str(),
                endpoint = self.endpoint.as_str(),
                http_status = status,
                latency_ms,
                "completion request succeeded"
            );
        } else {
            log_failure(&request_id, self.endpoint.as_str(), Some(status), &result);
        }
        result
    }

    fn check_health(&self) -> HealthStatus {
        let Some(client) = self.client() else {
            return HealthStatus::down("HTTP client is closed");
        };

        let health = self.health_url();
        match client.get(health.clone()).timeout(HEALTH_TIMEOUT).send() {
            Ok(resp) if resp.status().as_u16() == 200 => HealthStatus::up(),
            Ok(resp) if resp.status().as_u16() == 404 => {
                debug!(url = health.as_str(), "health route not found, probing root");
                self.probe_root(&client)
            }
            Ok(resp) => HealthStatus::down(format!(
                "Server unhealthy (status {})",
                resp.status().as_u16()
            )),
            Err(e) => {
                debug!(url = health.as_str(), error = %e, "health probe failed, probing root");
                self.probe_root(&client)
            }
        }
    }

    fn close(&self) {
        let mut guard = match self.client.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if guard.take().is_some() {
            debug!(endpoint = self.endpoint.as_str(), "http transport closed");
        }
    }
}

fn parse_endpoint(raw: &str) -> std::result::Result<Url, TransportError> {
    let url = Url::parse(raw).map_err(|e| TransportError::InvalidEndpoint {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(TransportError::InvalidEndpoint {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    Ok(url)
}

fn timeout_duration(secs: f64) -> std::result::Result<Duration, TransportError> {
    if !(secs.is_finite() && secs > 0.0) {
        return Err(TransportError::InvalidTimeout { secs });
    }
    Duration::try_from_secs_f64(secs).map_err(|_| TransportError::InvalidTimeout { secs })
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

fn exception_type_name(err: &reqwest::Error) -> &'static str {
    if err.is_builder() {
        "reqwest::Error(builder)"
    } else if err.is_redirect() {
        "reqwest::Error(redirect)"
    } else if err.is_body() {
        "reqwest::Error(body)"
    } else if err.is_decode() {
        "reqwest::Error(decode)"
    } else if err.is_request() {
        "reqwest::Error(request)"
    } else {
        "reqwest::Error"
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn log_failure(request_id: &str, endpoint: &str, http_status: Option<u16>, result: &TransportResult) {
    if let Some(error) = result.error() {
        info!(
            request_id,
            endpoint,
            http_status,
            error_code = error.code(),
            latency_ms = result.latency_ms(),
            "completion request failed"
        );
    }
}

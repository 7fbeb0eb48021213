use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Method, StatusCode, header::RETRY_AFTER};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::client::{
    CircuitBreaker, ClientConfig, RateLimitMetrics, RateLimiter, ReservationApi, TokenCache,
    retry_delay,
};
use crate::error::ApiError;
use crate::kv::KvStore;
use crate::types::{
    AuthToken, CircuitMetrics, CreatedReservation, ExistingReservation, HealthStatus,
    ListEnvelope, ReservationPayload, Room, TokenResponse,
};

/// HTTP client for the target reservation service.
///
/// Every call passes the circuit gate first, then runs up to
/// `retry.max_attempts` attempts of: token, rate-limit slot, request,
/// status mapping. Only transient failures are retried and only exhausted
/// transient failures count against the breaker.
pub struct ResilientClient {
    http: reqwest::Client,
    config: ClientConfig,
    tokens: TokenCache,
    limiter: RateLimiter,
    breaker: CircuitBreaker,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientMetrics {
    pub circuit: CircuitMetrics,
    pub rate_limit: RateLimitMetrics,
}

impl ResilientClient {
    pub fn new(mut config: ClientConfig, store: Arc<dyn KvStore>) -> Result<Self, ApiError> {
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| ApiError::Connection(format!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            http,
            tokens: TokenCache::new(store.clone(), config.token_key.clone(), config.token_ttl),
            limiter: RateLimiter::with_window(config.requests_per_minute, config.rate_window),
            breaker: CircuitBreaker::new(store, config.breaker.clone()),
            config,
        })
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub async fn metrics(&self) -> Result<ClientMetrics, ApiError> {
        Ok(ClientMetrics {
            circuit: self.breaker.metrics().await?,
            rate_limit: self.limiter.metrics(),
        })
    }

    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value, ApiError> {
        self.request(Method::GET, path, query, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        self.request(Method::POST, path, &[], Some(body)).await
    }

    pub async fn put(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        self.request(Method::PUT, path, &[], Some(body)).await
    }

    pub async fn delete(&self, path: &str, query: &[(&str, String)]) -> Result<Value, ApiError> {
        self.request(Method::DELETE, path, query, None).await
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        self.breaker.can_execute().await?;

        let max_attempts = self.config.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.attempt(&method, path, query, body).await {
                Ok(value) => {
                    if let Err(err) = self.breaker.record_success().await {
                        tracing::warn!(error = %err, "failed to record circuit success");
                    }
                    return Ok(value);
                }
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    let delay = retry_delay(&self.config.retry, attempt, &err);
                    tracing::warn!(
                        %method,
                        path,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    if err.is_transient() {
                        if let Err(store_err) = self.breaker.record_failure(&err).await {
                            tracing::warn!(error = %store_err, "failed to record circuit failure");
                        }
                        tracing::error!(
                            %method,
                            path,
                            attempts = attempt,
                            error = %err,
                            "request failed after retries"
                        );
                    } else {
                        tracing::debug!(%method, path, kind = err.kind(), error = %err, "request rejected");
                    }
                    return Err(err);
                }
            }
        }
    }

    async fn attempt(
        &self,
        method: &Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        let token = self.ensure_token().await?;
        self.limiter.acquire().await;

        let mut request = self
            .http
            .request(method.clone(), self.url(path))
            .bearer_auth(&token.value);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        self.parse_response(response).await
    }

    async fn ensure_token(&self) -> Result<AuthToken, ApiError> {
        if let Some(token) = self.tokens.current().await? {
            return Ok(token);
        }

        self.limiter.acquire().await;
        let response = self
            .http
            .post(self.url("/auth/token"))
            .json(&json!({
                "username": self.config.username,
                "password": self.config.password,
            }))
            .send()
            .await?;
        let granted: TokenResponse = decode(self.parse_response(response).await?)?;

        let token = self.tokens.store(granted.token, granted.expires_in).await?;
        tracing::info!(ttl_secs = token.ttl_secs, "acquired auth token");
        Ok(token)
    }

    async fn parse_response(&self, response: reqwest::Response) -> Result<Value, ApiError> {
        let status = response.status();
        if status.is_success() {
            let bytes = response.bytes().await?;
            if bytes.iter().all(u8::is_ascii_whitespace) {
                return Ok(Value::Null);
            }
            return serde_json::from_slice(&bytes).map_err(|err| ApiError::Decode(err.to_string()));
        }

        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok());
        let body = response.text().await.unwrap_or_default();

        Err(match status {
            StatusCode::UNAUTHORIZED => {
                if let Err(err) = self.tokens.invalidate().await {
                    tracing::warn!(error = %err, "failed to clear cached token");
                }
                tracing::warn!("target service rejected credentials, token cleared");
                ApiError::Auth(error_message(status, &body))
            }
            StatusCode::FORBIDDEN => ApiError::Permission(error_message(status, &body)),
            StatusCode::NOT_FOUND => ApiError::NotFound(error_message(status, &body)),
            StatusCode::UNPROCESSABLE_ENTITY => ApiError::Validation(validation_message(status, &body)),
            StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited { retry_after },
            status if status.is_server_error() => ApiError::Server {
                status: status.as_u16(),
                message: error_message(status, &body),
            },
            status => ApiError::UnexpectedStatus {
                status: status.as_u16(),
                message: error_message(status, &body),
            },
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl ReservationApi for ResilientClient {
    async fn list_rooms(&self) -> Result<Vec<Room>, ApiError> {
        let value = self.get("/rooms", &[]).await?;
        Ok(decode::<ListEnvelope<Room>>(value)?.into_vec())
    }

    async fn list_reservations(
        &self,
        room_id: i64,
        date: NaiveDate,
    ) -> Result<Vec<ExistingReservation>, ApiError> {
        let query = [
            ("room", room_id.to_string()),
            ("date", date.format("%Y-%m-%d").to_string()),
        ];
        let value = self.get("/reservations", &query).await?;
        Ok(decode::<ListEnvelope<ExistingReservation>>(value)?.into_vec())
    }

    async fn create_reservation(
        &self,
        payload: &ReservationPayload,
    ) -> Result<CreatedReservation, ApiError> {
        let body = serde_json::to_value(payload).map_err(|err| ApiError::Decode(err.to_string()))?;
        let value = self.post("/reservations", &body).await?;
        decode(unwrap_data(value))
    }

    async fn delete_reservation(&self, id: i64, purge: bool) -> Result<(), ApiError> {
        let query = if purge {
            vec![("purge", "true".to_string())]
        } else {
            Vec::new()
        };
        self.delete(&format!("/reservations/{id}"), &query).await?;
        Ok(())
    }

    async fn health(&self) -> Result<HealthStatus, ApiError> {
        decode(self.get("/health", &[]).await?)
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|err| ApiError::Decode(err.to_string()))
}

fn unwrap_data(value: Value) -> Value {
    match value {
        Value::Object(mut object) if object.get("data").is_some_and(Value::is_object) => {
            object.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(Value::Object(object)) = serde_json::from_str::<Value>(body) {
        for field in ["message", "error", "detail"] {
            if let Some(Value::String(message)) = object.get(field) {
                return message.clone();
            }
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("no response body")
            .to_string()
    } else {
        trimmed.chars().take(200).collect()
    }
}

/// Joins `{"errors": {"field": ["msg", ...]}}` into `field: msg, msg; ...`.
fn validation_message(status: StatusCode, body: &str) -> String {
    let errors = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value.get("errors").cloned());

    let Some(Value::Object(errors)) = errors else {
        return error_message(status, body);
    };

    let joined: Vec<String> = errors
        .iter()
        .map(|(field, messages)| {
            let messages = match messages {
                Value::Array(items) => items
                    .iter()
                    .map(|item| item.as_str().map_or_else(|| item.to_string(), str::to_string))
                    .collect::<Vec<_>>()
                    .join(", "),
                Value::String(message) => message.clone(),
                other => other.to_string(),
            };
            format!("{field}: {messages}")
        })
        .collect();

    if joined.is_empty() {
        error_message(status, body)
    } else {
        joined.join("; ")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_joined_per_field() {
        let body = r#"{"message":"invalid","errors":{"name":["is required"],"roomId":["unknown room","must be active"]}}"#;

        assert_eq!(
            validation_message(StatusCode::UNPROCESSABLE_ENTITY, body),
            "name: is required; roomId: unknown room, must be active"
        );
    }

    #[test]
    fn error_message_falls_back_to_reason_phrase() {
        assert_eq!(error_message(StatusCode::FORBIDDEN, ""), "Forbidden");
        assert_eq!(
            error_message(StatusCode::NOT_FOUND, r#"{"message":"room 9 missing"}"#),
            "room 9 missing"
        );
    }

    #[test]
    fn wrapped_create_response_is_unwrapped() {
        let created: CreatedReservation =
            decode(unwrap_data(json!({"data": {"id": 41, "recurrent": true}}))).unwrap();
        assert_eq!(created.id, Some(41));
        assert!(created.recurrent);
    }
}

use std::time::Duration;

use async_trait::async_trait;
use crewbot_core::TransportError;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, warn};

/// A named external endpoint plus everything needed to call it once.
#[derive(Clone, Debug)]
pub struct Endpoint {
    pub service: &'static str,
    pub url: String,
    pub bearer_token: Option<SecretString>,
    pub timeout: Duration,
}

impl Endpoint {
    pub fn new(service: &'static str, url: impl Into<String>, timeout: Duration) -> Self {
        Self { service, url: url.into(), bearer_token: None, timeout }
    }

    pub fn with_bearer(mut self, token: SecretString) -> Self {
        self.bearer_token = Some(token);
        self
    }
}

/// One request, one attempt: GET without a payload, POST with a JSON body
/// otherwise. Non-2xx statuses, network failures and timeouts all come back
/// as [`TransportError`].
#[async_trait]
pub trait ApiClient: Send + Sync {
    async fn call(
        &self,
        endpoint: &Endpoint,
        payload: Option<&Value>,
    ) -> Result<Vec<u8>, TransportError>;
}

#[derive(Clone, Default)]
pub struct HttpApiClient {
    client: Client,
}

impl HttpApiClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ApiClient for HttpApiClient {
    async fn call(
        &self,
        endpoint: &Endpoint,
        payload: Option<&Value>,
    ) -> Result<Vec<u8>, TransportError> {
        let request = match payload {
            Some(body) => self.client.post(&endpoint.url).json(body),
            None => self.client.get(&endpoint.url),
        };
        let request = match &endpoint.bearer_token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        };

        debug!(
            event_name = "egress.api.request",
            service = endpoint.service,
            url = %endpoint.url,
            method = if payload.is_some() { "POST" } else { "GET" },
            "calling external api"
        );

        let response = request
            .timeout(endpoint.timeout)
            .send()
            .await
            .map_err(|error| classify(endpoint, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|error| format!("<failed to read response body: {error}>"));
            warn!(
                event_name = "egress.api.bad_status",
                service = endpoint.service,
                status = status.as_u16(),
                body = %truncate(&body, 256),
                "external api returned non-success status"
            );
            return Err(TransportError::status(endpoint.service, status.as_u16()));
        }

        let bytes = response.bytes().await.map_err(|error| classify(endpoint, error))?;
        Ok(bytes.to_vec())
    }
}

fn classify(endpoint: &Endpoint, error: reqwest::Error) -> TransportError {
    let classified = if error.is_timeout() {
        TransportError::timeout(endpoint.service, endpoint.timeout)
    } else {
        TransportError::network(endpoint.service, error.to_string())
    };

    warn!(
        event_name = "egress.api.failed",
        service = endpoint.service,
        error = %classified,
        "external api call failed"
    );
    classified
}

fn truncate(value: &str, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((index, _)) => format!("{}…", &value[..index]),
        None => value.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::{
        http::{HeaderMap, StatusCode},
        routing::{get, post},
        Json, Router,
    };
    use crewbot_core::TransportErrorKind;
    use serde_json::{json, Value};

    use super::{truncate, ApiClient, Endpoint, HttpApiClient};

    async fn echo(headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
        let authorization = headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_owned();
        Json(json!({ "authorization": authorization, "body": body }))
    }

    async fn spawn_server() -> String {
        let app = Router::new()
            .route("/echo", post(echo))
            .route("/quote", get(|| async { Json(json!([{ "q": "Do it.", "a": "Nike" }])) }))
            .route("/unavailable", get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "loading") }))
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "late"
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind listener");
        let address = listener.local_addr().expect("listener address");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{address}")
    }

    fn endpoint(base: &str, path: &str) -> Endpoint {
        Endpoint::new("test", format!("{base}{path}"), Duration::from_secs(2))
    }

    #[tokio::test]
    async fn post_sends_json_body_and_bearer_token() {
        let base = spawn_server().await;
        let client = HttpApiClient::new();
        let endpoint = endpoint(&base, "/echo").with_bearer("hf_secret".to_owned().into());

        let bytes = client
            .call(&endpoint, Some(&json!({ "inputs": "hi" })))
            .await
            .expect("echo call");
        let echoed: Value = serde_json::from_slice(&bytes).expect("json");

        assert_eq!(echoed["authorization"], "Bearer hf_secret");
        assert_eq!(echoed["body"], json!({ "inputs": "hi" }));
    }

    #[tokio::test]
    async fn get_returns_raw_bytes() {
        let base = spawn_server().await;
        let bytes =
            HttpApiClient::new().call(&endpoint(&base, "/quote"), None).await.expect("quote call");

        let decoded: Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(decoded[0]["q"], "Do it.");
    }

    #[tokio::test]
    async fn non_success_status_is_a_transport_error() {
        let base = spawn_server().await;
        let error = HttpApiClient::new()
            .call(&endpoint(&base, "/unavailable"), None)
            .await
            .expect_err("503 must fail");

        assert_eq!(error.service, "test");
        assert_eq!(error.kind, TransportErrorKind::Status(503));
    }

    #[tokio::test]
    async fn timeout_expiry_is_a_transport_error() {
        let base = spawn_server().await;
        let endpoint = Endpoint::new("slow", format!("{base}/slow"), Duration::from_millis(200));

        let error = HttpApiClient::new().call(&endpoint, None).await.expect_err("must time out");
        assert_eq!(error.kind, TransportErrorKind::Timeout(Duration::from_millis(200)));
    }

    #[tokio::test]
    async fn connection_failure_is_a_transport_error() {
        let endpoint = Endpoint::new("down", "http://127.0.0.1:1/", Duration::from_secs(2));

        let error = HttpApiClient::new().call(&endpoint, None).await.expect_err("must fail");
        assert!(matches!(error.kind, TransportErrorKind::Network(_)));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé…");
        assert_eq!(truncate("short", 10), "short");
    }
}

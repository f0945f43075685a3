use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use crewbot_core::config::InferenceConfig;
use crewbot_core::{normalize_bytes, TransportError};
use serde_json::json;

use crate::http::{ApiClient, Endpoint};

pub const SERVICE_NAME: &str = "inference";

/// Text generation backend used by the `ask` command.
#[async_trait]
pub trait InferenceService: Send + Sync {
    /// Returns the generated answer, or the fixed fallback sentence when the
    /// backend answered with something that has no usable text in it.
    async fn generate(&self, prompt: &str) -> Result<String, TransportError>;
}

pub struct HuggingFaceInference {
    client: Arc<dyn ApiClient>,
    endpoint: Endpoint,
}

impl HuggingFaceInference {
    pub fn new(client: Arc<dyn ApiClient>, endpoint: Endpoint) -> Self {
        Self { client, endpoint }
    }

    pub fn from_config(client: Arc<dyn ApiClient>, config: &InferenceConfig) -> Self {
        let endpoint = Endpoint::new(
            SERVICE_NAME,
            config.endpoint.clone(),
            Duration::from_secs(config.timeout_secs),
        )
        .with_bearer(config.api_key.clone());
        Self::new(client, endpoint)
    }
}

#[async_trait]
impl InferenceService for HuggingFaceInference {
    async fn generate(&self, prompt: &str) -> Result<String, TransportError> {
        let payload = json!({ "inputs": prompt });
        let body = self.client.call(&self.endpoint, Some(&payload)).await?;
        Ok(normalize_bytes(&body))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use crewbot_core::{TransportError, FALLBACK_TEXT};
    use serde_json::{json, Value};

    use super::{HuggingFaceInference, InferenceService};
    use crate::http::{ApiClient, Endpoint};

    struct ScriptedClient {
        response: Result<Vec<u8>, TransportError>,
        payloads: Mutex<Vec<Option<Value>>>,
    }

    impl ScriptedClient {
        fn answering(body: &str) -> Self {
            Self { response: Ok(body.as_bytes().to_vec()), payloads: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl ApiClient for ScriptedClient {
        async fn call(
            &self,
            _endpoint: &Endpoint,
            payload: Option<&Value>,
        ) -> Result<Vec<u8>, TransportError> {
            self.payloads.lock().expect("payload lock").push(payload.cloned());
            self.response.clone()
        }
    }

    fn service(client: Arc<ScriptedClient>) -> HuggingFaceInference {
        HuggingFaceInference::new(
            client,
            Endpoint::new("inference", "http://localhost/model", Duration::from_secs(1)),
        )
    }

    #[tokio::test]
    async fn wraps_prompt_in_inputs_field() {
        let client = Arc::new(ScriptedClient::answering(r#"[{"generated_text":"Paris"}]"#));
        let answer = service(client.clone()).generate("capital of France?").await.expect("answer");

        assert_eq!(answer, "Paris");
        let payloads = client.payloads.lock().expect("payload lock");
        assert_eq!(payloads.as_slice(), &[Some(json!({ "inputs": "capital of France?" }))]);
    }

    #[tokio::test]
    async fn unusable_body_becomes_fallback_text() {
        let client = Arc::new(ScriptedClient::answering(r#"{"error":"Model is loading"}"#));
        let answer = service(client).generate("hi").await.expect("answer");

        assert_eq!(answer, FALLBACK_TEXT);
    }

    #[tokio::test]
    async fn transport_failures_propagate() {
        let client = Arc::new(ScriptedClient {
            response: Err(TransportError::status("inference", 503)),
            payloads: Mutex::new(Vec::new()),
        });

        let error = service(client).generate("hi").await.expect_err("must fail");
        assert_eq!(error, TransportError::status("inference", 503));
    }
}

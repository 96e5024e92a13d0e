// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Model provider interface
//!
//! The pretrained classifiers live outside this crate. A provider loads a
//! model and runs it on text, returning four raw logits in classifier head
//! order (false, true, misleading, unverifiable).
//!
//! - [`HttpModelProvider`] talks to an inference server over HTTP
//! - [`ExternalModels`] delegates to a closure (embedding, tests)
//! - [`NoModels`] reports every model as unavailable

use crate::error::{VerifyError, VerifyResult};
use crate::predictor::ModelId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Raw classifier output in head order
pub type Logits = [f64; 4];

/// A model that has been loaded by a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelHandle {
    pub model: ModelId,
    /// Checkpoint name on the provider side
    pub name: String,
}

/// Trait for model inference backends
pub trait ModelProvider: Send + Sync {
    /// Make a model ready for inference
    fn load(&self, model: ModelId) -> VerifyResult<ModelHandle>;

    /// Run inference on preprocessed text
    fn run(&self, handle: &ModelHandle, text: &str) -> VerifyResult<Logits>;
}

/// Provider with no models; every load fails
#[derive(Debug, Clone, Copy, Default)]
pub struct NoModels;

impl ModelProvider for NoModels {
    fn load(&self, model: ModelId) -> VerifyResult<ModelHandle> {
        Err(VerifyError::Provider(format!(
            "no model provider configured for {}",
            model
        )))
    }

    fn run(&self, handle: &ModelHandle, _text: &str) -> VerifyResult<Logits> {
        Err(VerifyError::Provider(format!("model {} is not loaded", handle.model)))
    }
}

type RunFn = Box<dyn Fn(ModelId, &str) -> VerifyResult<Logits> + Send + Sync>;

/// Provider that calls a scoring function for a fixed set of models
pub struct ExternalModels {
    available: Vec<ModelId>,
    run_fn: RunFn,
}

impl ExternalModels {
    pub fn new(
        available: Vec<ModelId>,
        run_fn: impl Fn(ModelId, &str) -> VerifyResult<Logits> + Send + Sync + 'static,
    ) -> Self {
        Self {
            available,
            run_fn: Box::new(run_fn),
        }
    }
}

impl ModelProvider for ExternalModels {
    fn load(&self, model: ModelId) -> VerifyResult<ModelHandle> {
        if self.available.contains(&model) {
            Ok(ModelHandle {
                model,
                name: model.hub_name().to_string(),
            })
        } else {
            Err(VerifyError::Provider(format!("model {} is not available", model)))
        }
    }

    fn run(&self, handle: &ModelHandle, text: &str) -> VerifyResult<Logits> {
        (self.run_fn)(handle.model, text)
    }
}

/// Connection settings for the inference server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Base URL of the inference server; `None` runs on fallback rules only
    pub endpoint: Option<String>,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Characters of claim text sent to a model
    pub max_input_chars: usize,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: 30,
            max_input_chars: 512,
        }
    }
}

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    logits: Vec<f64>,
}

/// Inference server client
///
/// `GET {endpoint}/models/{name}` checks a model is served;
/// `POST {endpoint}/models/{name}/predict` with `{"text": ...}` returns
/// `{"logits": [f64; 4]}`.
pub struct HttpModelProvider {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl HttpModelProvider {
    pub fn new(endpoint: &str, timeout: Duration) -> VerifyResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("nexus-verifier/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| VerifyError::Provider(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn model_url(&self, name: &str) -> String {
        format!("{}/models/{}", self.endpoint, name)
    }
}

impl ModelProvider for HttpModelProvider {
    fn load(&self, model: ModelId) -> VerifyResult<ModelHandle> {
        let name = model.hub_name();
        tracing::info!("Loading model {} ({}) from {}", model, name, self.endpoint);

        self.client
            .get(self.model_url(name))
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| VerifyError::Provider(format!("model {} failed to load: {}", model, e)))?;

        Ok(ModelHandle {
            model,
            name: name.to_string(),
        })
    }

    fn run(&self, handle: &ModelHandle, text: &str) -> VerifyResult<Logits> {
        let response: PredictResponse = self
            .client
            .post(format!("{}/predict", self.model_url(&handle.name)))
            .json(&PredictRequest { text })
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json())
            .map_err(|e| VerifyError::Provider(format!("inference failed for {}: {}", handle.model, e)))?;

        <Logits>::try_from(response.logits.as_slice()).map_err(|_| {
            VerifyError::Provider(format!(
                "model {} returned {} logits, expected 4",
                handle.model,
                response.logits.len()
            ))
        })
    }
}

/// Build the provider described by the configuration
pub fn from_config(config: &ProviderConfig) -> VerifyResult<Arc<dyn ModelProvider>> {
    match config.endpoint.as_deref() {
        Some(endpoint) => Ok(Arc::new(HttpModelProvider::new(
            endpoint,
            Duration::from_secs(config.timeout_secs),
        )?)),
        None => {
            tracing::info!("No inference endpoint configured; models will use fallback rules");
            Ok(Arc::new(NoModels))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::Verdict;
    use crate::predictor::{FallbackRules, ModelPredictor, PredictionSource, Predictor};

    #[test]
    fn test_no_models() {
        let provider = NoModels;
        for model in ModelId::ALL {
            assert!(provider.load(model).is_err());
        }
    }

    #[test]
    fn test_external_models_availability() {
        let provider = ExternalModels::new(vec![ModelId::Deberta], |_, _| Ok([0.1, 0.2, 0.3, 0.4]));
        let handle = provider.load(ModelId::Deberta).unwrap();
        assert_eq!(handle.name, "microsoft/deberta-v3-base");
        assert_eq!(provider.run(&handle, "text").unwrap(), [0.1, 0.2, 0.3, 0.4]);
        assert!(provider.load(ModelId::Bert).is_err());
    }

    #[test]
    fn test_from_config_without_endpoint() {
        let provider = from_config(&ProviderConfig::default()).unwrap();
        assert!(provider.load(ModelId::Roberta).is_err());
    }

    #[test]
    fn test_http_urls() {
        let provider = HttpModelProvider::new("http://localhost:8080/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            provider.model_url("roberta-base"),
            "http://localhost:8080/models/roberta-base"
        );
    }

    /// Serve canned HTTP responses on loopback: `{}` for loads, `predict_body` for predictions
    fn serve_logits(predict_body: &'static str) -> String {
        use std::io::{BufRead, BufReader, Read, Write};
        use std::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut request_line = String::new();
                reader.read_line(&mut request_line).unwrap();

                let mut content_length = 0;
                loop {
                    let mut header = String::new();
                    reader.read_line(&mut header).unwrap();
                    let header = header.trim();
                    if header.is_empty() {
                        break;
                    }
                    if let Some((name, value)) = header.split_once(':') {
                        if name.eq_ignore_ascii_case("content-length") {
                            content_length = value.trim().parse().unwrap();
                        }
                    }
                }
                let mut body = vec![0u8; content_length];
                reader.read_exact(&mut body).unwrap();

                let payload = if request_line.starts_with("POST") { predict_body } else { "{}" };
                write!(
                    stream,
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    payload.len(),
                    payload
                )
                .unwrap();
            }
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_http_run_decodes_logits() {
        let endpoint = serve_logits(r#"{"logits": [0.1, 4.0, 0.2, 0.3]}"#);
        let provider: Arc<dyn ModelProvider> =
            Arc::new(HttpModelProvider::new(&endpoint, Duration::from_secs(5)).unwrap());
        let handle = provider.load(ModelId::Deberta).unwrap();
        assert_eq!(provider.run(&handle, "Vaccines work").unwrap(), [0.1, 4.0, 0.2, 0.3]);

        let predictor = ModelPredictor::new(handle, provider, Arc::new(FallbackRules::default()), 512);
        let verdict = predictor.predict("Vaccines work");
        assert_eq!(verdict.source, PredictionSource::Model);
        // head index 1 is true
        assert_eq!(verdict.verdict, Verdict::True);
    }

    #[test]
    fn test_http_wrong_logit_count_falls_back() {
        let endpoint = serve_logits(r#"{"logits": [0.1, 4.0, 0.2]}"#);
        let provider: Arc<dyn ModelProvider> =
            Arc::new(HttpModelProvider::new(&endpoint, Duration::from_secs(5)).unwrap());
        let handle = provider.load(ModelId::Bert).unwrap();

        match provider.run(&handle, "The earth is flat") {
            Err(VerifyError::Provider(msg)) => assert!(msg.contains("returned 3 logits, expected 4")),
            other => panic!("expected provider error, got {:?}", other),
        }

        let predictor = ModelPredictor::new(handle, provider, Arc::new(FallbackRules::default()), 512);
        let verdict = predictor.predict("The earth is flat");
        assert_eq!(verdict.source, PredictionSource::Fallback);
        assert_eq!(verdict.verdict, Verdict::False);
    }

    #[test]
    fn test_http_unreachable_endpoint_fails_load() {
        // port 9 (discard) on loopback is not an inference server
        let provider = HttpModelProvider::new("http://127.0.0.1:9", Duration::from_millis(200)).unwrap();
        assert!(provider.load(ModelId::Bert).is_err());
    }
}

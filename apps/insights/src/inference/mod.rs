//! Inference client: the single point of entry for the hosted NLP models.
//!
//! Two capabilities are used: a text classifier (`[{label, score}]`) for
//! sentiment and a token classifier (`[{word, entity}]`) for named entities.
//! Analyzers depend on the `InferenceBackend` trait so tests can script
//! failures without a network.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::resume::LabelScore;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const MAX_ATTEMPTS: u32 = 2;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Malformed inference response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Inference service unavailable after {attempts} attempts")]
    Unavailable { attempts: u32 },
}

/// One token (or aggregated span) from a token-classification model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedToken {
    pub word: String,
    #[serde(alias = "entity_group")]
    pub entity: String,
    #[serde(default)]
    pub score: Option<f64>,
}

/// Hosted-model capabilities the analyzers need.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Text classification: labels with confidences, highest first not guaranteed.
    async fn classify(&self, text: &str) -> Result<Vec<LabelScore>, InferenceError>;

    /// Token classification: tagged words or spans.
    async fn tag_entities(&self, text: &str) -> Result<Vec<TaggedToken>, InferenceError>;
}

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
}

/// Classifiers answer either `[{..}]` or `[[{..}]]` depending on the model.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Classification {
    Nested(Vec<Vec<LabelScore>>),
    Flat(Vec<LabelScore>),
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: String,
}

/// HTTP implementation of `InferenceBackend` over a Hugging Face style API.
#[derive(Clone)]
pub struct InferenceClient {
    client: Client,
    base_url: String,
    api_key: String,
    ner_model: String,
    sentiment_model: String,
}

impl InferenceClient {
    pub fn new(
        base_url: String,
        api_key: String,
        ner_model: String,
        sentiment_model: String,
    ) -> Result<Self, InferenceError> {
        Ok(Self {
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            ner_model,
            sentiment_model,
        })
    }

    /// POSTs `text` to a model endpoint and deserializes the JSON answer.
    /// Retries on 429, 5xx and transport errors with exponential backoff.
    async fn post<T: DeserializeOwned>(
        &self,
        model: &str,
        text: &str,
    ) -> Result<T, InferenceError> {
        let url = format!("{}/models/{}", self.base_url, model);
        let body = InferenceRequest { inputs: text };
        let mut last_error: Option<InferenceError> = None;

        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                let delay = Duration::from_millis(500 * (1 << (attempt - 1)));
                warn!(
                    "Inference call to {model} failed (attempt {attempt}), retrying after {}ms",
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = match self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(InferenceError::Http(e));
                    continue;
                }
            };

            let status = response.status();
            if status.as_u16() == 429 || status.is_server_error() {
                let message = response.text().await.unwrap_or_default();
                last_error = Some(InferenceError::Api {
                    status: status.as_u16(),
                    message,
                });
                continue;
            }

            let raw = response.text().await?;
            if !status.is_success() {
                let message = serde_json::from_str::<ApiError>(&raw)
                    .map(|e| e.error)
                    .unwrap_or(raw);
                return Err(InferenceError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            debug!("Inference call to {model} succeeded ({} bytes)", raw.len());
            return Ok(serde_json::from_str(&raw)?);
        }

        Err(last_error.unwrap_or(InferenceError::Unavailable {
            attempts: MAX_ATTEMPTS,
        }))
    }
}

#[async_trait]
impl InferenceBackend for InferenceClient {
    async fn classify(&self, text: &str) -> Result<Vec<LabelScore>, InferenceError> {
        let classification: Classification = self.post(&self.sentiment_model, text).await?;
        Ok(flatten_classification(classification))
    }

    async fn tag_entities(&self, text: &str) -> Result<Vec<TaggedToken>, InferenceError> {
        self.post(&self.ner_model, text).await
    }
}

fn flatten_classification(classification: Classification) -> Vec<LabelScore> {
    match classification {
        Classification::Nested(batches) => batches.into_iter().next().unwrap_or_default(),
        Classification::Flat(labels) => labels,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Backend that answers from fixed data, or fails every call when built with `failing()`.
    pub struct ScriptedInference {
        pub labels: Option<Vec<LabelScore>>,
        pub tokens: Option<Vec<TaggedToken>>,
    }

    impl ScriptedInference {
        pub fn failing() -> Self {
            Self {
                labels: None,
                tokens: None,
            }
        }

        pub fn answering(labels: Vec<LabelScore>, tokens: Vec<TaggedToken>) -> Self {
            Self {
                labels: Some(labels),
                tokens: Some(tokens),
            }
        }
    }

    #[async_trait]
    impl InferenceBackend for ScriptedInference {
        async fn classify(&self, _text: &str) -> Result<Vec<LabelScore>, InferenceError> {
            self.labels.clone().ok_or(InferenceError::Api {
                status: 503,
                message: "model loading".to_string(),
            })
        }

        async fn tag_entities(&self, _text: &str) -> Result<Vec<TaggedToken>, InferenceError> {
            self.tokens
                .clone()
                .ok_or(InferenceError::Unavailable { attempts: MAX_ATTEMPTS })
        }
    }

    pub fn token(word: &str, entity: &str) -> TaggedToken {
        TaggedToken {
            word: word.to_string(),
            entity: entity.to_string(),
            score: Some(0.99),
        }
    }

    #[test]
    fn test_classification_accepts_nested_shape() {
        let body = r#"[[{"label":"POSITIVE","score":0.98},{"label":"NEGATIVE","score":0.02}]]"#;
        let parsed: Classification = serde_json::from_str(body).unwrap();
        let labels = flatten_classification(parsed);
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[0].label, "POSITIVE");
    }

    #[test]
    fn test_classification_accepts_flat_shape() {
        let parsed: Classification =
            serde_json::from_str(r#"[{"label":"NEGATIVE","score":0.9}]"#).unwrap();
        assert_eq!(flatten_classification(parsed)[0].label, "NEGATIVE");
    }

    #[test]
    fn test_tagged_token_accepts_entity_group() {
        let tokens: Vec<TaggedToken> =
            serde_json::from_str(r#"[{"entity_group":"ORG","word":"Google","score":0.99}]"#)
                .unwrap();
        assert_eq!(tokens[0].entity, "ORG");
        assert_eq!(tokens[0].word, "Google");
    }

    mod http {
        use super::*;
        use wiremock::matchers::{body_json, header, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        fn client(server: &MockServer) -> InferenceClient {
            InferenceClient::new(
                format!("{}/", server.uri()),
                "hf_test".to_string(),
                "ner-model".to_string(),
                "sentiment-model".to_string(),
            )
            .unwrap()
        }

        async fn request_count(server: &MockServer) -> usize {
            server.received_requests().await.map(|r| r.len()).unwrap_or(0)
        }

        #[tokio::test]
        async fn test_unavailable_model_is_retried() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/models/sentiment-model"))
                .respond_with(ResponseTemplate::new(503).set_body_string("loading"))
                .up_to_n_times(1)
                .mount(&server)
                .await;
            Mock::given(method("POST"))
                .and(path("/models/sentiment-model"))
                .and(header("authorization", "Bearer hf_test"))
                .and(body_json(serde_json::json!({ "inputs": "Led a team" })))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_string(r#"[[{"label":"POSITIVE","score":0.93}]]"#),
                )
                .mount(&server)
                .await;

            let labels = client(&server).classify("Led a team").await.unwrap();
            assert_eq!(labels.len(), 1);
            assert_eq!(labels[0].label, "POSITIVE");
            assert_eq!(request_count(&server).await, 2);
        }

        #[tokio::test]
        async fn test_rate_limit_exhausts_attempts() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
                .mount(&server)
                .await;

            let err = client(&server).tag_entities("Google").await.unwrap_err();
            assert!(matches!(err, InferenceError::Api { status: 429, .. }));
            assert_eq!(request_count(&server).await, MAX_ATTEMPTS as usize);
        }

        #[tokio::test]
        async fn test_client_error_is_not_retried() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/models/ner-model"))
                .respond_with(
                    ResponseTemplate::new(400).set_body_string(r#"{"error":"Input too long"}"#),
                )
                .mount(&server)
                .await;

            match client(&server).tag_entities("x").await {
                Err(InferenceError::Api { status, message }) => {
                    assert_eq!(status, 400);
                    assert_eq!(message, "Input too long");
                }
                other => panic!("expected API error, got {other:?}"),
            }
            assert_eq!(request_count(&server).await, 1);
        }

        #[tokio::test]
        async fn test_client_error_without_json_keeps_raw_body() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(401).set_body_string("bad token"))
                .mount(&server)
                .await;

            match client(&server).classify("x").await {
                Err(InferenceError::Api { status, message }) => {
                    assert_eq!(status, 401);
                    assert_eq!(message, "bad token");
                }
                other => panic!("expected API error, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn test_malformed_success_body_is_parse_error() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/models/ner-model"))
                .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"oops":true}"#))
                .mount(&server)
                .await;

            let err = client(&server).tag_entities("Google").await.unwrap_err();
            assert!(matches!(err, InferenceError::Parse(_)));
            assert_eq!(request_count(&server).await, 1);
        }

        #[tokio::test]
        async fn test_entity_spans_are_decoded() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/models/ner-model"))
                .respond_with(ResponseTemplate::new(200).set_body_string(
                    r#"[{"entity_group":"ORG","word":"Google","score":0.99}]"#,
                ))
                .mount(&server)
                .await;

            let tokens = client(&server).tag_entities("Worked at Google").await.unwrap();
            assert_eq!(tokens.len(), 1);
            assert_eq!(tokens[0].word, "Google");
            assert_eq!(tokens[0].entity, "ORG");
        }
    }

    #[test]
    fn test_malformed_body_is_parse_error() {
        let err = serde_json::from_str::<Vec<TaggedToken>>(r#"{"oops":true}"#).unwrap_err();
        assert!(matches!(InferenceError::from(err), InferenceError::Parse(_)));
    }
}

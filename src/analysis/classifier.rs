use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::{AnalysisInput, AnalysisOutput};

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("classifier endpoint is not configured")]
    NotConfigured,
    #[error("{0}")]
    Http(#[from] reqwest::Error),
    #[error("classifier returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("{0}")]
    Flow(String),
    #[error("malformed classifier response: {0}")]
    Malformed(String),
}

/// The external AI flow that judges a frame. Treated as opaque.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, input: &AnalysisInput) -> Result<AnalysisOutput, ClassifierError>;

    /// Name for logging.
    fn name(&self) -> &str;
}

#[derive(Serialize)]
struct FlowRequest<'a> {
    data: &'a AnalysisInput,
}

#[derive(Debug, Deserialize)]
struct FlowResponse {
    result: Option<AnalysisOutput>,
    error: Option<FlowErrorBody>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FlowErrorBody {
    Detailed { message: String },
    Plain(String),
}

impl FlowErrorBody {
    fn into_message(self) -> String {
        match self {
            FlowErrorBody::Detailed { message } => message,
            FlowErrorBody::Plain(message) => message,
        }
    }
}

/// Calls a suspicious-behavior flow exposed over HTTP.
///
/// Request body is `{"data": <input>}`; a successful response carries
/// `{"result": {"isSuspicious": .., "reason": ..}}`.
pub struct FlowClassifier {
    client: reqwest::Client,
    endpoint: Option<String>,
    api_key: Option<String>,
}

impl FlowClassifier {
    pub fn new(
        endpoint: Option<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ClassifierError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.filter(|url| !url.trim().is_empty()),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        })
    }
}

#[async_trait]
impl Classifier for FlowClassifier {
    async fn classify(&self, input: &AnalysisInput) -> Result<AnalysisOutput, ClassifierError> {
        let endpoint = self.endpoint.as_deref().ok_or(ClassifierError::NotConfigured)?;

        let mut request = self.client.post(endpoint).json(&FlowRequest { data: input });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        parse_flow_response(status.as_u16(), &body)
    }

    fn name(&self) -> &str {
        "flow"
    }
}

pub(crate) fn parse_flow_response(status: u16, body: &str) -> Result<AnalysisOutput, ClassifierError> {
    let parsed = serde_json::from_str::<FlowResponse>(body);

    if !(200..300).contains(&status) {
        let message = parsed
            .ok()
            .and_then(|response| response.error)
            .map(FlowErrorBody::into_message)
            .unwrap_or_else(|| body.trim().to_string());
        return Err(ClassifierError::Status { status, message });
    }

    let response = parsed.map_err(|err| ClassifierError::Malformed(err.to_string()))?;
    if let Some(error) = response.error {
        return Err(ClassifierError::Flow(error.into_message()));
    }

    response
        .result
        .ok_or_else(|| ClassifierError::Malformed("missing `result` field".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_successful_result() {
        let body = r#"{"result":{"isSuspicious":true,"reason":"Second face in frame"}}"#;
        let output = parse_flow_response(200, body).unwrap();
        assert!(output.is_suspicious);
        assert_eq!(output.reason, "Second face in frame");
    }

    #[test]
    fn flow_error_becomes_flow_variant() {
        let body = r#"{"error":{"status":"RESOURCE_EXHAUSTED","message":"quota exceeded"}}"#;
        let err = parse_flow_response(200, body).unwrap_err();
        assert!(matches!(err, ClassifierError::Flow(_)));
        assert_eq!(err.to_string(), "quota exceeded");
    }

    #[test]
    fn non_success_status_keeps_message() {
        let body = r#"{"error":"invalid api key"}"#;
        let err = parse_flow_response(401, body).unwrap_err();
        assert_eq!(err.to_string(), "classifier returned HTTP 401: invalid api key");
    }

    #[test]
    fn non_json_error_body_is_passed_through() {
        let err = parse_flow_response(502, "Bad Gateway\n").unwrap_err();
        assert_eq!(err.to_string(), "classifier returned HTTP 502: Bad Gateway");
    }

    #[test]
    fn missing_result_is_malformed() {
        let err = parse_flow_response(200, "{}").unwrap_err();
        assert!(matches!(err, ClassifierError::Malformed(_)));
    }

    #[tokio::test]
    async fn unconfigured_endpoint_fails_without_network() {
        let classifier =
            FlowClassifier::new(Some("   ".into()), None, Duration::from_secs(1)).unwrap();
        let input = AnalysisInput {
            video_data_uri: String::new(),
            head_movement_description: String::new(),
            contextual_cues: String::new(),
        };

        let err = classifier.classify(&input).await.unwrap_err();
        assert!(matches!(err, ClassifierError::NotConfigured));
    }
}

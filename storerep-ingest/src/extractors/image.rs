//! AI image extraction
//!
//! A screenshot of an analytics dashboard is sent to an external inference
//! proxy (the collaborator) together with a prompt listing every report
//! field. The proxy answers with a JSON object, possibly wrapped as a string
//! in a Markdown code fence. Every failure is retried on the backoff
//! schedule; the caller always receives an [`ImageExtraction`] outcome.

use super::retry::{run_with_retry, BackoffSchedule, RetryOutcome};
use super::upload::{detect_image_mime, Upload};
use super::ExtractionError;
use crate::alias::{self, AliasResolver};
use crate::normalizer::{normalize, Patch, RawRecord};
use crate::schema::{FieldKind, FIELD_DESCRIPTORS};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Shown when every attempt failed without an error message
pub const FALLBACK_FAILURE_MESSAGE: &str =
    "Image extraction failed. Please try again or enter the values manually.";

const USER_AGENT: &str = concat!("storerep-ingest/", env!("CARGO_PKG_VERSION"));

/// Request body sent to the collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageExtractionRequest {
    pub prompt: String,
    pub mime_type: String,
    pub image_base64: String,
}

/// Response body returned by the collaborator
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CollaboratorResponse {
    extracted_data: Option<Value>,
    error: Option<String>,
}

/// External inference proxy
#[async_trait]
pub trait ExtractionCollaborator: Send + Sync {
    /// Send one extraction request, returning the `extractedData` payload
    async fn request(&self, request: &ImageExtractionRequest) -> Result<Value, ExtractionError>;
}

/// Collaborator reached over HTTP
pub struct HttpCollaborator {
    endpoint: String,
    http_client: reqwest::Client,
}

impl HttpCollaborator {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ExtractionError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ExtractionError::Transport(e.to_string()))?;

        Ok(Self {
            endpoint: endpoint.into(),
            http_client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ExtractionCollaborator for HttpCollaborator {
    async fn request(&self, request: &ImageExtractionRequest) -> Result<Value, ExtractionError> {
        debug!(
            endpoint = %self.endpoint,
            mime_type = %request.mime_type,
            payload_bytes = request.image_base64.len(),
            "Sending image extraction request"
        );

        let response = self
            .http_client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| ExtractionError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ExtractionError::Transport(e.to_string()))?;
        let body: Option<CollaboratorResponse> = serde_json::from_str(&text).ok();

        if !status.is_success() {
            let message = body
                .and_then(|b| b.error)
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| format!("Request failed with status {}", status.as_u16()));
            return Err(ExtractionError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let body = body.ok_or_else(|| {
            ExtractionError::InvalidResponse("response body is not a JSON object".to_string())
        })?;

        match body.extracted_data {
            Some(Value::Null) | None => Err(ExtractionError::InvalidResponse(
                body.error
                    .unwrap_or_else(|| "missing extractedData".to_string()),
            )),
            Some(data) => Ok(data),
        }
    }
}

/// Instruction sent with every image
///
/// Lists each canonical key with its expected type, generated from the
/// descriptor table.
pub fn build_prompt() -> String {
    let mut prompt = String::from(
        "Extract the store performance metrics shown in this image. \
         Respond with a single JSON object using exactly these keys:\n",
    );

    for descriptor in FIELD_DESCRIPTORS.iter() {
        let kind = match descriptor.kind {
            FieldKind::Text => "text",
            FieldKind::Number => "number",
            FieldKind::Score => "number from 0 to 100",
        };
        prompt.push_str(&format!("- {} ({}): {}\n", descriptor.key, kind, descriptor.description));
    }

    prompt.push_str(
        "Use plain numbers without currency symbols, thousands separators or percent signs. \
         Use \"\" for text and 0 for numbers that are not visible. \
         Return only the JSON object.",
    );
    prompt
}

/// Turn an `extractedData` payload into a JSON object
///
/// Objects pass through. Strings are parsed after stripping an optional
/// Markdown code fence; if that fails, the span between the first `{` and
/// the last `}` is tried.
pub fn parse_extracted_data(data: Value) -> Result<Value, ExtractionError> {
    match data {
        Value::Object(_) => Ok(data),
        Value::String(text) => {
            let stripped = strip_code_fence(&text);
            let parsed = serde_json::from_str::<Value>(stripped).or_else(|e| {
                match (stripped.find('{'), stripped.rfind('}')) {
                    (Some(start), Some(end)) if start < end => {
                        serde_json::from_str::<Value>(&stripped[start..=end])
                    }
                    _ => Err(e),
                }
            });

            match parsed {
                Ok(value @ Value::Object(_)) => Ok(value),
                Ok(_) => Err(ExtractionError::InvalidResponse(
                    "extractedData is not a JSON object".to_string(),
                )),
                Err(e) => Err(ExtractionError::InvalidResponse(e.to_string())),
            }
        }
        _ => Err(ExtractionError::InvalidResponse(
            "extractedData is not a JSON object".to_string(),
        )),
    }
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening line
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Validate an image upload and build the collaborator request
///
/// Failures here are input rejections; no request is sent.
pub fn prepare_request(upload: &Upload) -> Result<ImageExtractionRequest, ExtractionError> {
    upload.validate()?;
    let mime_type = detect_image_mime(upload)?;

    Ok(ImageExtractionRequest {
        prompt: build_prompt(),
        mime_type,
        image_base64: STANDARD.encode(&upload.bytes),
    })
}

/// Outcome of an image extraction
#[derive(Debug, Clone, PartialEq)]
pub enum ImageExtraction {
    Succeeded { patch: Patch, attempts: u32 },
    Failed { message: String, attempts: u32 },
}

impl ImageExtraction {
    pub fn attempts(&self) -> u32 {
        match self {
            ImageExtraction::Succeeded { attempts, .. } | ImageExtraction::Failed { attempts, .. } => {
                *attempts
            }
        }
    }
}

/// Retrying extraction client
pub struct ImageExtractionClient {
    collaborator: Arc<dyn ExtractionCollaborator>,
    schedule: BackoffSchedule,
    resolver: &'static AliasResolver,
}

impl ImageExtractionClient {
    pub fn new(collaborator: Arc<dyn ExtractionCollaborator>, schedule: BackoffSchedule) -> Self {
        Self {
            collaborator,
            schedule,
            resolver: alias::resolver(),
        }
    }

    pub fn schedule(&self) -> &BackoffSchedule {
        &self.schedule
    }

    /// One attempt: request, parse, resolve keys, normalize
    ///
    /// A response that resolves to no report field counts as a failure.
    pub async fn extract_once(&self, request: &ImageExtractionRequest) -> Result<Patch, ExtractionError> {
        let data = self.collaborator.request(request).await?;
        let object = parse_extracted_data(data)?;
        let raw = RawRecord::from_json(&object, self.resolver);
        if raw.is_empty() {
            return Err(ExtractionError::NoFieldsResolved);
        }
        Ok(normalize(&raw))
    }

    /// Extract with retries; never returns an error
    pub async fn extract(&self, request: &ImageExtractionRequest) -> ImageExtraction {
        let outcome = run_with_retry("image_extraction", &self.schedule, |_| self.extract_once(request)).await;

        match outcome {
            RetryOutcome::Succeeded { value, attempts } => {
                info!(attempts, fields = value.len(), "Image extraction succeeded");
                ImageExtraction::Succeeded { patch: value, attempts }
            }
            RetryOutcome::Failed { last_error, attempts } => {
                let message = last_error
                    .map(|e| e.to_string())
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| FALLBACK_FAILURE_MESSAGE.to_string());
                warn!(attempts, error = %message, "Image extraction failed");
                ImageExtraction::Failed { message, attempts }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Field, FieldValue};
    use serde_json::json;
    use std::sync::Mutex;

    struct Scripted {
        responses: Mutex<Vec<Result<Value, ExtractionError>>>,
    }

    #[async_trait]
    impl ExtractionCollaborator for Scripted {
        async fn request(&self, _request: &ImageExtractionRequest) -> Result<Value, ExtractionError> {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(ExtractionError::Transport("script exhausted".to_string()));
            }
            responses.remove(0)
        }
    }

    fn request() -> ImageExtractionRequest {
        ImageExtractionRequest {
            prompt: build_prompt(),
            mime_type: "image/png".to_string(),
            image_base64: "AAAA".to_string(),
        }
    }

    #[test]
    fn test_prompt_names_every_key() {
        let prompt = build_prompt();
        for descriptor in FIELD_DESCRIPTORS.iter() {
            assert!(prompt.contains(descriptor.key), "missing {}", descriptor.key);
        }
        assert!(prompt.contains("revenueCoverage (number from 0 to 100)"));
        assert!(prompt.contains("storeName (text)"));
    }

    #[test]
    fn test_parse_fenced_string() {
        let data = json!("```json\n{\"storeName\": \"Acme\"}\n```");
        assert_eq!(parse_extracted_data(data).unwrap(), json!({"storeName": "Acme"}));
    }

    #[test]
    fn test_parse_string_with_surrounding_prose() {
        let data = json!("Here you go: {\"totalRevenue\": 5} hope it helps");
        assert_eq!(parse_extracted_data(data).unwrap(), json!({"totalRevenue": 5}));
    }

    #[test]
    fn test_parse_rejects_non_objects() {
        assert!(parse_extracted_data(json!([1, 2])).is_err());
        assert!(parse_extracted_data(json!("not json")).is_err());
        assert!(parse_extracted_data(json!("[1, 2]")).is_err());
    }

    #[test]
    fn test_prepare_request_encodes_image() {
        let upload = Upload::new(vec![1, 2, 3], Some("shot.png".into()), Some("image/png".into()));
        let request = prepare_request(&upload).unwrap();
        assert_eq!(request.mime_type, "image/png");
        assert_eq!(request.image_base64, "AQID");

        let serialized = serde_json::to_value(&request).unwrap();
        assert!(serialized.get("imageBase64").is_some());
        assert!(serialized.get("mimeType").is_some());
    }

    #[test]
    fn test_prepare_request_rejects_non_images() {
        let upload = Upload::new(b"a,b\n1,2".to_vec(), Some("data.csv".into()), Some("text/csv".into()));
        let err = prepare_request(&upload).unwrap_err();
        assert!(matches!(err, ExtractionError::UnsupportedType(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_resolved_fields_is_retried() {
        let collaborator = Scripted {
            responses: Mutex::new(vec![
                Ok(json!({"unrelated": 1})),
                Ok(json!({"Store Name": "Acme", "Revenue Coverage": 140})),
            ]),
        };
        let client = ImageExtractionClient::new(Arc::new(collaborator), BackoffSchedule::default());

        match client.extract(&request()).await {
            ImageExtraction::Succeeded { patch, attempts } => {
                assert_eq!(attempts, 2);
                assert_eq!(patch.get(Field::StoreName), Some(&FieldValue::Text("Acme".into())));
                assert_eq!(patch.get(Field::RevenueCoverage), Some(&FieldValue::Number(100.0)));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_reports_last_message() {
        let responses = (1..=6)
            .map(|n| {
                Err(ExtractionError::Upstream {
                    status: 500,
                    message: format!("upstream failure {}", n),
                })
            })
            .collect();
        let collaborator = Scripted {
            responses: Mutex::new(responses),
        };
        let client = ImageExtractionClient::new(Arc::new(collaborator), BackoffSchedule::default());

        assert_eq!(
            client.extract(&request()).await,
            ImageExtraction::Failed {
                message: "upstream failure 6".to_string(),
                attempts: 6
            }
        );
    }
}

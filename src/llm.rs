use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::config::Config;
use crate::error::GrocerError;

/// The completion provider seam: an opaque `prompt -> text` function with
/// latency and failure modes. Tests substitute scripted implementations.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, GrocerError>;

    /// Whether usable credentials are present. Checked before any
    /// persistence so an unconfigured server fails requests cleanly.
    fn is_configured(&self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// Gemini provider
// ---------------------------------------------------------------------------

pub struct GeminiProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(config: &Config) -> Self {
        GeminiProvider {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(config.provider_timeout_secs))
                .build()
                .unwrap_or_default(),
            api_key: config.gemini_api_key.clone(),
            model: config.model.clone(),
            base_url: config
                .gemini_base_url
                .clone()
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta".into()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Option<Vec<Part>>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiApiError {
    error: GeminiApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiApiErrorDetail {
    message: String,
    #[serde(default)]
    status: String,
}

#[async_trait]
impl CompletionProvider for GeminiProvider {
    async fn complete(&self, prompt: &str) -> Result<String, GrocerError> {
        if !self.is_configured() {
            return Err(GrocerError::Config(
                "completion provider API key is not configured".into(),
            ));
        }

        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );
        let body = json!({
            "contents": [{"parts": [{"text": prompt}]}]
        });

        // The key travels in a header, never in the URL, so it cannot land in
        // request logs.
        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            let parsed: GenerateContentResponse = serde_json::from_str(&text)
                .map_err(|e| GrocerError::Provider(format!("failed to parse response: {e}")))?;
            return extract_completion_text(parsed);
        }

        Err(classify_error(status, &text))
    }

    fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

fn extract_completion_text(response: GenerateContentResponse) -> Result<String, GrocerError> {
    let text: String = response
        .candidates
        .unwrap_or_default()
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|p| p.text)
        .collect();
    if text.is_empty() {
        return Err(GrocerError::Provider("empty completion".into()));
    }
    Ok(text)
}

/// Translate a failed provider response into the error taxonomy:
/// credential rejection, quota exhaustion, or a generic failure.
fn classify_error(status: StatusCode, body: &str) -> GrocerError {
    let detail = serde_json::from_str::<GeminiApiError>(body)
        .map(|e| e.error)
        .ok();
    let message = detail.as_ref().map(|d| d.message.as_str()).unwrap_or("");
    let api_status = detail.as_ref().map(|d| d.status.as_str()).unwrap_or("");

    if status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || api_status == "UNAUTHENTICATED"
        || api_status == "PERMISSION_DENIED"
        || message.contains("API key")
    {
        return GrocerError::ProviderAuth;
    }
    if status == StatusCode::TOO_MANY_REQUESTS
        || api_status == "RESOURCE_EXHAUSTED"
        || message.to_lowercase().contains("quota")
    {
        return GrocerError::ProviderQuota;
    }
    GrocerError::Provider(format!("HTTP {status}: {message}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_completion_text_joins_parts() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"Try "},{"text":"pasta."}]}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_completion_text(response).unwrap(), "Try pasta.");
    }

    #[test]
    fn test_extract_completion_text_empty_is_error() {
        let response: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert!(matches!(
            extract_completion_text(response),
            Err(GrocerError::Provider(_))
        ));

        let response: GenerateContentResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert!(extract_completion_text(response).is_err());
    }

    #[test]
    fn test_classify_error_auth() {
        let body = r#"{"error":{"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#;
        assert!(matches!(
            classify_error(StatusCode::BAD_REQUEST, body),
            GrocerError::ProviderAuth
        ));
        assert!(matches!(
            classify_error(StatusCode::FORBIDDEN, "not json"),
            GrocerError::ProviderAuth
        ));
        let body = r#"{"error":{"message":"denied","status":"PERMISSION_DENIED"}}"#;
        assert!(matches!(
            classify_error(StatusCode::BAD_REQUEST, body),
            GrocerError::ProviderAuth
        ));
    }

    #[test]
    fn test_classify_error_quota() {
        assert!(matches!(
            classify_error(StatusCode::TOO_MANY_REQUESTS, ""),
            GrocerError::ProviderQuota
        ));
        let body = r#"{"error":{"message":"Quota exceeded for model","status":"RESOURCE_EXHAUSTED"}}"#;
        assert!(matches!(
            classify_error(StatusCode::BAD_REQUEST, body),
            GrocerError::ProviderQuota
        ));
    }

    #[test]
    fn test_classify_error_generic() {
        let e = classify_error(StatusCode::INTERNAL_SERVER_ERROR, "upstream broke");
        match e {
            GrocerError::Provider(msg) => assert!(msg.contains("500")),
            other => panic!("expected generic provider error, got {other:?}"),
        }
    }

    #[test]
    fn test_unconfigured_provider() {
        let mut config = Config::test_defaults();
        config.gemini_api_key = String::new();
        let provider = GeminiProvider::new(&config);
        assert!(!provider.is_configured());

        let config = Config::test_defaults();
        let provider = GeminiProvider::new(&config);
        assert!(provider.is_configured());
    }
}

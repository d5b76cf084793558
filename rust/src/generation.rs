//! Boundary to the external prompt generation service.
//!
//! The service answers `POST /api/generate` with
//! `{ "ok": bool, "data": { "ollama_response": string }, "error": string }`,
//! using the same envelope for error statuses.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::form_state::{FormField, FormValues};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerateRequest {
    pub title: String,
    pub context: String,
    pub ai_role: String,
    pub additional_info: String,
    pub output_format: String,
    pub target_audience: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl GenerateRequest {
    pub fn from_form(form: &FormValues, model: Option<&str>) -> Self {
        Self {
            title: form.get(FormField::Title).to_string(),
            context: form.get(FormField::Context).to_string(),
            ai_role: form.get(FormField::AiRole).to_string(),
            additional_info: form.get(FormField::AdditionalInfo).to_string(),
            output_format: form.get(FormField::OutputFormat).to_string(),
            target_audience: form.get(FormField::TargetAudience).to_string(),
            model: model
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(ToOwned::to_owned),
        }
    }
}

/// Parsed envelope plus the raw JSON it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateResponse {
    pub ok: bool,
    pub text: Option<String>,
    pub error: Option<String>,
    pub raw: Value,
}

impl GenerateResponse {
    pub fn from_value(raw: Value) -> Self {
        let ok = raw.get("ok").and_then(Value::as_bool).unwrap_or(false);
        let text = raw
            .get("data")
            .and_then(|data| data.get("ollama_response"))
            .and_then(Value::as_str)
            .map(ToOwned::to_owned);
        let error = raw
            .get("error")
            .and_then(Value::as_str)
            .filter(|e| !e.is_empty())
            .map(ToOwned::to_owned);
        Self {
            ok,
            text,
            error,
            raw,
        }
    }

    /// Text shown in the result area for this response.
    pub fn display_text(&self) -> String {
        if self.ok {
            return self.text.clone().unwrap_or_default();
        }
        match &self.error {
            Some(error) => format!("Error: {error}"),
            None => format!("Error: {}", self.raw),
        }
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("response from {url} (status {status}) is not JSON: {message}")]
    Decode {
        url: String,
        status: u16,
        message: String,
    },
}

#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(
        &self,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse, GenerationError>;
}

pub struct HttpGenerationClient {
    client: Client,
    url: String,
}

impl HttpGenerationClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl GenerationClient for HttpGenerationClient {
    async fn generate(
        &self,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse, GenerationError> {
        tracing::debug!("posting generation request to {}", self.url);

        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("generation request failed: {}", e);
                GenerationError::Transport {
                    url: self.url.clone(),
                    message: e.to_string(),
                }
            })?;

        let status = response.status();
        let body: Value = response.json().await.map_err(|e| GenerationError::Decode {
            url: self.url.clone(),
            status: status.as_u16(),
            message: e.to_string(),
        })?;

        if !status.is_success() {
            tracing::debug!("generation endpoint answered {}", status);
        }
        Ok(GenerateResponse::from_value(body))
    }
}

#[cfg(test)]
mod tests {
    use super::{GenerateRequest, GenerateResponse, GenerationClient, GenerationError, HttpGenerationClient};
    use crate::form_state::{FormField, FormValues};
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_request() -> GenerateRequest {
        let mut form = FormValues::new();
        form.set(FormField::Title, "T");
        form.set(FormField::Context, "C");
        form.set(FormField::AiRole, "R");
        GenerateRequest::from_form(&form, None)
    }

    #[test]
    fn request_serializes_every_field() {
        let value = serde_json::to_value(sample_request()).expect("serialize");
        assert_eq!(
            value,
            json!({
                "title": "T",
                "context": "C",
                "ai_role": "R",
                "additional_info": "",
                "output_format": "",
                "target_audience": "",
            })
        );

        let with_model = GenerateRequest::from_form(&FormValues::new(), Some(" llama3 "));
        assert_eq!(with_model.model.as_deref(), Some("llama3"));
        assert!(GenerateRequest::from_form(&FormValues::new(), Some("  ")).model.is_none());
    }

    #[test]
    fn display_text_for_success_and_failure() {
        let ok = GenerateResponse::from_value(json!({"ok": true, "data": {"ollama_response": "X"}}));
        assert_eq!(ok.display_text(), "X");

        let ok_without_text = GenerateResponse::from_value(json!({"ok": true, "data": {}}));
        assert_eq!(ok_without_text.display_text(), "");

        let failed = GenerateResponse::from_value(json!({"ok": false, "error": "bad input"}));
        assert_eq!(failed.display_text(), "Error: bad input");

        let bare = GenerateResponse::from_value(json!({"ok": false}));
        assert_eq!(bare.display_text(), r#"Error: {"ok":false}"#);
    }

    #[tokio::test]
    async fn posts_form_and_parses_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_json(json!({
                "title": "T",
                "context": "C",
                "ai_role": "R",
                "additional_info": "",
                "output_format": "",
                "target_audience": "",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "data": {"crafted_prompt": "...", "ollama_response": "generated"}
            })))
            .mount(&server)
            .await;

        let client = HttpGenerationClient::new(format!("{}/api/generate", server.uri()));
        let response = client.generate(&sample_request()).await.expect("generate");
        assert!(response.ok);
        assert_eq!(response.text.as_deref(), Some("generated"));
    }

    #[tokio::test]
    async fn error_status_with_json_body_is_a_failed_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "ok": false,
                "error": "Not enough information is given."
            })))
            .mount(&server)
            .await;

        let client = HttpGenerationClient::new(format!("{}/api/generate", server.uri()));
        let response = client.generate(&sample_request()).await.expect("generate");
        assert!(!response.ok);
        assert_eq!(
            response.display_text(),
            "Error: Not enough information is given."
        );
    }

    #[tokio::test]
    async fn non_json_body_is_a_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
            .mount(&server)
            .await;

        let client = HttpGenerationClient::new(format!("{}/api/generate", server.uri()));
        let err = client
            .generate(&sample_request())
            .await
            .expect_err("decode should fail");
        assert!(matches!(err, GenerationError::Decode { status: 502, .. }));
    }
}

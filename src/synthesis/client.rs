use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::messages::{
    ErrorMessage, HealthResponse, ServerConfig, SynthesisError, SynthesisRequest, SynthesizedAudio,
};
use crate::config::SynthesisSettings;

/// File name the service expects for the uploaded voice sample
pub const VOICE_SAMPLE_FILE_NAME: &str = "voice_sample.wav";

/// HTTP client for the voice-cloning service
#[derive(Debug, Clone)]
pub struct SynthesisClient {
    http: Client,
    endpoint: String,
}

impl SynthesisClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, SynthesisError> {
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(settings: &SynthesisSettings) -> Result<Self, SynthesisError> {
        Self::new(
            &settings.endpoint,
            Duration::from_secs(settings.timeout_secs),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// GET /health
    pub async fn health(&self) -> Result<HealthResponse, SynthesisError> {
        let response = self.http.get(self.url("/health")).send().await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    /// GET /config
    pub async fn server_config(&self) -> Result<ServerConfig, SynthesisError> {
        let response = self.http.get(self.url("/config")).send().await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    /// POST /generate with the voice sample and text as multipart form data
    pub async fn generate(
        &self,
        request: &SynthesisRequest,
    ) -> Result<SynthesizedAudio, SynthesisError> {
        let artifact = request.artifact();
        let wav = artifact
            .to_wav()
            .map_err(|e| SynthesisError::Encoding(format!("{:#}", e)))?;

        info!(
            "Requesting speech for {} characters using sample {} ({} bytes)",
            request.text().chars().count(),
            artifact.session_id(),
            wav.len()
        );

        let audio = Part::bytes(wav)
            .file_name(VOICE_SAMPLE_FILE_NAME)
            .mime_str("audio/wav")?;

        let form = Form::new()
            .part("audio", audio)
            .text("text", request.text().to_string());

        let response = self
            .http
            .post(self.url("/generate"))
            .multipart(form)
            .send()
            .await?;
        let response = check_status(response).await?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("audio/wav")
            .to_string();
        let bytes = response.bytes().await?;

        info!("Received generated voice ({} bytes, {})", bytes.len(), content_type);

        Ok(SynthesizedAudio {
            bytes,
            content_type,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }
}

/// Turn a non-success status into `Rejected`, preferring the service's
/// `{"error": ...}` body as the message
async fn check_status(response: Response) -> Result<Response, SynthesisError> {
    let status = response.status();
    if status.is_success() {
        debug!("Synthesis service responded {}", status);
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorMessage>(&body) {
        Ok(error) => error.error,
        Err(_) if body.is_empty() => status.to_string(),
        Err(_) => body,
    };

    warn!("Synthesis service rejected request ({}): {}", status, message);

    Err(SynthesisError::Rejected {
        status: status.as_u16(),
        message,
    })
}

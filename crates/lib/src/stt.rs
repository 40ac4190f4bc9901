//! Speech-to-text client (OpenAI audio transcriptions).

use serde::Deserialize;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const WHISPER_MODEL: &str = "whisper-1";
const AUDIO_MIME: &str = "audio/ogg";

#[derive(Debug, thiserror::Error)]
pub enum TranscriptionError {
    #[error("transcription request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("transcription api error: {0}")]
    Api(String),
}

/// Client for the OpenAI audio transcription endpoint.
#[derive(Clone)]
pub struct WhisperClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

/// Transcription endpoint response ({"text": "..."}).
#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

impl WhisperClient {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            base_url,
            api_key,
            client: reqwest::Client::new(),
        }
    }

    /// POST /audio/transcriptions with the audio bytes as a multipart file part.
    /// Returns the plain transcript text.
    pub async fn transcribe(
        &self,
        audio: Vec<u8>,
        file_name: &str,
    ) -> Result<String, TranscriptionError> {
        let url = format!("{}/audio/transcriptions", self.base_url);
        let part = reqwest::multipart::Part::bytes(audio)
            .file_name(file_name.to_string())
            .mime_str(AUDIO_MIME)?;
        let form = reqwest::multipart::Form::new()
            .text("model", WHISPER_MODEL)
            .part("file", part);
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(TranscriptionError::Api(format!("{} {}", status, body)));
        }
        let data: TranscriptionResponse = res.json().await?;
        Ok(data.text)
    }
}

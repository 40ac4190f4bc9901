//! Telegram Bot API client: sendMessage, getFile lookup, and raw file download.

use serde::Deserialize;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    #[error("telegram request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("telegram api error: {0}")]
    Api(String),
    #[error("telegram file lookup failed: {0}")]
    FileResolution(String),
}

/// Telegram update payload (webhook POST body).
#[derive(Debug, Deserialize)]
pub struct TelegramUpdate {
    #[serde(default)]
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<TelegramMessage>,
    #[serde(default)]
    pub edited_message: Option<TelegramMessage>,
    #[serde(default)]
    pub channel_post: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramMessage {
    pub chat: TelegramChat,
    #[serde(default)]
    pub from: Option<TelegramUser>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub voice: Option<TelegramVoice>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
}

/// Voice attachment; only the file id is needed to resolve the download location.
#[derive(Debug, Deserialize)]
pub struct TelegramVoice {
    pub file_id: String,
}

/// getFile response envelope.
#[derive(Debug, Deserialize)]
struct GetFileResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    result: Option<FileInfo>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileInfo {
    #[serde(default)]
    file_path: Option<String>,
}

/// Telegram Bot API client. Replies are sent with sendMessage; voice attachments are
/// resolved with getFile and fetched from the file endpoint.
#[derive(Clone)]
pub struct TelegramClient {
    api_base: String,
    token: String,
    client: reqwest::Client,
}

impl TelegramClient {
    pub fn new(token: String, api_base: Option<String>) -> Self {
        let api_base = api_base
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| TELEGRAM_API_BASE.to_string());
        Self {
            api_base,
            token,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    /// Send a text message to a chat via the sendMessage API.
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        let url = self.api_url("sendMessage");
        let body = serde_json::json!({ "chat_id": chat_id, "text": text });
        let res = self.client.post(&url).json(&body).send().await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(TelegramError::Api(format!(
                "sendMessage failed: {} {}",
                status, body
            )));
        }
        Ok(())
    }

    /// Resolve a file id to a downloadable file path via getFile.
    ///
    /// A response that parses but lacks `ok: true` and `result.file_path` is a
    /// `FileResolution` error, carrying the API's description when it sent one.
    pub async fn get_file(&self, file_id: &str) -> Result<String, TelegramError> {
        let url = self.api_url("getFile");
        let res = self
            .client
            .get(&url)
            .query(&[("file_id", file_id)])
            .send()
            .await?;
        let data: GetFileResponse = res.json().await?;
        let file_path = data.result.and_then(|r| r.file_path);
        match file_path {
            Some(p) if data.ok => Ok(p),
            _ => Err(TelegramError::FileResolution(
                data.description
                    .unwrap_or_else(|| format!("getFile returned no file_path for {}", file_id)),
            )),
        }
    }

    /// Download a resolved file in full. No streaming and no size cap; Telegram voice
    /// memos are small.
    pub async fn download_file(&self, file_path: &str) -> Result<Vec<u8>, TelegramError> {
        let url = format!("{}/file/bot{}/{}", self.api_base, self.token, file_path);
        let res = self.client.get(&url).send().await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(TelegramError::Api(format!(
                "file download failed: {} {}",
                status, body
            )));
        }
        Ok(res.bytes().await?.to_vec())
    }
}

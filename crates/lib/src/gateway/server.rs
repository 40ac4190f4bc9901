//! Webhook HTTP server: receives Telegram updates, classifies them, and runs the idea
//! pipeline. The HTTP response is only an acknowledgement; outcomes reach the user out
//! of band via sendMessage, because Telegram discards the webhook response body.

use crate::config::{self, Config};
use crate::ideas;
use crate::llm::OpenAiClient;
use crate::store::AirtableClient;
use crate::stt::WhisperClient;
use crate::telegram::{TelegramClient, TelegramError, TelegramUpdate};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Router,
};

/// File name handed to the transcription endpoint for Telegram voice memos (OGG/OPUS).
const VOICE_FILE_NAME: &str = "voice.oga";

/// Static reply for the /help command.
const HELP_REPLY: &str =
    "Send me a content idea as text or a voice memo and I will structure and save it. /help shows this message.";

/// Sent when a voice message's file lookup fails.
const VOICE_LOOKUP_REPLY: &str = "I could not fetch that voice message.";

/// Shared state: configuration resolved once at startup into one client per
/// collaborator. No handler reads the environment or any mutable shared state.
#[derive(Clone)]
pub struct AppState {
    pub telegram: TelegramClient,
    pub llm: OpenAiClient,
    pub whisper: WhisperClient,
    pub store: AirtableClient,
}

/// What to do with one inbound update, in priority order: /help command, text idea,
/// voice idea, or ignore (acknowledge without any outbound call).
#[derive(Debug, PartialEq)]
enum Handling<'a> {
    Ignore,
    Help {
        chat_id: i64,
    },
    Text {
        chat_id: i64,
        user_id: Option<i64>,
        text: &'a str,
    },
    Voice {
        chat_id: i64,
        user_id: Option<i64>,
        file_id: &'a str,
    },
}

/// Pick the first present message field (message, edited_message, channel_post) and
/// classify it. An update carrying none of the three is an ignored update, not an error.
fn classify(update: &TelegramUpdate) -> Handling<'_> {
    let msg = update
        .message
        .as_ref()
        .or(update.edited_message.as_ref())
        .or(update.channel_post.as_ref());
    let Some(msg) = msg else {
        return Handling::Ignore;
    };
    let chat_id = msg.chat.id;
    let user_id = msg.from.as_ref().map(|u| u.id);
    if let Some(text) = msg.text.as_deref() {
        if text.starts_with("/help") {
            return Handling::Help { chat_id };
        }
        return Handling::Text {
            chat_id,
            user_id,
            text,
        };
    }
    if let Some(voice) = msg.voice.as_ref() {
        return Handling::Voice {
            chat_id,
            user_id,
            file_id: &voice.file_id,
        };
    }
    Handling::Ignore
}

/// POST /telegram handles one webhook update. Handling is sequential within the request;
/// the acknowledgement status is returned only after processing finishes.
async fn telegram_webhook(State(state): State<AppState>, body: Bytes) -> StatusCode {
    let update: TelegramUpdate = match serde_json::from_slice(&body) {
        Ok(u) => u,
        Err(_) => return StatusCode::BAD_REQUEST,
    };
    match classify(&update) {
        Handling::Ignore => StatusCode::OK,
        Handling::Help { chat_id } => {
            // Fire-and-forget: a lost help reply is logged, never retried.
            if let Err(e) = state.telegram.send_message(chat_id, HELP_REPLY).await {
                log::warn!("help reply send failed: {}", e);
            }
            StatusCode::OK
        }
        Handling::Text {
            chat_id,
            user_id,
            text,
        } => {
            ideas::process_idea(&state.llm, &state.store, &state.telegram, text, chat_id, user_id)
                .await;
            StatusCode::OK
        }
        Handling::Voice {
            chat_id,
            user_id,
            file_id,
        } => handle_voice(&state, chat_id, user_id, file_id).await,
    }
}

/// Voice path: resolve the attachment to a file path, download it in full, transcribe,
/// then run the idea pipeline on the transcript.
///
/// A lookup response without a usable location notifies the user once and stops; no
/// download or transcription call happens. Download and transcription faults answer 500
/// so Telegram's own webhook retry (the only retry in the system) can take over.
async fn handle_voice(
    state: &AppState,
    chat_id: i64,
    user_id: Option<i64>,
    file_id: &str,
) -> StatusCode {
    let file_path = match state.telegram.get_file(file_id).await {
        Ok(path) => path,
        Err(e @ TelegramError::FileResolution(_)) => {
            log::error!("voice file lookup failed: {}", e);
            if let Err(e) = state.telegram.send_message(chat_id, VOICE_LOOKUP_REPLY).await {
                log::warn!("voice failure notification send failed: {}", e);
            }
            return StatusCode::OK;
        }
        Err(e) => {
            log::error!("voice file lookup failed: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };
    let audio = match state.telegram.download_file(&file_path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            log::error!("voice download failed: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };
    let transcript = match state.whisper.transcribe(audio, VOICE_FILE_NAME).await {
        Ok(text) => text,
        Err(e) => {
            log::error!("transcription failed: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };
    ideas::process_idea(
        &state.llm,
        &state.store,
        &state.telegram,
        &transcript,
        chat_id,
        user_id,
    )
    .await;
    StatusCode::OK
}

/// GET / liveness probe.
async fn health() -> &'static str {
    "content idea bot alive"
}

/// Build clients from resolved config and serve until shutdown (Ctrl+C or SIGTERM).
/// Credentials are read exactly once here; handlers only see [`AppState`].
pub async fn run_gateway(config: Config) -> Result<()> {
    let token = config::resolve_telegram_token(&config)
        .context("telegram bot token not configured (set TELEGRAM_TOKEN)")?;
    let openai_key = config::resolve_openai_api_key(&config)
        .context("openai api key not configured (set OPENAI_API_KEY)")?;
    let airtable_key = config::resolve_airtable_api_key(&config)
        .context("airtable api key not configured (set AIRTABLE_API_KEY)")?;
    let base_id = config::resolve_airtable_base_id(&config)
        .context("airtable base id not configured (set AIRTABLE_BASE_ID)")?;
    let table = config::resolve_airtable_table(&config);
    log::debug!("record store table: {}", table);

    let state = AppState {
        telegram: TelegramClient::new(token, config.telegram.api_base.clone()),
        llm: OpenAiClient::new(openai_key.clone(), config.openai.api_base.clone()),
        whisper: WhisperClient::new(openai_key, config.openai.api_base.clone()),
        store: AirtableClient::new(airtable_key, base_id, table, config.airtable.api_base.clone()),
    };

    let app = Router::new()
        .route("/", get(health))
        .route("/telegram", post(telegram_webhook))
        .with_state(state);

    let bind_addr = format!("{}:{}", config.server.bind, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server exited")?;
    log::info!("server stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received");
}

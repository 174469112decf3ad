use crate::errors::{TelegramOutcome, TgVaultError};
use reqwest::multipart;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Which Bot API `send*` method carries a given file, per the classifier's
/// dispatch (spec.md §4.4 "Media classification").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Document,
    Photo,
    Video,
    Animation,
    Audio,
}

impl MediaKind {
    fn method(self) -> &'static str {
        match self {
            MediaKind::Document => "sendDocument",
            MediaKind::Photo => "sendPhoto",
            MediaKind::Video => "sendVideo",
            MediaKind::Animation => "sendAnimation",
            MediaKind::Audio => "sendAudio",
        }
    }

    fn field(self) -> &'static str {
        match self {
            MediaKind::Document => "document",
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
            MediaKind::Animation => "animation",
            MediaKind::Audio => "audio",
        }
    }
}

/// Where the bytes for a `send*` call come from. `FileId` is used to forward
/// an already-uploaded chunk's Bot API copy without re-uploading it; `Path`
/// is the self-hosted local-filesystem shortcut (spec.md §4.5 "Self-hosted
/// backend").
pub enum SendSource {
    Bytes { data: Vec<u8>, file_name: String },
    FileId(String),
    LocalPath(std::path::PathBuf),
}

/// Optional per-call metadata accepted by `sendVideo`/`sendAnimation`
/// (spec.md §4.4 "best-effort video preprocessing", §4.2 `sendVideoWithOptions`).
#[derive(Debug, Clone, Default)]
pub struct VideoOptions {
    pub duration_secs: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub supports_streaming: bool,
    pub thumbnail: Option<Vec<u8>>,
    pub cover: Option<Vec<u8>>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub document: Option<FileMeta>,
    #[serde(default)]
    pub video: Option<FileMeta>,
    #[serde(default)]
    pub animation: Option<FileMeta>,
    #[serde(default)]
    pub audio: Option<FileMeta>,
    #[serde(default)]
    pub photo: Option<Vec<FileMeta>>,
}

impl Message {
    /// The single `FileMeta` the caller cares about, regardless of which
    /// media field Telegram populated (photos return an array of sizes; the
    /// last one is the largest).
    pub fn primary_file(&self) -> Option<&FileMeta> {
        self.document
            .as_ref()
            .or(self.video.as_ref())
            .or(self.animation.as_ref())
            .or(self.audio.as_ref())
            .or_else(|| self.photo.as_ref().and_then(|sizes| sizes.last()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileMeta {
    pub file_id: String,
    pub file_unique_id: String,
    #[serde(default)]
    pub file_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolvedFile {
    pub file_id: String,
    pub file_unique_id: String,
    #[serde(default)]
    pub file_size: Option<u64>,
    pub file_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatMember {
    pub status: String,
    pub user: User,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

/// Thin typed wrapper over the subset of the Telegram Bot API the engine
/// uses for durable storage. Grounded on the teacher's reqwest-based HTTP
/// calls in `tgcloud-cli`'s web layer, generalized into its own client with
/// explicit retry-after/transient/permanent classification (Design Note
/// §9 "Telegram error classification") instead of bubbling raw reqwest
/// errors to callers.
#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    api_url: String,
    bot_token: String,
    pub chat_id: String,
}

impl TelegramClient {
    pub fn new(api_url: String, bot_token: String, chat_id: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url,
            bot_token,
            chat_id,
        }
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.bot_token, method)
    }

    async fn call_json<T: DeserializeOwned>(&self, method: &str, body: Value) -> TelegramOutcome<T> {
        let request = self.http.post(self.endpoint(method)).json(&body);
        self.dispatch(request).await
    }

    async fn dispatch<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> TelegramOutcome<T> {
        let response = match request.send().await {
            Ok(r) => r,
            Err(e) if e.is_timeout() || e.is_connect() => {
                return TelegramOutcome::Failed(TgVaultError::UpstreamUnavailable(e.to_string()))
            }
            Err(e) => return TelegramOutcome::Failed(TgVaultError::TelegramError(e)),
        };

        let status = response.status();
        let parsed: Result<ApiResponse<T>, _> = response.json().await;
        let parsed = match parsed {
            Ok(p) => p,
            Err(e) => return TelegramOutcome::Failed(TgVaultError::TelegramError(e)),
        };

        if parsed.ok {
            return match parsed.result {
                Some(result) => TelegramOutcome::Ok(result),
                None => TelegramOutcome::Failed(TgVaultError::Internal(
                    "telegram response marked ok but carried no result".into(),
                )),
            };
        }

        if parsed.error_code == Some(429) {
            let after = parsed
                .parameters
                .and_then(|p| p.retry_after)
                .unwrap_or(1);
            return TelegramOutcome::RetryAfter(Duration::from_secs(after));
        }

        // 5xx from Telegram itself is transient; everything else (400, 401,
        // 403) is a permanent failure the caller should not retry.
        if status.is_server_error() {
            return TelegramOutcome::Failed(TgVaultError::UpstreamUnavailable(
                parsed.description.unwrap_or_else(|| status.to_string()),
            ));
        }

        TelegramOutcome::Failed(TgVaultError::UpstreamUnavailable(
            parsed.description.unwrap_or_else(|| "telegram request failed".to_string()),
        ))
    }

    pub async fn get_me(&self) -> TelegramOutcome<User> {
        self.call_json("getMe", serde_json::json!({})).await
    }

    pub async fn get_chat(&self, chat_id: &str) -> TelegramOutcome<Chat> {
        self.call_json("getChat", serde_json::json!({ "chat_id": chat_id }))
            .await
    }

    pub async fn get_chat_administrators(&self, chat_id: &str) -> TelegramOutcome<Vec<ChatMember>> {
        self.call_json("getChatAdministrators", serde_json::json!({ "chat_id": chat_id }))
            .await
    }

    pub async fn send_media(
        &self,
        kind: MediaKind,
        source: SendSource,
        caption: Option<&str>,
        options: Option<VideoOptions>,
    ) -> TelegramOutcome<Message> {
        match source {
            SendSource::FileId(file_id) => {
                let mut body = serde_json::json!({
                    "chat_id": self.chat_id,
                    kind.field(): file_id,
                });
                if let Some(caption) = caption {
                    body["caption"] = Value::String(caption.to_string());
                }
                apply_video_json_options(&mut body, &options);
                self.call_json(kind.method(), body).await
            }
            SendSource::Bytes { data, file_name } => {
                let mut form = multipart::Form::new()
                    .text("chat_id", self.chat_id.clone())
                    .part(
                        kind.field(),
                        multipart::Part::bytes(data).file_name(file_name),
                    );
                form = apply_video_form_options(form, caption, &options);
                let request = self.http.post(self.endpoint(kind.method())).multipart(form);
                self.dispatch(request).await
            }
            SendSource::LocalPath(path) => match tokio::fs::read(&path).await {
                Ok(data) => {
                    let file_name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_else(|| "file".to_string());
                    self.send_media(kind, SendSource::Bytes { data, file_name }, caption, options)
                        .await
                }
                Err(e) => TelegramOutcome::Failed(TgVaultError::IoError(e)),
            },
        }
    }

    pub async fn forward_message(&self, to_chat_id: &str, from_chat_id: &str, message_id: i64) -> TelegramOutcome<Message> {
        self.call_json(
            "forwardMessage",
            serde_json::json!({
                "chat_id": to_chat_id,
                "from_chat_id": from_chat_id,
                "message_id": message_id,
            }),
        )
        .await
    }

    pub async fn delete_message(&self, chat_id: &str, message_id: i64) -> TelegramOutcome<bool> {
        self.call_json(
            "deleteMessage",
            serde_json::json!({ "chat_id": chat_id, "message_id": message_id }),
        )
        .await
    }

    pub async fn get_file(&self, file_id: &str) -> TelegramOutcome<ResolvedFile> {
        self.call_json("getFile", serde_json::json!({ "file_id": file_id }))
            .await
    }

    pub fn download_url_from_file_path(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.api_url, self.bot_token, file_path)
    }

    /// Streams a byte range of a resolved Bot API file. Download pipeline
    /// callers combine this with `get_file` to resolve `file_id` -> URL.
    pub async fn download_range(
        &self,
        file_path: &str,
        start: u64,
        end_inclusive: u64,
    ) -> TelegramOutcome<bytes::Bytes> {
        let url = self.download_url_from_file_path(file_path);
        let request = self
            .http
            .get(&url)
            .header("Range", format!("bytes={}-{}", start, end_inclusive));
        let response = match request.send().await {
            Ok(r) => r,
            Err(e) if e.is_timeout() || e.is_connect() => {
                return TelegramOutcome::Failed(TgVaultError::UpstreamUnavailable(e.to_string()))
            }
            Err(e) => return TelegramOutcome::Failed(TgVaultError::TelegramError(e)),
        };
        if response.status().as_u16() == 429 {
            let after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(1);
            return TelegramOutcome::RetryAfter(Duration::from_secs(after));
        }
        if !response.status().is_success() {
            return TelegramOutcome::Failed(TgVaultError::UpstreamUnavailable(format!(
                "file download returned {}",
                response.status()
            )));
        }
        match response.bytes().await {
            Ok(b) => TelegramOutcome::Ok(b),
            Err(e) => TelegramOutcome::Failed(TgVaultError::TelegramError(e)),
        }
    }
}

fn apply_video_json_options(body: &mut Value, options: &Option<VideoOptions>) {
    if let Some(opts) = options {
        if let Some(d) = opts.duration_secs {
            body["duration"] = Value::from(d);
        }
        if let Some(w) = opts.width {
            body["width"] = Value::from(w);
        }
        if let Some(h) = opts.height {
            body["height"] = Value::from(h);
        }
        if opts.supports_streaming {
            body["supports_streaming"] = Value::from(true);
        }
    }
}

fn apply_video_form_options(
    mut form: multipart::Form,
    caption: Option<&str>,
    options: &Option<VideoOptions>,
) -> multipart::Form {
    if let Some(caption) = caption {
        form = form.text("caption", caption.to_string());
    }
    if let Some(opts) = options {
        if let Some(d) = opts.duration_secs {
            form = form.text("duration", d.to_string());
        }
        if let Some(w) = opts.width {
            form = form.text("width", w.to_string());
        }
        if let Some(h) = opts.height {
            form = form.text("height", h.to_string());
        }
        if opts.supports_streaming {
            form = form.text("supports_streaming", "true");
        }
        if let Some(thumb) = &opts.thumbnail {
            form = form.part("thumbnail", multipart::Part::bytes(thumb.clone()).file_name("thumb.jpg"));
        }
        if let Some(cover) = &opts.cover {
            form = form.part("cover", multipart::Part::bytes(cover.clone()).file_name("cover.jpg"));
        }
    }
    form
}

/// Pure helper kept separate from the network call so backoff math can be
/// unit tested without a server.
pub fn next_backoff(attempt: u32, base: Duration, cap: Duration) -> Duration {
    let multiplier = 2u32.saturating_pow(attempt.min(16));
    let scaled = base.saturating_mul(multiplier);
    scaled.min(cap)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_until_capped() {
        let base = Duration::from_millis(200);
        let cap = Duration::from_secs(10);
        assert_eq!(next_backoff(0, base, cap), Duration::from_millis(200));
        assert_eq!(next_backoff(1, base, cap), Duration::from_millis(400));
        assert_eq!(next_backoff(2, base, cap), Duration::from_millis(800));
        assert_eq!(next_backoff(10, base, cap), cap);
    }

    #[test]
    fn media_kind_maps_to_bot_api_method_and_field() {
        assert_eq!(MediaKind::Document.method(), "sendDocument");
        assert_eq!(MediaKind::Document.field(), "document");
        assert_eq!(MediaKind::Photo.field(), "photo");
        assert_eq!(MediaKind::Video.method(), "sendVideo");
    }
}

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use qqtg_channels::{
    ChannelError, FriendInfo, GroupInfo, MediaKind, MediaRef, OutboundSegment, SourceChannel,
    SourceOutbound,
};
use qqtg_core::config::OneBotConfig;
use qqtg_core::types::{ConversationId, Peer, SourceMessageKey};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::OneBotError;

/// HTTP client for the OneBot v11 action API.
#[derive(Debug, Clone)]
pub struct OneBotClient {
    client: reqwest::Client,
    api_url: String,
    access_token: Option<String>,
}

/// `{status, retcode, data}` wrapper every action returns.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    retcode: i64,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    message: String,
    #[serde(default)]
    wording: String,
}

impl OneBotClient {
    pub fn new(config: &OneBotConfig) -> Result<Self, OneBotError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone().filter(|t| !t.is_empty()),
        })
    }

    /// Invoke `action` and return its `data` field.
    pub async fn call(&self, action: &str, params: Value) -> Result<Value, OneBotError> {
        let url = format!("{}/{action}", self.api_url);
        debug!(action, "calling OneBot action");

        let mut request = self.client.post(&url).json(&params);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }
        let resp = request.send().await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(action, status = status.as_u16(), body = %text, "OneBot HTTP error");
            return Err(OneBotError::Api {
                action: action.to_string(),
                retcode: i64::from(status.as_u16()),
                message: text,
            });
        }

        let api: ApiResponse = resp.json().await.map_err(|e| OneBotError::Decode {
            action: action.to_string(),
            detail: e.to_string(),
        })?;
        unwrap_response(action, api)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, OneBotError> {
        let resp = self.client.get(url).send().await?.error_for_status()?;
        Ok(resp.bytes().await?.to_vec())
    }

    /// Bytes from whatever a `get_image` / `get_record` / `get_file` reply
    /// carries: inline base64, a URL, or a path on the OneBot host.
    async fn resolve_file(&self, action: &str, data: &Value) -> Result<Vec<u8>, OneBotError> {
        if let Some(encoded) = data["base64"].as_str().filter(|s| !s.is_empty()) {
            return base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .map_err(|e| OneBotError::Decode {
                    action: action.to_string(),
                    detail: e.to_string(),
                });
        }
        if let Some(url) = data["url"].as_str().filter(|u| is_http(u)) {
            return self.download(url).await;
        }
        if let Some(path) = data["file"].as_str().filter(|p| !p.is_empty()) {
            if is_http(path) {
                return self.download(path).await;
            }
            let path = path.strip_prefix("file://").unwrap_or(path);
            return Ok(tokio::fs::read(path).await?);
        }
        Err(OneBotError::Decode {
            action: action.to_string(),
            detail: "no base64, url or file in response".to_string(),
        })
    }

    async fn upload(
        &self,
        conversation: ConversationId,
        url: &str,
        name: &str,
    ) -> Result<(), OneBotError> {
        let (action, params) = match conversation.peer() {
            Peer::Group(group_id) => (
                "upload_group_file",
                json!({ "group_id": group_id, "file": url, "name": name }),
            ),
            Peer::Private(user_id) => (
                "upload_private_file",
                json!({ "user_id": user_id, "file": url, "name": name }),
            ),
        };
        self.call(action, params).await?;
        Ok(())
    }
}

fn unwrap_response(action: &str, api: ApiResponse) -> Result<Value, OneBotError> {
    if api.status == "failed" || api.retcode != 0 {
        let message = if api.wording.is_empty() {
            api.message
        } else {
            api.wording
        };
        return Err(OneBotError::Api {
            action: action.to_string(),
            retcode: api.retcode,
            message,
        });
    }
    Ok(api.data)
}

fn is_http(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Name to upload a file under: the given one, else the last URL path
/// segment.
fn upload_name(url: &str, name: Option<&str>) -> String {
    if let Some(name) = name.filter(|n| !n.is_empty()) {
        return name.to_string();
    }
    url.split(['?', '#'])
        .next()
        .and_then(|path| path.rsplit('/').next())
        .filter(|s| !s.is_empty())
        .unwrap_or("file")
        .to_string()
}

/// The message array for the text and image parts of `message`, and the
/// files that need a separate upload.
pub fn build_message(
    message: &SourceOutbound,
    reply_to: Option<SourceMessageKey>,
) -> (Vec<Value>, Vec<(String, String)>) {
    let mut content = Vec::new();
    let mut files = Vec::new();
    for segment in &message.segments {
        match segment {
            OutboundSegment::Text(text) => {
                content.push(json!({ "type": "text", "data": { "text": text } }));
            }
            OutboundSegment::Image(bytes) => {
                let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
                content.push(json!({
                    "type": "image",
                    "data": { "file": format!("base64://{encoded}") }
                }));
            }
            OutboundSegment::File { url, name } => {
                files.push((url.clone(), upload_name(url, name.as_deref())));
            }
        }
    }

    // Uploads have no message id, so a file-only message gets a text
    // notice to carry the reply and the correlation.
    if content.is_empty() && !files.is_empty() {
        let names: Vec<&str> = files.iter().map(|(_, name)| name.as_str()).collect();
        content.push(json!({
            "type": "text",
            "data": { "text": format!("[file] {}", names.join(", ")) }
        }));
    }

    if let Some(reply) = reply_to {
        content.insert(
            0,
            json!({ "type": "reply", "data": { "id": reply.0.to_string() } }),
        );
    }
    (content, files)
}

#[async_trait]
impl SourceChannel for OneBotClient {
    async fn fetch_file(&self, kind: MediaKind, media: &MediaRef) -> Result<Vec<u8>, ChannelError> {
        if let Some(url) = media.url.as_deref().filter(|u| is_http(u)) {
            return Ok(self.download(url).await?);
        }
        let (action, params) = match kind {
            MediaKind::Photo | MediaKind::Animation => {
                ("get_image", json!({ "file": media.file }))
            }
            MediaKind::Audio => (
                "get_record",
                json!({ "file": media.file, "out_format": "mp3" }),
            ),
            MediaKind::Document | MediaKind::Video => (
                "get_file",
                json!({ "file": media.file, "file_id": media.file }),
            ),
        };
        let data = self.call(action, params).await?;
        Ok(self.resolve_file(action, &data).await?)
    }

    async fn send(
        &self,
        conversation: ConversationId,
        message: &SourceOutbound,
        reply_to: Option<SourceMessageKey>,
    ) -> Result<SourceMessageKey, ChannelError> {
        let (content, files) = build_message(message, reply_to);
        for (url, name) in &files {
            self.upload(conversation, url, name).await?;
        }

        let (action, params) = match conversation.peer() {
            Peer::Group(group_id) => (
                "send_group_msg",
                json!({ "group_id": group_id, "message": content }),
            ),
            Peer::Private(user_id) => (
                "send_private_msg",
                json!({ "user_id": user_id, "message": content }),
            ),
        };
        let data = self.call(action, params).await?;
        let id = data["message_id"]
            .as_i64()
            .or_else(|| data["message_id"].as_str().and_then(|s| s.parse().ok()))
            .ok_or_else(|| OneBotError::Decode {
                action: action.to_string(),
                detail: "missing message_id".to_string(),
            })?;
        Ok(SourceMessageKey(id))
    }

    async fn group_info(&self, group_id: i64) -> Result<GroupInfo, ChannelError> {
        let data = self
            .call("get_group_info", json!({ "group_id": group_id }))
            .await?;
        Ok(decode("get_group_info", data)?)
    }

    async fn friends(&self) -> Result<Vec<FriendInfo>, ChannelError> {
        let data = self.call("get_friend_list", json!({})).await?;
        Ok(decode("get_friend_list", data)?)
    }

    async fn groups(&self) -> Result<Vec<GroupInfo>, ChannelError> {
        let data = self.call("get_group_list", json!({})).await?;
        Ok(decode("get_group_list", data)?)
    }
}

fn decode<T: serde::de::DeserializeOwned>(action: &str, data: Value) -> Result<T, OneBotError> {
    serde_json::from_value(data).map_err(|e| OneBotError::Decode {
        action: action.to_string(),
        detail: e.to_string(),
    })
}

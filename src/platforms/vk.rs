use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tokio::time::Duration;
use url::Url;

use crate::bot::{ActionSink, MemberDirectory};
use crate::config::VkConfig;
use crate::platforms::{PollError, PollSession, PollSource, RawResponse, SessionGrant};
use crate::types::{Attachment, Update, UpdateKind};

/// VK API response envelope
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    response: Option<T>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error_code: i64,
    error_msg: String,
}

#[derive(Debug, Deserialize)]
struct LongPollServer {
    key: String,
    server: String,
    ts: Value,
}

#[derive(Debug, Deserialize)]
struct UserName {
    first_name: String,
    last_name: String,
}

/// Raw body of an `a_check` call
#[derive(Debug, Deserialize)]
struct PollBody {
    ts: Option<Value>,
    failed: Option<i64>,
    #[serde(default)]
    updates: Vec<RawUpdate>,
}

#[derive(Debug, Deserialize)]
struct RawUpdate {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    object: Value,
}

/// Message or comment object, the fields the moderator needs
#[derive(Debug, Deserialize)]
struct RawItem {
    #[serde(default)]
    text: String,
    #[serde(default)]
    from_id: i64,
    peer_id: Option<i64>,
    conversation_message_id: Option<i64>,
    #[serde(default)]
    attachments: Vec<RawAttachment>,
}

#[derive(Debug, Deserialize)]
struct RawAttachment {
    #[serde(rename = "type")]
    kind: String,
    link: Option<RawLink>,
    wall: Option<RawNested>,
    wall_reply: Option<RawNested>,
}

#[derive(Debug, Deserialize)]
struct RawLink {
    url: String,
}

#[derive(Debug, Deserialize)]
struct RawNested {
    #[serde(default)]
    text: String,
}

impl From<RawAttachment> for Attachment {
    fn from(raw: RawAttachment) -> Self {
        match (raw.kind.as_str(), raw.link, raw.wall, raw.wall_reply) {
            ("link", Some(link), _, _) => Attachment::link(link.url),
            ("wall", _, Some(wall), _) => Attachment::repost(wall.text),
            ("wall_reply", _, _, Some(reply)) => Attachment::repost_comment(reply.text),
            _ => Attachment::Other { kind: raw.kind },
        }
    }
}

/// Bots Long Poll client for one VK community
pub struct VkClient {
    config: VkConfig,
    http_client: reqwest::Client,
}

impl VkClient {
    pub fn new(config: VkConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(anyhow::anyhow!("VK API key is not set (vk.api_key or VK_API_KEY)"));
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .context("Failed to build HTTP client")?;

        info!("VK client configured for group {}", config.group_id);
        Ok(Self { config, http_client })
    }

    /// Call a VK API method and unwrap its `response` field
    async fn call<T: DeserializeOwned>(&self, method: &str, params: &[(&str, String)]) -> Result<T> {
        let url = format!("{}{}", self.config.api_url, method);
        debug!("Calling VK API method {}", method);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .query(params)
            .query(&[("v", self.config.api_version.as_str())])
            .send()
            .await
            .with_context(|| format!("Failed to call VK API method {}", method))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow::anyhow!("VK API error {}: {}", status, error_text));
        }

        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read VK API response for {}", method))?;
        parse_envelope(&body).with_context(|| format!("VK API method {} failed", method))
    }

    fn delete_params(&self, peer_id: i64, conversation_message_id: i64) -> Vec<(&'static str, String)> {
        vec![
            ("group_id", self.config.group_id.to_string()),
            ("peer_id", peer_id.to_string()),
            ("cmids", conversation_message_id.to_string()),
            ("delete_for_all", "1".to_string()),
        ]
    }

    fn send_params(&self, peer_id: i64, text: &str, random_id: i32) -> Vec<(&'static str, String)> {
        vec![
            ("group_id", self.config.group_id.to_string()),
            ("peer_id", peer_id.to_string()),
            ("message", text.to_string()),
            ("random_id", random_id.to_string()),
        ]
    }
}

fn parse_envelope<T: DeserializeOwned>(body: &str) -> Result<T> {
    let envelope: ApiEnvelope<T> = serde_json::from_str(body).context("Failed to parse VK API response")?;
    match (envelope.response, envelope.error) {
        (_, Some(error)) => Err(anyhow::anyhow!("VK API error {}: {}", error.error_code, error.error_msg)),
        (Some(response), None) => Ok(response),
        (None, None) => Err(anyhow::anyhow!("VK API response has neither response nor error")),
    }
}

/// VK sends `ts` sometimes as a string and sometimes as a number
fn cursor_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Long-poll server address as a URL; VK has returned it without a scheme in the past
fn server_url(server: &str) -> Result<Url, PollError> {
    Url::parse(server)
        .or_else(|_| Url::parse(&format!("https://{}", server)))
        .map_err(|e| PollError::Parse(format!("invalid long poll server '{}': {}", server, e)))
}

fn parse_poll_body(body: &str) -> Result<RawResponse, PollError> {
    let body: PollBody = serde_json::from_str(body).map_err(|e| PollError::Parse(e.to_string()))?;

    let updates = body
        .updates
        .into_iter()
        .map(convert_update)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RawResponse {
        failed: body.failed,
        cursor: body.ts.as_ref().and_then(cursor_text),
        updates,
    })
}

/// Only known update kinds carry a body; the rest keep just their tag
fn convert_update(raw: RawUpdate) -> Result<Update, PollError> {
    let Some(kind) = UpdateKind::from_tag(&raw.event_type) else {
        return Ok(Update {
            event_type: raw.event_type,
            ..Default::default()
        });
    };

    let object = match kind {
        UpdateKind::Message => raw.object.get("message").cloned().unwrap_or(raw.object),
        UpdateKind::Comment => raw.object,
    };
    let item: RawItem = serde_json::from_value(object)
        .map_err(|e| PollError::Parse(format!("malformed {} update: {}", raw.event_type, e)))?;

    Ok(Update {
        event_type: raw.event_type,
        text: item.text,
        attachments: item.attachments.into_iter().map(Attachment::from).collect(),
        from_id: item.from_id,
        peer_id: item.peer_id,
        conversation_message_id: item.conversation_message_id,
    })
}

#[async_trait]
impl PollSource for VkClient {
    async fn acquire(&self) -> Result<SessionGrant, PollError> {
        let server: LongPollServer = self
            .call("groups.getLongPollServer", &[("group_id", self.config.group_id.to_string())])
            .await
            .map_err(|e| PollError::Acquire(format!("{:#}", e)))?;

        let cursor = cursor_text(&server.ts)
            .ok_or_else(|| PollError::Acquire("long poll server returned no ts".to_string()))?;

        Ok(SessionGrant {
            endpoint: server.server,
            key: server.key,
            cursor,
        })
    }

    async fn poll(&self, session: &PollSession, wait_seconds: u64) -> Result<RawResponse, PollError> {
        let mut url = server_url(&session.endpoint)?;
        url.query_pairs_mut()
            .append_pair("act", "a_check")
            .append_pair("key", &session.key)
            .append_pair("ts", &session.cursor)
            .append_pair("wait", &wait_seconds.to_string());

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| PollError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PollError::Transport(format!("long poll server returned {}", response.status())));
        }

        let body = response.text().await.map_err(|e| PollError::Transport(e.to_string()))?;
        parse_poll_body(&body)
    }

    fn platform_name(&self) -> &str {
        "vk"
    }
}

#[async_trait]
impl MemberDirectory for VkClient {
    async fn username(&self, user_id: i64) -> Result<String> {
        let users: Vec<UserName> = self.call("users.get", &[("user_ids", user_id.to_string())]).await?;
        let user = users
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("users.get returned nothing for {}", user_id))?;
        Ok(format!("{} {}", user.first_name, user.last_name))
    }

    async fn is_member(&self, user_id: i64) -> Result<bool> {
        let member: i64 = self
            .call(
                "groups.isMember",
                &[
                    ("group_id", self.config.group_id.to_string()),
                    ("user_id", user_id.to_string()),
                ],
            )
            .await?;
        Ok(member == 1)
    }
}

#[async_trait]
impl ActionSink for VkClient {
    async fn delete_message(&self, peer_id: i64, conversation_message_id: i64) -> Result<()> {
        let _: Value = self
            .call("messages.delete", &self.delete_params(peer_id, conversation_message_id))
            .await?;
        debug!("Deleted message {} in {}", conversation_message_id, peer_id);
        Ok(())
    }

    async fn send_notice(&self, peer_id: i64, text: &str) -> Result<()> {
        let random_id = (rand::random::<u32>() >> 1) as i32;
        let _: Value = self
            .call("messages.send", &self.send_params(peer_id, text, random_id))
            .await?;
        Ok(())
    }
}

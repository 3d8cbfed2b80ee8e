use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use lookout_types::models::{Attachment, FilterAlert};
use lookout_types::{ChannelId, GuildId, RoleId};
use lookout_watchlist::PlatformError;
use lookout_watchlist::platform::{
    AlertSink, ChannelApi, ModeratorDirectory, PermissionOverwrite, RelayTransport, permissions,
};

use crate::wire::{
    AllowedMentions, ApiErrorBody, AttachmentSlot, CHANNEL_TYPE_CATEGORY, CHANNEL_TYPE_TEXT,
    ChannelObject, CreateChannel, CreateMessage, CreateWebhook, GuildObject, MessageObject,
    OverwriteObject, RoleObject, UNKNOWN_CHANNEL, UNKNOWN_WEBHOOK, WebhookObject, WebhookPayload,
};

pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// Message content limit enforced by the platform.
const MAX_CONTENT_CHARS: usize = 2000;
/// Webhook usernames are capped at 80 characters.
const MAX_USERNAME_CHARS: usize = 80;
/// Largest page of `/users/@me/guilds`.
const GUILD_PAGE_SIZE: usize = 200;

#[derive(Debug, Clone)]
pub struct DiscordConfig {
    pub token: String,
    pub api_base: String,
    pub timeout: Duration,
    /// Name of the webhook the relay creates in each audit channel.
    pub webhook_name: String,
}

impl DiscordConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: Duration::from_secs(30),
            webhook_name: "Lookout relay".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Webhook {
    id: u64,
    token: String,
}

pub struct DiscordClient {
    /// Authenticated as the bot.
    api: Client,
    /// Unauthenticated: webhook execution and attachment downloads.
    plain: Client,
    api_base: String,
    webhook_name: String,
    webhooks: Mutex<HashMap<ChannelId, Webhook>>,
}

impl DiscordClient {
    pub fn new(config: DiscordConfig) -> Result<Self, PlatformError> {
        let mut auth = HeaderValue::from_str(&format!("Bot {}", config.token))
            .map_err(|e| PlatformError::Transport(format!("invalid bot token: {e}")))?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let api = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(transport)?;
        let plain = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(transport)?;

        Ok(Self {
            api,
            plain,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            webhook_name: config.webhook_name,
            webhooks: Mutex::new(HashMap::new()),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    /// Guilds the bot is currently a member of, following the pages until a
    /// short one.
    pub async fn current_guilds(&self) -> Result<Vec<GuildId>, PlatformError> {
        let mut guilds = Vec::new();
        let mut after: Option<u64> = None;
        loop {
            let mut request = self
                .api
                .get(self.url("/users/@me/guilds"))
                .query(&[("limit", GUILD_PAGE_SIZE.to_string())]);
            if let Some(after) = after {
                request = request.query(&[("after", after.to_string())]);
            }

            let page: Vec<GuildObject> = json(execute(request, None).await?).await?;
            let full = page.len() >= GUILD_PAGE_SIZE;
            after = page.iter().map(|g| g.id).max();
            guilds.extend(page.into_iter().map(|g| GuildId(g.id)));

            if !full || after.is_none() {
                debug!("Bot is a member of {} guilds", guilds.len());
                return Ok(guilds);
            }
        }
    }

    async fn create_channel(
        &self,
        guild_id: GuildId,
        body: &CreateChannel<'_>,
    ) -> Result<ChannelId, PlatformError> {
        let request = self
            .api
            .post(self.url(&format!("/guilds/{guild_id}/channels")))
            .json(body);
        let channel: ChannelObject = json(execute(request, None).await?).await?;
        Ok(ChannelId(channel.id))
    }

    /// Find or create the relay webhook of an audit channel.
    async fn webhook_for(&self, channel_id: ChannelId) -> Result<Webhook, PlatformError> {
        if let Some(webhook) = self.webhooks.lock().get(&channel_id).cloned() {
            return Ok(webhook);
        }

        let path = format!("/channels/{channel_id}/webhooks");
        let existing: Vec<WebhookObject> =
            json(execute(self.api.get(self.url(&path)), Some(channel_id)).await?).await?;

        let found = existing.into_iter().find_map(|w| match w.token {
            Some(token) if w.name.as_deref() == Some(self.webhook_name.as_str()) => {
                Some(Webhook { id: w.id, token })
            }
            _ => None,
        });

        let webhook = match found {
            Some(webhook) => webhook,
            None => {
                let request = self.api.post(self.url(&path)).json(&CreateWebhook {
                    name: &self.webhook_name,
                });
                let created: WebhookObject = json(execute(request, Some(channel_id)).await?).await?;
                let token = created.token.ok_or_else(|| {
                    PlatformError::Transport("created webhook has no token".to_string())
                })?;
                debug!("Created relay webhook {} in channel {}", created.id, channel_id);
                Webhook {
                    id: created.id,
                    token,
                }
            }
        };

        self.webhooks.lock().insert(channel_id, webhook.clone());
        Ok(webhook)
    }

    async fn download(&self, attachment: &Attachment) -> Result<Bytes, PlatformError> {
        let response = self
            .plain
            .get(&attachment.url)
            .send()
            .await
            .map_err(transport)?;
        if !response.status().is_success() {
            return Err(PlatformError::Rejected {
                status: response.status().as_u16(),
                message: format!("downloading {}", attachment.filename),
            });
        }
        response.bytes().await.map_err(transport)
    }

    async fn execute_webhook(
        &self,
        channel_id: ChannelId,
        webhook: &Webhook,
        form: Form,
    ) -> Result<(), PlatformError> {
        let url = self.url(&format!("/webhooks/{}/{}?wait=true", webhook.id, webhook.token));
        match execute(self.plain.post(url).multipart(form), None).await {
            Ok(response) => {
                let _: MessageObject = json(response).await?;
                Ok(())
            }
            // The webhook (or its channel) vanished: forget it so the next
            // attempt resolves the channel again.
            Err(PlatformError::Rejected { status: 404, message }) => {
                self.webhooks.lock().remove(&channel_id);
                Err(PlatformError::Transport(format!(
                    "relay webhook for channel {channel_id} is gone: {message}"
                )))
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl ChannelApi for DiscordClient {
    async fn find_category(
        &self,
        guild_id: GuildId,
        name: &str,
    ) -> Result<Option<ChannelId>, PlatformError> {
        let request = self.api.get(self.url(&format!("/guilds/{guild_id}/channels")));
        let channels: Vec<ChannelObject> = json(execute(request, None).await?).await?;
        Ok(channels
            .into_iter()
            .find(|c| c.kind == CHANNEL_TYPE_CATEGORY && c.name.as_deref() == Some(name))
            .map(|c| ChannelId(c.id)))
    }

    async fn create_category(
        &self,
        guild_id: GuildId,
        name: &str,
        overwrites: &[PermissionOverwrite],
    ) -> Result<ChannelId, PlatformError> {
        let body = CreateChannel {
            name,
            kind: CHANNEL_TYPE_CATEGORY,
            parent_id: None,
            permission_overwrites: overwrites
                .iter()
                .map(|o| OverwriteObject::from_overwrite(guild_id, o))
                .collect(),
        };
        let id = self.create_channel(guild_id, &body).await?;
        info!("Created category `{}` ({}) in guild {}", name, id, guild_id);
        Ok(id)
    }

    async fn create_text_channel(
        &self,
        guild_id: GuildId,
        category_id: ChannelId,
        name: &str,
    ) -> Result<ChannelId, PlatformError> {
        let body = CreateChannel {
            name,
            kind: CHANNEL_TYPE_TEXT,
            parent_id: Some(category_id.to_string()),
            permission_overwrites: Vec::new(),
        };
        self.create_channel(guild_id, &body).await
    }

    async fn delete_channel(&self, channel_id: ChannelId) -> Result<(), PlatformError> {
        self.webhooks.lock().remove(&channel_id);
        let request = self.api.delete(self.url(&format!("/channels/{channel_id}")));
        execute(request, Some(channel_id)).await?;
        Ok(())
    }
}

#[async_trait]
impl ModeratorDirectory for DiscordClient {
    async fn moderator_roles(&self, guild_id: GuildId) -> Result<Vec<RoleId>, PlatformError> {
        let request = self.api.get(self.url(&format!("/guilds/{guild_id}/roles")));
        let roles: Vec<RoleObject> = json(execute(request, None).await?).await?;
        Ok(moderator_role_ids(guild_id, &roles))
    }
}

#[async_trait]
impl RelayTransport for DiscordClient {
    fn max_content_chars(&self) -> usize {
        MAX_CONTENT_CHARS
    }

    /// One webhook execution per call. Content must already fit
    /// [`RelayTransport::max_content_chars`].
    async fn forward(
        &self,
        channel_id: ChannelId,
        display_name: &str,
        avatar_url: Option<&str>,
        content: &str,
        attachments: &[Attachment],
    ) -> Result<(), PlatformError> {
        // Fetch every file before sending so a failed download posts nothing.
        let mut files = Vec::with_capacity(attachments.len());
        for attachment in attachments {
            files.push(self.download(attachment).await?);
        }

        let webhook = self.webhook_for(channel_id).await?;
        let username = webhook_username(display_name);

        let mut form = Form::new();
        let mut slots = Vec::with_capacity(attachments.len());
        for (index, (attachment, data)) in attachments.iter().zip(files).enumerate() {
            form = form.part(
                format!("files[{index}]"),
                Part::bytes(data.to_vec()).file_name(attachment.filename.clone()),
            );
            slots.push(AttachmentSlot {
                id: index,
                filename: attachment.filename.clone(),
            });
        }
        let payload = WebhookPayload {
            content,
            username: &username,
            avatar_url,
            allowed_mentions: AllowedMentions::default(),
            attachments: slots,
        };
        let form = form.text("payload_json", to_json(&payload)?);
        self.execute_webhook(channel_id, &webhook, form).await
    }
}

#[async_trait]
impl AlertSink for DiscordClient {
    async fn alert(&self, alert: &FilterAlert) -> Result<(), PlatformError> {
        let roles = match self.moderator_roles(alert.guild_id).await {
            Ok(roles) => roles,
            Err(e) => {
                warn!("Could not list moderator roles in guild {}: {}", alert.guild_id, e);
                Vec::new()
            }
        };

        let content = alert_content(alert, &roles);
        let body = CreateMessage {
            content: &content,
            allowed_mentions: AllowedMentions {
                parse: Vec::new(),
                roles: roles.iter().map(|r| r.to_string()).collect(),
            },
        };
        let request = self
            .api
            .post(self.url(&format!("/channels/{}/messages", alert.channel_id)))
            .json(&body);
        execute(request, Some(alert.channel_id)).await?;
        Ok(())
    }
}

/// Send a request and turn non-2xx responses into [`PlatformError`]s. With a
/// `channel` given, a 404 "Unknown Channel" becomes
/// [`PlatformError::UnknownChannel`].
async fn execute(
    request: RequestBuilder,
    channel: Option<ChannelId>,
) -> Result<Response, PlatformError> {
    let response = request.send().await.map_err(transport)?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.json::<ApiErrorBody>().await.ok();
    Err(classify(status, body, channel))
}

fn classify(
    status: StatusCode,
    body: Option<ApiErrorBody>,
    channel: Option<ChannelId>,
) -> PlatformError {
    let (code, message) = match body {
        Some(body) => (body.code, body.message),
        None => (0, status.canonical_reason().unwrap_or_default().to_string()),
    };

    match channel {
        Some(channel_id) if status == StatusCode::NOT_FOUND && code == UNKNOWN_CHANNEL => {
            PlatformError::UnknownChannel(channel_id)
        }
        _ if code == UNKNOWN_WEBHOOK => PlatformError::Rejected {
            status: StatusCode::NOT_FOUND.as_u16(),
            message,
        },
        _ => PlatformError::Rejected {
            status: status.as_u16(),
            message: if code == 0 {
                message
            } else {
                format!("{message} (code {code})")
            },
        },
    }
}

async fn json<T: DeserializeOwned>(response: Response) -> Result<T, PlatformError> {
    response.json().await.map_err(transport)
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, PlatformError> {
    serde_json::to_string(value).map_err(|e| PlatformError::Transport(e.to_string()))
}

fn transport(e: reqwest::Error) -> PlatformError {
    PlatformError::Transport(e.to_string())
}

/// Roles carrying MANAGE_MESSAGES, minus the default role (same id as the guild).
fn moderator_role_ids(guild_id: GuildId, roles: &[RoleObject]) -> Vec<RoleId> {
    roles
        .iter()
        .filter(|r| r.id != guild_id.0)
        .filter(|r| {
            r.permissions
                .parse::<u64>()
                .is_ok_and(|bits| bits & permissions::MANAGE_MESSAGES != 0)
        })
        .map(|r| RoleId(r.id))
        .collect()
}

fn webhook_username(display_name: &str) -> String {
    let name: String = display_name.trim().chars().take(MAX_USERNAME_CHARS).collect();
    if name.is_empty() {
        "Unknown user".to_string()
    } else {
        name
    }
}

fn alert_content(alert: &FilterAlert, roles: &[RoleId]) -> String {
    let mentions: Vec<String> = roles.iter().map(|r| format!("<@&{r}>")).collect();
    let mut content = String::new();
    if !mentions.is_empty() {
        content.push_str(&mentions.join(" "));
        content.push(' ');
    }
    content.push_str(&format!(
        "Filter `{}` matched a message from **{}** (<@{}>). [Link]({})",
        alert.pattern, alert.author_name, alert.user_id, alert.jump_url
    ));
    content
}

#[cfg(test)]
mod tests {
    use super::*;
    use lookout_types::UserId;
    use wiremock::matchers::{method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn role(id: u64, permissions: u64) -> RoleObject {
        RoleObject {
            id,
            permissions: permissions.to_string(),
        }
    }

    #[test]
    fn moderators_hold_manage_messages() {
        let guild = GuildId(1);
        let roles = vec![
            role(1, permissions::MANAGE_MESSAGES),
            role(10, permissions::MANAGE_MESSAGES | permissions::VIEW_CHANNEL),
            role(11, permissions::SEND_MESSAGES),
            RoleObject {
                id: 12,
                permissions: "garbage".into(),
            },
        ];
        assert_eq!(moderator_role_ids(guild, &roles), vec![RoleId(10)]);
    }

    #[test]
    fn unknown_channel_only_maps_with_channel_context() {
        let body = || {
            Some(ApiErrorBody {
                code: UNKNOWN_CHANNEL,
                message: "Unknown Channel".into(),
            })
        };

        let err = classify(StatusCode::NOT_FOUND, body(), Some(ChannelId(5)));
        assert!(matches!(err, PlatformError::UnknownChannel(ChannelId(5))));

        let err = classify(StatusCode::NOT_FOUND, body(), None);
        assert!(matches!(err, PlatformError::Rejected { status: 404, .. }));
        assert!(!err.is_transient());
    }

    #[test]
    fn rate_limits_and_server_errors_are_transient() {
        let err = classify(StatusCode::TOO_MANY_REQUESTS, None, Some(ChannelId(5)));
        assert!(err.is_transient());
        let err = classify(StatusCode::BAD_GATEWAY, None, None);
        assert!(err.is_transient());
        let err = classify(
            StatusCode::FORBIDDEN,
            Some(ApiErrorBody {
                code: 50013,
                message: "Missing Permissions".into(),
            }),
            None,
        );
        match err {
            PlatformError::Rejected { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "Missing Permissions (code 50013)");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn usernames_are_clamped() {
        assert_eq!(webhook_username("  Hattyot "), "Hattyot");
        assert_eq!(webhook_username("   "), "Unknown user");
        assert_eq!(webhook_username(&"x".repeat(100)).len(), MAX_USERNAME_CHARS);
    }

    #[test]
    fn alerts_mention_moderator_roles() {
        let alert = FilterAlert {
            guild_id: GuildId(1),
            user_id: UserId(42),
            author_name: "Hattyot".into(),
            channel_id: ChannelId(77),
            pattern: r"\bsus\b".into(),
            jump_url: "https://discord.com/channels/1/20/900".into(),
        };
        assert_eq!(
            alert_content(&alert, &[RoleId(10), RoleId(11)]),
            "<@&10> <@&11> Filter `\\bsus\\b` matched a message from **Hattyot** (<@42>). \
             [Link](https://discord.com/channels/1/20/900)"
        );
        assert!(alert_content(&alert, &[]).starts_with("Filter"));
    }

    #[test]
    fn client_rejects_unprintable_tokens() {
        assert!(DiscordClient::new(DiscordConfig::new("bad\ntoken")).is_err());
        assert!(DiscordClient::new(DiscordConfig::new("abc.def")).is_ok());
    }

    // -- Against a mock HTTP server --

    const AUDIT: ChannelId = ChannelId(5);

    fn client_for(server: &MockServer) -> DiscordClient {
        let mut config = DiscordConfig::new("abc.def");
        config.api_base = server.uri();
        DiscordClient::new(config).unwrap()
    }

    fn sent() -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": "900" }))
    }

    fn attachment(server: &MockServer, filename: &str) -> Attachment {
        Attachment {
            filename: filename.to_string(),
            url: format!("{}/files/{}", server.uri(), filename),
        }
    }

    async fn mount_webhooks(server: &MockServer, lookups: u64) {
        Mock::given(method("GET"))
            .and(path("/channels/5/webhooks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "id": "70", "name": "Someone else", "token": "nope" },
                { "id": "77", "name": "Lookout relay", "token": "tok" }
            ])))
            .expect(lookups)
            .mount(server)
            .await;
    }

    async fn webhook_posts(server: &MockServer) -> Vec<wiremock::Request> {
        server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.url.path().starts_with("/webhooks/"))
            .collect()
    }

    #[tokio::test]
    async fn guild_listing_follows_pages() {
        let server = MockServer::start().await;
        let first: Vec<serde_json::Value> = (1..=200u64)
            .map(|id| serde_json::json!({ "id": id.to_string() }))
            .collect();
        Mock::given(method("GET"))
            .and(path("/users/@me/guilds"))
            .and(query_param("limit", "200"))
            .and(query_param_is_missing("after"))
            .respond_with(ResponseTemplate::new(200).set_body_json(first))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/@me/guilds"))
            .and(query_param("after", "200"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([{ "id": "201" }, { "id": "202" }])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let guilds = client_for(&server).current_guilds().await.unwrap();
        assert_eq!(guilds.len(), 202);
        assert_eq!(guilds.first(), Some(&GuildId(1)));
        assert_eq!(guilds.last(), Some(&GuildId(202)));
    }

    #[tokio::test]
    async fn relay_webhook_is_looked_up_once_and_sent_without_the_bot_token() {
        let server = MockServer::start().await;
        mount_webhooks(&server, 1).await;
        Mock::given(method("POST"))
            .and(path("/webhooks/77/tok"))
            .and(query_param("wait", "true"))
            .respond_with(sent())
            .expect(2)
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.forward(AUDIT, "Hattyot", None, "one", &[]).await.unwrap();
        client.forward(AUDIT, "Hattyot", None, "two", &[]).await.unwrap();

        for post in webhook_posts(&server).await {
            assert!(!post.headers.contains_key("authorization"));
        }
    }

    #[tokio::test]
    async fn a_failed_send_posts_once_and_can_be_retried() {
        let server = MockServer::start().await;
        mount_webhooks(&server, 1).await;
        Mock::given(method("POST"))
            .and(path("/webhooks/77/tok"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/webhooks/77/tok"))
            .respond_with(sent())
            .mount(&server)
            .await;

        let client = client_for(&server);
        let content = "x".repeat(client.max_content_chars());
        let err = client.forward(AUDIT, "a", None, &content, &[]).await.unwrap_err();
        assert!(err.is_transient());
        client.forward(AUDIT, "a", None, &content, &[]).await.unwrap();

        assert_eq!(webhook_posts(&server).await.len(), 2);
    }

    #[tokio::test]
    async fn attachments_travel_with_the_content() {
        let server = MockServer::start().await;
        mount_webhooks(&server, 1).await;
        for file in ["a.png", "b.txt"] {
            Mock::given(method("GET"))
                .and(path(format!("/files/{file}")))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(file.as_bytes().to_vec()))
                .expect(1)
                .mount(&server)
                .await;
        }
        Mock::given(method("POST"))
            .and(path("/webhooks/77/tok"))
            .respond_with(sent())
            .expect(1)
            .mount(&server)
            .await;

        let files = [attachment(&server, "a.png"), attachment(&server, "b.txt")];
        client_for(&server)
            .forward(AUDIT, "Hattyot", None, "look", &files)
            .await
            .unwrap();

        let posts = webhook_posts(&server).await;
        let body = String::from_utf8_lossy(&posts[0].body);
        assert!(body.contains("files[0]"));
        assert!(body.contains("files[1]"));
        assert!(body.contains(r#""content":"look""#));
    }

    #[tokio::test]
    async fn failed_download_sends_nothing() {
        let server = MockServer::start().await;
        mount_webhooks(&server, 0).await;
        Mock::given(method("GET"))
            .and(path("/files/a.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/webhooks/77/tok"))
            .respond_with(sent())
            .expect(0)
            .mount(&server)
            .await;

        let err = client_for(&server)
            .forward(AUDIT, "a", None, "text", &[attachment(&server, "a.png")])
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Rejected { status: 404, .. }));
    }

    #[tokio::test]
    async fn vanished_webhook_is_resolved_again() {
        let server = MockServer::start().await;
        mount_webhooks(&server, 2).await;
        Mock::given(method("POST"))
            .and(path("/webhooks/77/tok"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "code": UNKNOWN_WEBHOOK,
                "message": "Unknown Webhook"
            })))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/webhooks/77/tok"))
            .respond_with(sent())
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.forward(AUDIT, "a", None, "text", &[]).await.unwrap_err();
        assert!(err.is_transient());
        client.forward(AUDIT, "a", None, "text", &[]).await.unwrap();
    }

    #[tokio::test]
    async fn deleted_audit_channel_is_reported_as_unknown() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/channels/5/webhooks"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "code": UNKNOWN_CHANNEL,
                "message": "Unknown Channel"
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .forward(AUDIT, "a", None, "text", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::UnknownChannel(AUDIT)));
    }
}

use std::{sync::Arc, time::Duration};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use leaky_bucket::RateLimiter;
use lettre::message::{Mailbox, MultiPart};
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::RwLock;

use crate::{
    auth::{self, Session, StoredCredential},
    error::{AppError, AppResult},
    server_config::{cfg, token_path},
    HttpClient,
};

use super::{
    envelope::{MessageEnvelope, MessageListResponse},
    parsed_message::ParsedMessage,
};

/// Per-request quota units charged by the mail API
struct ApiQuota {
    messages_list: usize,
    messages_get: usize,
    messages_modify: usize,
    messages_send: usize,
}

const API_QUOTA: ApiQuota = ApiQuota {
    messages_list: 5,
    messages_get: 5,
    messages_modify: 5,
    messages_send: 100,
};

const QUOTA_PER_SECOND: usize = 250;

macro_rules! gmail_url {
    ($($params:expr),*) => {
        {
            const GMAIL_ENDPOINT: &str = "https://www.googleapis.com/gmail/v1/users/me";
            let list_params = vec![$($params),*];
            let path = list_params.join("/");
            format!("{}/{}", GMAIL_ENDPOINT, path)
        }
    };
}

/// An outgoing message. `body_html` upgrades the payload to
/// multipart/alternative; `cc` and `bcc` take comma-separated address lists.
#[derive(Debug, Default)]
pub struct OutgoingMessage<'a> {
    pub from: &'a str,
    pub to: &'a str,
    pub subject: &'a str,
    pub body_plain: &'a str,
    pub body_html: Option<&'a str>,
    pub cc: Option<&'a str>,
    pub bcc: Option<&'a str>,
    pub thread_id: Option<&'a str>,
}

fn parse_mailbox(addr: &str) -> AppResult<Mailbox> {
    addr.trim()
        .parse()
        .map_err(|e| AppError::BadRequest(format!("Invalid address '{}': {}", addr, e)))
}

fn address_list(raw: Option<&str>) -> impl Iterator<Item = &str> {
    raw.into_iter()
        .flat_map(|list| list.split(','))
        .map(str::trim)
        .filter(|addr| !addr.is_empty())
}

fn build_mime(msg: &OutgoingMessage<'_>) -> AppResult<lettre::Message> {
    let mut builder = lettre::Message::builder()
        .from(parse_mailbox(msg.from)?)
        .to(parse_mailbox(msg.to)?)
        .subject(msg.subject);

    for addr in address_list(msg.cc) {
        builder = builder.cc(parse_mailbox(addr)?);
    }
    for addr in address_list(msg.bcc) {
        builder = builder.bcc(parse_mailbox(addr)?);
    }

    match msg.body_html {
        Some(html) => builder.multipart(MultiPart::alternative_plain_html(
            msg.body_plain.to_string(),
            html.to_string(),
        )),
        None => builder.body(msg.body_plain.to_string()),
    }
    .map_err(|e| AppError::Internal(anyhow::anyhow!("Could not build message: {}", e)))
}

/// Read access to the user's mailbox, as the processing pipeline needs it.
#[allow(async_fn_in_trait)]
pub trait MailProvider {
    async fn list_message_ids(&self, max_results: u32, query: &str) -> AppResult<Vec<String>>;
    async fn get_parsed_message(&self, message_id: &str) -> AppResult<Option<ParsedMessage>>;
}

#[derive(Clone)]
pub struct EmailClient {
    http_client: HttpClient,
    credential: StoredCredential,
    session: Arc<RwLock<Session>>,
    rate_limiter: Arc<RateLimiter>,
}

impl EmailClient {
    pub async fn new(
        http_client: HttpClient,
        credential: StoredCredential,
    ) -> AppResult<EmailClient> {
        let session = auth::ensure_session(&http_client, &cfg.gmail_config, &credential).await?;

        let rate_limiter = Arc::new(
            RateLimiter::builder()
                .initial(QUOTA_PER_SECOND)
                .interval(Duration::from_secs(1))
                .refill(QUOTA_PER_SECOND)
                .build(),
        );

        Ok(EmailClient {
            http_client,
            credential,
            session: Arc::new(RwLock::new(session)),
            rate_limiter,
        })
    }

    async fn access_token(&self) -> AppResult<String> {
        {
            let session = self.session.read().await;
            if !session.is_expired() {
                return Ok(session.access_token.clone());
            }
        }
        self.force_refresh().await
    }

    /// Swap in a freshly refreshed session, persisting the new token so the
    /// next process start can reuse it.
    async fn force_refresh(&self) -> AppResult<String> {
        let mut guard = self.session.write().await;
        let fresh =
            auth::refresh_session(&self.http_client, &cfg.gmail_config, &self.credential).await?;

        let updated = StoredCredential {
            access_token: Some(fresh.access_token.clone()),
            refresh_token: self.credential.refresh_token.clone(),
            expiry: Some(fresh.expires_at),
        };
        if let Err(e) = auth::save_credential(&token_path(), &updated) {
            tracing::warn!("Could not persist refreshed token: {}", e);
        }

        let token = fresh.access_token.clone();
        *guard = fresh;
        Ok(token)
    }

    /// Issue an authenticated GET. Retries exactly once after a token refresh
    /// on 401. A 404 maps to `None`.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        quota: usize,
    ) -> AppResult<Option<T>> {
        self.rate_limiter.acquire(quota).await;

        let mut token = self.access_token().await?;
        for attempt in 0..2 {
            let resp = self
                .http_client
                .get(url)
                .query(query)
                .bearer_auth(&token)
                .send()
                .await?;

            match resp.status() {
                status if status.is_success() => return Ok(Some(resp.json::<T>().await?)),
                reqwest::StatusCode::NOT_FOUND => return Ok(None),
                reqwest::StatusCode::UNAUTHORIZED if attempt == 0 => {
                    token = self.force_refresh().await?;
                }
                status => {
                    let body = resp.text().await.unwrap_or_default();
                    return Err(AppError::Internal(anyhow::anyhow!(
                        "Mail API error ({}) for {}: {}",
                        status,
                        url,
                        body
                    )));
                }
            }
        }

        Err(AppError::Unauthorized(
            "Mail API rejected a freshly refreshed token".to_string(),
        ))
    }

    /// POST counterpart of [`Self::get_json`], same retry and 404 handling.
    async fn post_json<T: DeserializeOwned>(
        &self,
        url: &str,
        body: &serde_json::Value,
        quota: usize,
    ) -> AppResult<Option<T>> {
        self.rate_limiter.acquire(quota).await;

        let mut token = self.access_token().await?;
        for attempt in 0..2 {
            let resp = self
                .http_client
                .post(url)
                .json(body)
                .bearer_auth(&token)
                .send()
                .await?;

            match resp.status() {
                status if status.is_success() => return Ok(Some(resp.json::<T>().await?)),
                reqwest::StatusCode::NOT_FOUND => return Ok(None),
                reqwest::StatusCode::UNAUTHORIZED if attempt == 0 => {
                    token = self.force_refresh().await?;
                }
                status => {
                    let body = resp.text().await.unwrap_or_default();
                    return Err(AppError::Internal(anyhow::anyhow!(
                        "Mail API error ({}) for {}: {}",
                        status,
                        url,
                        body
                    )));
                }
            }
        }

        Err(AppError::Unauthorized(
            "Mail API rejected a freshly refreshed token".to_string(),
        ))
    }

    pub async fn get_message(&self, message_id: &str) -> AppResult<Option<MessageEnvelope>> {
        self.get_json(
            &gmail_url!("messages", message_id),
            &[("format", "full".to_string())],
            API_QUOTA.messages_get,
        )
        .await
    }

    /// Add a label to a message. Returns false if the message is gone.
    pub async fn add_label(&self, message_id: &str, label_id: &str) -> AppResult<bool> {
        let resp: Option<serde_json::Value> = self
            .post_json(
                &gmail_url!("messages", message_id, "modify"),
                &json!({ "addLabelIds": [label_id], "removeLabelIds": [] }),
                API_QUOTA.messages_modify,
            )
            .await?;
        Ok(resp.is_some())
    }

    pub async fn remove_label(&self, message_id: &str, label_id: &str) -> AppResult<bool> {
        let resp: Option<serde_json::Value> = self
            .post_json(
                &gmail_url!("messages", message_id, "modify"),
                &json!({ "addLabelIds": [], "removeLabelIds": [label_id] }),
                API_QUOTA.messages_modify,
            )
            .await?;
        Ok(resp.is_some())
    }

    /// Send a message. `thread_id` attaches it to an existing conversation.
    pub async fn send(&self, msg: &OutgoingMessage<'_>) -> AppResult<MessageEnvelope> {
        let mime = build_mime(msg)?;
        let raw = URL_SAFE_NO_PAD.encode(mime.formatted());

        let mut payload = json!({ "raw": raw });
        if let Some(tid) = msg.thread_id {
            payload["threadId"] = json!(tid);
        }

        self.post_json(
            &gmail_url!("messages", "send"),
            &payload,
            API_QUOTA.messages_send,
        )
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Send returned no message")))
    }

    /// Reply on the original message's thread, addressed to its sender.
    pub async fn reply_to_message(
        &self,
        from: &str,
        message_id: &str,
        body_plain: &str,
        body_html: Option<&str>,
    ) -> AppResult<MessageEnvelope> {
        let original = self
            .get_parsed_message(message_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Message {} not found", message_id)))?;

        let subject = match original.subject.as_deref() {
            Some(s) if s.starts_with("Re:") => s.to_string(),
            Some(s) => format!("Re: {}", s),
            None => "Re:".to_string(),
        };

        self.send(&OutgoingMessage {
            from,
            to: &original.from,
            subject: &subject,
            body_plain,
            body_html,
            thread_id: Some(&original.thread_id),
            ..Default::default()
        })
        .await
    }
}

impl MailProvider for EmailClient {
    async fn list_message_ids(&self, max_results: u32, query: &str) -> AppResult<Vec<String>> {
        let mut params = vec![("maxResults", max_results.to_string())];
        if !query.is_empty() {
            params.push(("q", query.to_string()));
        }

        let resp: Option<MessageListResponse> = self
            .get_json(&gmail_url!("messages"), &params, API_QUOTA.messages_list)
            .await?;

        Ok(resp
            .map(|r| r.messages.into_iter().map(|m| m.id).collect())
            .unwrap_or_default())
    }

    async fn get_parsed_message(&self, message_id: &str) -> AppResult<Option<ParsedMessage>> {
        let envelope = self.get_message(message_id).await?;
        Ok(envelope.as_ref().map(ParsedMessage::from_envelope))
    }
}

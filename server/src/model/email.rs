use chrono::{DateTime, FixedOffset, Utc};

use crate::{db_core::prelude::*, email::parsed_message::ParsedMessage, error::AppResult};

pub struct EmailCtrl;

impl EmailCtrl {
    /// Insert a message, or refresh every stored field if it is already
    /// present. Keyed by the provider's message id, so re-running a batch
    /// never duplicates emails.
    pub async fn upsert_message(
        conn: &DatabaseConnection,
        msg: &ParsedMessage,
    ) -> AppResult<email::Model> {
        let date_received = parse_received_date(msg.date.as_deref());

        let fields = email::ActiveModel {
            message_id: Set(msg.id.clone()),
            thread_id: Set(msg.thread_id.clone()),
            sender: Set(msg.from.clone()),
            recipient: Set(msg.to.clone()),
            subject: Set(msg.subject.clone()),
            date_received: Set(date_received),
            snippet: Set(msg.snippet.clone()),
            is_read: Set(msg.is_read()),
            has_attachments: Set(msg.has_attachments),
            body_plain: Set((!msg.body_plain.is_empty()).then(|| msg.body_plain.clone())),
            body_html: Set((!msg.body_html.is_empty()).then(|| msg.body_html.clone())),
        };

        let model = match Email::find_by_id(&msg.id).one(conn).await? {
            Some(_) => fields.update(conn).await?,
            None => fields.insert(conn).await?,
        };

        Ok(model)
    }

    pub async fn get_by_id(
        conn: &DatabaseConnection,
        message_id: &str,
    ) -> AppResult<Option<email::Model>> {
        Ok(Email::find_by_id(message_id).one(conn).await?)
    }

    /// Associate a label with an email. Returns false when either side is
    /// missing; linking twice is a no-op.
    pub async fn link_label(
        conn: &DatabaseConnection,
        message_id: &str,
        label_id: &str,
    ) -> AppResult<bool> {
        let email = Email::find_by_id(message_id).one(conn).await?;
        let label = Label::find_by_id(label_id).one(conn).await?;
        if email.is_none() || label.is_none() {
            return Ok(false);
        }

        let existing = EmailLabel::find_by_id((message_id.to_string(), label_id.to_string()))
            .one(conn)
            .await?;

        if existing.is_none() {
            email_label::ActiveModel {
                email_id: Set(message_id.to_string()),
                label_id: Set(label_id.to_string()),
            }
            .insert(conn)
            .await?;
        }

        Ok(true)
    }

    pub async fn unlink_label(
        conn: &DatabaseConnection,
        message_id: &str,
        label_id: &str,
    ) -> AppResult<bool> {
        let email = Email::find_by_id(message_id).one(conn).await?;
        let label = Label::find_by_id(label_id).one(conn).await?;
        if email.is_none() || label.is_none() {
            return Ok(false);
        }

        EmailLabel::delete_by_id((message_id.to_string(), label_id.to_string()))
            .exec(conn)
            .await?;

        Ok(true)
    }
}

/// Parse an RFC 2822 date header. Some senders append a parenthesized zone
/// name that the strict parser rejects; strip it and retry before giving up
/// and stamping the current time.
pub fn parse_received_date(raw: Option<&str>) -> DateTimeWithTimeZone {
    let now = || Utc::now().fixed_offset();

    let Some(raw) = raw else {
        return now();
    };

    if let Ok(parsed) = DateTime::<FixedOffset>::parse_from_rfc2822(raw) {
        return parsed;
    }

    let trimmed = raw.split(" (").next().unwrap_or(raw).trim();
    match DateTime::<FixedOffset>::parse_from_str(trimmed, "%a, %d %b %Y %H:%M:%S %z") {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!("Could not parse date header '{}': {}", raw, e);
            now()
        }
    }
}

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    auth,
    email::client::{EmailClient, OutgoingMessage},
    error::{AppError, AppJsonResult},
    server_config::{cfg, token_path},
    ServerState,
};

async fn email_client(state: &ServerState) -> Result<EmailClient, AppError> {
    let credential = auth::load_credential(&token_path())?.ok_or_else(|| {
        AppError::Unauthorized("No stored credential; complete the OAuth flow first".to_string())
    })?;
    EmailClient::new(state.http_client.clone(), credential).await
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    pub to: String,
    pub subject: String,
    pub body_plain: String,
    pub body_html: Option<String>,
    pub cc: Option<String>,
    pub bcc: Option<String>,
}

pub async fn send(
    State(state): State<ServerState>,
    Json(req): Json<SendRequest>,
) -> AppJsonResult<Value> {
    let client = email_client(&state).await?;
    let sent = client
        .send(&OutgoingMessage {
            from: &cfg.account.email,
            to: &req.to,
            subject: &req.subject,
            body_plain: &req.body_plain,
            body_html: req.body_html.as_deref(),
            cc: req.cc.as_deref(),
            bcc: req.bcc.as_deref(),
            thread_id: None,
        })
        .await?;

    Ok(Json(json!({ "success": true, "message_id": sent.id })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyRequest {
    pub body_plain: String,
    pub body_html: Option<String>,
}

pub async fn reply(
    State(state): State<ServerState>,
    Path(message_id): Path<String>,
    Json(req): Json<ReplyRequest>,
) -> AppJsonResult<Value> {
    let client = email_client(&state).await?;
    let sent = client
        .reply_to_message(
            &cfg.account.email,
            &message_id,
            &req.body_plain,
            req.body_html.as_deref(),
        )
        .await?;

    Ok(Json(json!({ "success": true, "reply_id": sent.id })))
}

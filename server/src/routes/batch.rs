use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::{
    auth,
    email::{
        client::EmailClient,
        processor::{BatchProcessor, BatchResult},
        rules::ExtractionRules,
    },
    error::{AppError, AppJsonResult},
    model::store::SqlStore,
    prompt::chat::ChatClient,
    server_config::{cfg, token_path},
    ServerState,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchProcessParams {
    pub max_emails: Option<u32>,
    pub query: Option<String>,
}

/// Kick off a batch run over the most recent messages. Per-message failures
/// are reported inside the result, not as an HTTP error.
pub async fn process(
    State(state): State<ServerState>,
    Query(params): Query<BatchProcessParams>,
) -> AppJsonResult<BatchResult> {
    let credential = auth::load_credential(&token_path())?.ok_or_else(|| {
        AppError::Unauthorized("No stored credential; complete the OAuth flow first".to_string())
    })?;

    let mail = EmailClient::new(state.http_client.clone(), credential).await?;
    let generator = ChatClient::new(state.http_client.clone());
    let store = SqlStore::new(state.conn.clone());
    let rules = ExtractionRules::new(&cfg.rules.dir);

    let processor = BatchProcessor::new(mail, generator, store, rules);

    let max_emails = params.max_emails.unwrap_or(cfg.batch.max_emails);
    let query = params.query.unwrap_or_else(|| cfg.batch.query.clone());

    let result = processor.process_recent_emails(max_emails, &query).await;

    Ok(Json(result))
}

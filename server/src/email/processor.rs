//! Batch pipeline: fetch recent messages, persist them, and fan each one out
//! to the extraction prompts.
//!
//! Failure handling is deliberately asymmetric. A message that cannot be
//! fetched or persisted counts as failed and is reported per id; an extractor
//! that misbehaves only costs that message its artifacts. Only the initial
//! listing call can fail the whole run.

use chrono::Utc;
use serde::Serialize;

use crate::{
    email::{client::MailProvider, rules::ExtractionRules},
    error::{AppError, AppResult},
    model::{label::LabelPayload, store::MessageStore},
    prompt::{
        chat::Generator,
        extractor::{run_extraction, ExtractedData, ExtractorKind},
    },
};

#[derive(Debug, Default, Serialize)]
pub struct BatchStats {
    pub total_emails: u32,
    pub emails_processed: u32,
    pub emails_failed: u32,
    pub reminders_extracted: u32,
    pub todos_extracted: u32,
    pub finance_data_extracted: u32,
    pub failed_emails: Vec<FailedEmail>,
}

#[derive(Debug, Serialize)]
pub struct FailedEmail {
    pub email_id: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct BatchResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub stats: BatchStats,
    pub duration_seconds: f64,
    pub start_time: String,
    pub end_time: String,
}

pub struct BatchProcessor<M, G, S> {
    mail: M,
    generator: G,
    store: S,
    rules: ExtractionRules,
}

impl<M: MailProvider, G: Generator, S: MessageStore> BatchProcessor<M, G, S> {
    pub fn new(mail: M, generator: G, store: S, rules: ExtractionRules) -> Self {
        BatchProcessor {
            mail,
            generator,
            store,
            rules,
        }
    }

    /// Run the whole pipeline. This never returns an error: anything that
    /// goes wrong is folded into the result.
    pub async fn process_recent_emails(&self, max_emails: u32, query: &str) -> BatchResult {
        let start_time = Utc::now();
        tracing::info!("Starting batch processing of up to {} emails", max_emails);

        let message_ids = match self.mail.list_message_ids(max_emails, query).await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::error!("Error retrieving emails: {}", e);
                let end_time = Utc::now();
                return BatchResult {
                    success: false,
                    error: Some(format!("Failed to retrieve emails: {}", e)),
                    stats: BatchStats::default(),
                    duration_seconds: (end_time - start_time).num_milliseconds() as f64 / 1000.0,
                    start_time: start_time.to_rfc3339(),
                    end_time: end_time.to_rfc3339(),
                };
            }
        };

        tracing::info!("Retrieved {} message ids", message_ids.len());

        let mut stats = BatchStats {
            total_emails: message_ids.len() as u32,
            ..Default::default()
        };

        for message_id in &message_ids {
            match self.process_single_email(message_id, &mut stats).await {
                Ok(()) => stats.emails_processed += 1,
                Err(e) => {
                    tracing::error!("Error processing email {}: {}", message_id, e);
                    stats.emails_failed += 1;
                    stats.failed_emails.push(FailedEmail {
                        email_id: message_id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let end_time = Utc::now();
        let duration_seconds = (end_time - start_time).num_milliseconds() as f64 / 1000.0;

        tracing::info!(
            "Batch processing completed in {:.2}s: {} processed, {} failed",
            duration_seconds,
            stats.emails_processed,
            stats.emails_failed
        );

        BatchResult {
            success: true,
            error: None,
            stats,
            duration_seconds,
            start_time: start_time.to_rfc3339(),
            end_time: end_time.to_rfc3339(),
        }
    }

    async fn process_single_email(
        &self,
        message_id: &str,
        stats: &mut BatchStats,
    ) -> AppResult<()> {
        tracing::info!("Processing email {}", message_id);

        let message = self
            .mail
            .get_parsed_message(message_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Message {} not found", message_id)))?;

        self.store.upsert_message(&message).await?;

        for label_id in &message.label_ids {
            self.store
                .upsert_label(&LabelPayload::from_label_id(label_id))
                .await?;
            self.store.link_label(message_id, label_id).await?;
        }

        // The summary is generated for its side effects in the logs only;
        // nothing is persisted for it yet
        match run_extraction(
            &self.mail,
            &self.generator,
            &self.rules,
            ExtractorKind::Summary,
            message_id,
        )
        .await
        {
            Ok(ExtractedData::Summary(summary)) => {
                tracing::info!(
                    "Summary for email {} ({} chars): {}",
                    message_id,
                    summary.len(),
                    summary.chars().take(120).collect::<String>()
                );
            }
            Ok(other) => {
                tracing::warn!("Unexpected summary output for email {}: {:?}", message_id, other);
            }
            Err(e) => {
                tracing::warn!("Error summarizing email {}: {}", message_id, e);
            }
        }

        match run_extraction(
            &self.mail,
            &self.generator,
            &self.rules,
            ExtractorKind::Reminder,
            message_id,
        )
        .await
        {
            Ok(ExtractedData::Reminders(reminders)) => {
                for reminder in reminders.iter().filter(|r| r.title.is_some()) {
                    self.store.insert_reminder(message_id, reminder).await?;
                    stats.reminders_extracted += 1;
                }
            }
            Ok(other) => {
                tracing::warn!(
                    "Unexpected reminder output for email {}: {:?}",
                    message_id,
                    other
                );
            }
            Err(e) => {
                tracing::warn!("Error extracting reminders from email {}: {}", message_id, e);
            }
        }

        match run_extraction(
            &self.mail,
            &self.generator,
            &self.rules,
            ExtractorKind::Todo,
            message_id,
        )
        .await
        {
            Ok(ExtractedData::Todos(todos)) => {
                for todo in todos.iter().filter(|t| t.task.is_some()) {
                    self.store.insert_todo(message_id, todo).await?;
                    stats.todos_extracted += 1;
                }
            }
            Ok(other) => {
                tracing::warn!("Unexpected todo output for email {}: {:?}", message_id, other);
            }
            Err(e) => {
                tracing::warn!("Error extracting todos from email {}: {}", message_id, e);
            }
        }

        match run_extraction(
            &self.mail,
            &self.generator,
            &self.rules,
            ExtractorKind::Finance,
            message_id,
        )
        .await
        {
            Ok(ExtractedData::Finance(fields)) => {
                if fields.has_recognized_field() {
                    self.store.insert_finance(message_id, &fields).await?;
                    stats.finance_data_extracted += 1;
                }
            }
            Ok(other) => {
                tracing::warn!(
                    "Unexpected finance output for email {}: {:?}",
                    message_id,
                    other
                );
            }
            Err(e) => {
                tracing::warn!(
                    "Error extracting finance data from email {}: {}",
                    message_id,
                    e
                );
            }
        }

        tracing::info!("Completed processing email {}", message_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::{HashMap, HashSet},
        sync::Mutex,
    };

    use super::*;
    use crate::{
        email::parsed_message::ParsedMessage,
        prompt::extractor::{FinanceFields, ReminderItem, TodoItem},
    };

    struct StubMail {
        messages: HashMap<String, ParsedMessage>,
        order: Vec<String>,
        fail_list: bool,
    }

    impl StubMail {
        fn new(messages: Vec<ParsedMessage>) -> Self {
            let order = messages.iter().map(|m| m.id.clone()).collect();
            let messages = messages.into_iter().map(|m| (m.id.clone(), m)).collect();
            StubMail {
                messages,
                order,
                fail_list: false,
            }
        }
    }

    impl MailProvider for StubMail {
        async fn list_message_ids(&self, max_results: u32, _query: &str) -> AppResult<Vec<String>> {
            if self.fail_list {
                return Err(AppError::Internal(anyhow::anyhow!("mailbox unavailable")));
            }
            Ok(self
                .order
                .iter()
                .take(max_results as usize)
                .cloned()
                .collect())
        }

        async fn get_parsed_message(&self, message_id: &str) -> AppResult<Option<ParsedMessage>> {
            Ok(self.messages.get(message_id).cloned())
        }
    }

    /// Answers each extractor with one artifact per message. Reminder answers
    /// can be switched to prose to exercise the unparsable path.
    struct StubGenerator {
        garbled_reminders: bool,
    }

    impl Generator for StubGenerator {
        async fn generate(&self, prompt: &str) -> AppResult<String> {
            if prompt.starts_with("Extract all todo items") {
                Ok(r#"{"todos": [{"task": "Reply to thread", "priority": "high"}, {"priority": "low"}], "has_action_required": true}"#.to_string())
            } else if prompt.starts_with("Extract all reminders") {
                if self.garbled_reminders {
                    Ok("There are no reminders worth noting here.".to_string())
                } else {
                    Ok(r#"{"reminders": [{"title": "Standup", "date": "2024-10-02"}], "has_time_sensitive_content": true}"#.to_string())
                }
            } else if prompt.starts_with("Extract structured financial information") {
                Ok(r#"{"amount": 19.99, "merchant": "Acme", "category": "software"}"#.to_string())
            } else {
                Ok("A short summary of the email.".to_string())
            }
        }
    }

    #[derive(Default)]
    struct StoreState {
        emails: Vec<String>,
        labels: Vec<String>,
        links: Vec<(String, String)>,
        todos: Vec<(String, TodoItem)>,
        reminders: Vec<(String, ReminderItem)>,
        finance: Vec<(String, FinanceFields)>,
    }

    #[derive(Default)]
    struct StubStore {
        state: Mutex<StoreState>,
        fail_upsert_for: HashSet<String>,
    }

    impl MessageStore for StubStore {
        async fn upsert_message(&self, msg: &ParsedMessage) -> AppResult<()> {
            if self.fail_upsert_for.contains(&msg.id) {
                return Err(AppError::DbError(sea_orm::DbErr::Custom(
                    "constraint violation".to_string(),
                )));
            }
            self.state.lock().unwrap().emails.push(msg.id.clone());
            Ok(())
        }

        async fn upsert_label(&self, payload: &LabelPayload) -> AppResult<()> {
            self.state.lock().unwrap().labels.push(payload.id.clone());
            Ok(())
        }

        async fn link_label(&self, message_id: &str, label_id: &str) -> AppResult<bool> {
            self.state
                .lock()
                .unwrap()
                .links
                .push((message_id.to_string(), label_id.to_string()));
            Ok(true)
        }

        async fn unlink_label(&self, message_id: &str, label_id: &str) -> AppResult<bool> {
            self.state
                .lock()
                .unwrap()
                .links
                .retain(|(m, l)| !(m == message_id && l == label_id));
            Ok(true)
        }

        async fn insert_todo(&self, email_id: &str, item: &TodoItem) -> AppResult<()> {
            self.state
                .lock()
                .unwrap()
                .todos
                .push((email_id.to_string(), item.clone()));
            Ok(())
        }

        async fn insert_reminder(&self, email_id: &str, item: &ReminderItem) -> AppResult<()> {
            self.state
                .lock()
                .unwrap()
                .reminders
                .push((email_id.to_string(), item.clone()));
            Ok(())
        }

        async fn insert_finance(&self, email_id: &str, fields: &FinanceFields) -> AppResult<()> {
            self.state
                .lock()
                .unwrap()
                .finance
                .push((email_id.to_string(), fields.clone()));
            Ok(())
        }
    }

    fn message(id: &str) -> ParsedMessage {
        ParsedMessage {
            id: id.to_string(),
            thread_id: format!("thread-{}", id),
            label_ids: vec!["INBOX".to_string(), "UNREAD".to_string()],
            subject: Some("Quarterly review".to_string()),
            from: "alice@example.com".to_string(),
            to: "bob@example.com".to_string(),
            date: Some("Tue, 24 Sep 2024 10:00:00 +0000".to_string()),
            body_plain: "Please review the attached numbers.".to_string(),
            ..Default::default()
        }
    }

    fn rules() -> ExtractionRules {
        ExtractionRules::new(std::env::temp_dir().join("automail-no-rules"))
    }

    #[tokio::test]
    async fn test_batch_with_one_persistence_failure() {
        let mail = StubMail::new(vec![message("m1"), message("m2"), message("m3")]);
        let store = StubStore {
            fail_upsert_for: HashSet::from(["m2".to_string()]),
            ..Default::default()
        };
        let processor = BatchProcessor::new(
            mail,
            StubGenerator {
                garbled_reminders: false,
            },
            store,
            rules(),
        );

        let result = processor.process_recent_emails(10, "").await;

        assert!(result.success);
        assert!(result.error.is_none());
        assert_eq!(result.stats.total_emails, 3);
        assert_eq!(result.stats.emails_processed, 2);
        assert_eq!(result.stats.emails_failed, 1);
        assert_eq!(result.stats.failed_emails.len(), 1);
        assert_eq!(result.stats.failed_emails[0].email_id, "m2");

        // One reminder and one finance record per surviving message; the
        // todo without a task is skipped
        assert_eq!(result.stats.reminders_extracted, 2);
        assert_eq!(result.stats.todos_extracted, 2);
        assert_eq!(result.stats.finance_data_extracted, 2);

        let state = processor.store.state.lock().unwrap();
        assert_eq!(state.emails, vec!["m1", "m3"]);
        assert!(state.links.contains(&("m1".to_string(), "INBOX".to_string())));
        assert!(state.todos.iter().all(|(_, t)| t.task.is_some()));
    }

    #[tokio::test]
    async fn test_fatal_listing_failure() {
        let mut mail = StubMail::new(vec![message("m1")]);
        mail.fail_list = true;
        let processor = BatchProcessor::new(
            mail,
            StubGenerator {
                garbled_reminders: false,
            },
            StubStore::default(),
            rules(),
        );

        let result = processor.process_recent_emails(10, "").await;

        assert!(!result.success);
        assert!(result
            .error
            .as_deref()
            .unwrap()
            .starts_with("Failed to retrieve emails"));
        assert_eq!(result.stats.total_emails, 0);
        assert_eq!(result.stats.emails_processed, 0);
        assert!(result.stats.failed_emails.is_empty());
    }

    #[tokio::test]
    async fn test_garbled_extractor_does_not_fail_message() {
        let mail = StubMail::new(vec![message("m1")]);
        let processor = BatchProcessor::new(
            mail,
            StubGenerator {
                garbled_reminders: true,
            },
            StubStore::default(),
            rules(),
        );

        let result = processor.process_recent_emails(10, "").await;

        assert!(result.success);
        assert_eq!(result.stats.emails_processed, 1);
        assert_eq!(result.stats.emails_failed, 0);
        assert_eq!(result.stats.reminders_extracted, 0);
        // The other extractors still ran
        assert_eq!(result.stats.todos_extracted, 1);
        assert_eq!(result.stats.finance_data_extracted, 1);
    }

    #[tokio::test]
    async fn test_listed_but_missing_message_counts_as_failed() {
        let mut mail = StubMail::new(vec![message("m1")]);
        mail.order.push("ghost".to_string());
        let processor = BatchProcessor::new(
            mail,
            StubGenerator {
                garbled_reminders: false,
            },
            StubStore::default(),
            rules(),
        );

        let result = processor.process_recent_emails(10, "").await;

        assert_eq!(result.stats.total_emails, 2);
        assert_eq!(result.stats.emails_processed, 1);
        assert_eq!(result.stats.emails_failed, 1);
        assert_eq!(result.stats.failed_emails[0].email_id, "ghost");
    }

    #[tokio::test]
    async fn test_max_emails_caps_the_run() {
        let mail = StubMail::new(vec![message("m1"), message("m2"), message("m3")]);
        let processor = BatchProcessor::new(
            mail,
            StubGenerator {
                garbled_reminders: false,
            },
            StubStore::default(),
            rules(),
        );

        let result = processor.process_recent_emails(2, "").await;

        assert_eq!(result.stats.total_emails, 2);
        assert_eq!(result.stats.emails_processed, 2);
    }

    #[test]
    fn test_result_serialization_shape() {
        let result = BatchResult {
            success: true,
            error: None,
            stats: BatchStats::default(),
            duration_seconds: 1.25,
            start_time: "2024-09-24T10:00:00+00:00".to_string(),
            end_time: "2024-09-24T10:00:01+00:00".to_string(),
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], true);
        assert!(json.get("error").is_none());
        assert_eq!(json["stats"]["total_emails"], 0);
        assert_eq!(json["duration_seconds"], 1.25);
    }
}

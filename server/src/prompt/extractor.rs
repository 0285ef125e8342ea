//! One extraction pipeline for every artifact kind. The kinds differ only in
//! their prompt template, their rules file, and how the model's JSON answer is
//! read back out.

use chrono::Utc;
use derive_more::derive::Display;
use indoc::formatdoc;
use serde::Deserialize;
use serde_json::Value;

use crate::{
    email::{client::MailProvider, parsed_message::ParsedMessage, rules::ExtractionRules},
    error::AppError,
    prompt::chat::Generator,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ExtractorKind {
    Summary,
    Todo,
    Reminder,
    Finance,
}

impl ExtractorKind {
    pub fn rules_file(&self) -> &'static str {
        match self {
            ExtractorKind::Summary => "user_rules.txt",
            ExtractorKind::Todo => "todo_rules.txt",
            ExtractorKind::Reminder => "reminder_rules.txt",
            ExtractorKind::Finance => "finance_rules.txt",
        }
    }

    fn base_prompt(&self) -> String {
        match self {
            ExtractorKind::Summary => formatdoc! {r#"
                Analyze the following email thoroughly and extract all relevant information, regardless of the email's subject or type.
                Pay close attention to key dates and deadlines, action items, and important details such as transaction IDs, reference numbers, links, or attachments.
                Briefly summarize the main message or purpose of the email in a few sentences, and note whether immediate action is required.
                Talk in first person, as if you're the user's assistant.
                Just output the summary, do not include any other text."#},
            ExtractorKind::Todo => formatdoc! {r#"
                Extract all todo items, action items, and tasks from the following email.
                Return a JSON object with the following structure:
                {{
                    "todos": [
                        {{
                            "task": "The task description",
                            "priority": "high/medium/low",
                            "due_date": "YYYY-MM-DD or null if not specified",
                            "assignee": "Person assigned or null if not clear",
                            "context": "Brief context about the task"
                        }}
                    ],
                    "has_action_required": true/false
                }}

                Priority guidelines:
                - high: urgent tasks with explicit deadlines or marked as important
                - medium: tasks with deadlines but not urgent, or standard work items
                - low: nice-to-have items or FYI tasks

                Return only valid, parseable JSON. Do not include notes or explanations outside the JSON.
                If no todos are found, return an empty array for "todos" and set "has_action_required" to false."#},
            ExtractorKind::Reminder => {
                let today = Utc::now().format("%Y-%m-%d");
                formatdoc! {r#"
                    Extract all reminders, scheduled events, meetings, deadlines, and important dates from the following email.
                    Today's date is {today}.

                    Return a JSON object with the following structure:
                    {{
                        "reminders": [
                            {{
                                "title": "Brief description of the reminder",
                                "date": "YYYY-MM-DD or null if not specified",
                                "time": "HH:MM or null if not specified",
                                "location": "Location if applicable or null",
                                "description": "Detailed description or context",
                                "participants": ["List of people involved, if any"],
                                "recurring": true/false,
                                "recurrence_pattern": "daily/weekly/monthly/yearly/custom or null"
                            }}
                        ],
                        "has_time_sensitive_content": true/false
                    }}

                    Only extract genuine reminders and scheduled events - not generic mentions of dates or times.
                    Return only valid, parseable JSON. Do not include notes or explanations outside the JSON.
                    If no reminders are found, return an empty array for "reminders" and set "has_time_sensitive_content" to false."#}
            }
            ExtractorKind::Finance => formatdoc! {r#"
                Extract structured financial information from the following email.
                Return a JSON object with the following fields (leave empty if not found):
                - amount: monetary amount debited or credited
                - account_numbers: account or card numbers (partially masked if present)
                - transaction_type: purchase, refund, payment, bill, statement, etc.
                - transaction_purpose: what the transaction was for
                - due_date: any payment due date in YYYY-MM-DD format
                - merchant: name of the merchant or company involved. clean it up for easier reading.
                - category: spending category (e.g., dining, travel, utilities, etc.). extract from merchant.

                Return only valid, parseable JSON. Do not include notes or explanations outside the JSON."#},
        }
    }

    /// Assemble the full prompt. Todo and reminder prompts carry the subject;
    /// the reminder prompt also carries the message date so relative phrases
    /// can be resolved.
    pub fn compose_prompt(&self, rules: Option<&str>, message: &ParsedMessage, body: &str) -> String {
        let mut prompt = self.base_prompt();

        if let Some(rules) = rules {
            prompt.push_str(&format!("\n\nUser Rules:\n{}", rules));
        }

        if matches!(self, ExtractorKind::Todo | ExtractorKind::Reminder) {
            prompt.push_str(&format!(
                "\n\nEmail Subject: {}",
                message.subject.as_deref().unwrap_or("")
            ));
        }

        if matches!(self, ExtractorKind::Reminder) {
            prompt.push_str(&format!(
                "\n\nEmail Date: {}",
                message.date.as_deref().unwrap_or("")
            ));
        }

        prompt.push_str(&format!("\n\nEmail Content:\n{}", body));
        prompt
    }
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct TodoItem {
    pub task: Option<String>,
    pub priority: Option<String>,
    pub due_date: Option<String>,
    pub assignee: Option<String>,
    pub context: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ReminderItem {
    pub title: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub participants: Vec<String>,
    pub recurring: Option<bool>,
    pub recurrence_pattern: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct FinanceFields {
    pub amount: Option<Value>,
    pub account_numbers: Option<Value>,
    pub transaction_type: Option<String>,
    pub transaction_purpose: Option<String>,
    pub due_date: Option<String>,
    pub merchant: Option<String>,
    pub category: Option<String>,
}

impl FinanceFields {
    /// Whether the model found anything worth persisting.
    pub fn has_recognized_field(&self) -> bool {
        let amount_set = matches!(
            &self.amount,
            Some(Value::Number(_)) | Some(Value::String(_))
        ) && self.amount != Some(Value::String(String::new()));

        let non_empty = |field: &Option<String>| field.as_deref().is_some_and(|s| !s.is_empty());

        amount_set
            || non_empty(&self.transaction_purpose)
            || non_empty(&self.transaction_type)
            || non_empty(&self.merchant)
    }

    pub fn amount_text(&self) -> Option<String> {
        match &self.amount {
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExtractedData {
    Summary(String),
    Todos(Vec<TodoItem>),
    Reminders(Vec<ReminderItem>),
    Finance(FinanceFields),
    /// The model's answer could not be read as the expected JSON shape
    Unparsed { raw: String },
}

#[derive(Debug, Display)]
pub enum ExtractError {
    #[display("message has no text content")]
    NoContent,
    #[display("message not found")]
    MessageMissing,
    #[display("{_0}")]
    Transport(AppError),
}

impl From<AppError> for ExtractError {
    fn from(e: AppError) -> Self {
        ExtractError::Transport(e)
    }
}

/// Remove a surrounding markdown code fence, if present. Models often wrap
/// their JSON in ```json ... ``` despite instructions.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut content = raw.trim();
    if let Some(rest) = content.strip_prefix("```json") {
        content = rest.trim_start();
    }
    if let Some(rest) = content.strip_prefix("```") {
        content = rest.trim_start();
    }
    if let Some(rest) = content.strip_suffix("```") {
        content = rest.trim_end();
    }
    content
}

/// Read a model answer back into structured data. Answers that are not valid
/// JSON, or that carry an "error" key, come back as [`ExtractedData::Unparsed`].
pub fn parse_extraction(kind: ExtractorKind, content: &str) -> ExtractedData {
    if kind == ExtractorKind::Summary {
        return ExtractedData::Summary(content.trim().to_string());
    }

    let stripped = strip_code_fences(content);
    let value: Value = match serde_json::from_str(stripped) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Could not parse {} extraction as JSON: {}", kind, e);
            return ExtractedData::Unparsed {
                raw: content.to_string(),
            };
        }
    };

    if value.get("error").is_some() {
        return ExtractedData::Unparsed {
            raw: content.to_string(),
        };
    }

    match kind {
        ExtractorKind::Todo => {
            let todos = value
                .get("todos")
                .cloned()
                .map(|v| serde_json::from_value(v).unwrap_or_default())
                .unwrap_or_default();
            ExtractedData::Todos(todos)
        }
        ExtractorKind::Reminder => {
            let reminders = value
                .get("reminders")
                .cloned()
                .map(|v| serde_json::from_value(v).unwrap_or_default())
                .unwrap_or_default();
            ExtractedData::Reminders(reminders)
        }
        ExtractorKind::Finance => match serde_json::from_value(value) {
            Ok(fields) => ExtractedData::Finance(fields),
            Err(_) => ExtractedData::Unparsed {
                raw: content.to_string(),
            },
        },
        ExtractorKind::Summary => unreachable!("summary handled above"),
    }
}

/// Run one extractor against one message: fetch, compose, generate, parse.
pub async fn run_extraction<M: MailProvider, G: Generator>(
    mail: &M,
    generator: &G,
    rules: &ExtractionRules,
    kind: ExtractorKind,
    message_id: &str,
) -> Result<ExtractedData, ExtractError> {
    let message = mail
        .get_parsed_message(message_id)
        .await?
        .ok_or(ExtractError::MessageMissing)?;

    let body = message.text().ok_or(ExtractError::NoContent)?;

    let prompt = kind.compose_prompt(rules.load(kind).as_deref(), &message, &body);
    let answer = generator.generate(&prompt).await?;

    Ok(parse_extraction(kind, &answer))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> ParsedMessage {
        ParsedMessage {
            subject: Some("Team offsite".to_string()),
            date: Some("Tue, 24 Sep 2024 10:00:00 +0000".to_string()),
            body_plain: "See you there".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_strip_fenced_json() {
        assert_eq!(
            strip_code_fences("```json\n{\"todos\": []}\n```"),
            "{\"todos\": []}"
        );
        assert_eq!(strip_code_fences("```\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("{\"a\": 1}"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("  {\"a\": 1}  "), "{\"a\": 1}");
    }

    #[test]
    fn test_compose_prompt_layout() {
        let rules = Some("Skip newsletters");
        let prompt = ExtractorKind::Reminder.compose_prompt(rules, &message(), "See you there");

        assert!(prompt.contains("User Rules:\nSkip newsletters"));
        assert!(prompt.contains("Email Subject: Team offsite"));
        assert!(prompt.contains("Email Date: Tue, 24 Sep 2024"));
        assert!(prompt.ends_with("Email Content:\nSee you there"));

        // Rules section is absent when no rules are configured
        let prompt = ExtractorKind::Todo.compose_prompt(None, &message(), "See you there");
        assert!(!prompt.contains("User Rules:"));
        assert!(prompt.contains("Email Subject: Team offsite"));

        // Finance and summary prompts carry no subject line
        let prompt = ExtractorKind::Finance.compose_prompt(None, &message(), "See you there");
        assert!(!prompt.contains("Email Subject:"));
    }

    #[test]
    fn test_reminder_prompt_has_today() {
        let today = Utc::now().format("%Y-%m-%d").to_string();
        let prompt = ExtractorKind::Reminder.base_prompt();
        assert!(prompt.contains(&format!("Today's date is {}", today)));
    }

    #[test]
    fn test_parse_todos() {
        let content = r#"```json
        {"todos": [{"task": "Book venue", "priority": "high", "due_date": "2024-10-01"}], "has_action_required": true}
        ```"#;
        match parse_extraction(ExtractorKind::Todo, content) {
            ExtractedData::Todos(todos) => {
                assert_eq!(todos.len(), 1);
                assert_eq!(todos[0].task.as_deref(), Some("Book venue"));
                assert_eq!(todos[0].priority.as_deref(), Some("high"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_parse_reminders() {
        let content = r#"{"reminders": [{"title": "Standup", "date": "2024-10-02", "recurring": true, "participants": ["alice"]}], "has_time_sensitive_content": true}"#;
        match parse_extraction(ExtractorKind::Reminder, content) {
            ExtractedData::Reminders(reminders) => {
                assert_eq!(reminders[0].title.as_deref(), Some("Standup"));
                assert_eq!(reminders[0].recurring, Some(true));
                assert_eq!(reminders[0].participants, vec!["alice"]);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_parse_finance() {
        let content = r#"{"amount": 42.50, "merchant": "Acme Groceries", "category": "groceries"}"#;
        match parse_extraction(ExtractorKind::Finance, content) {
            ExtractedData::Finance(fields) => {
                assert!(fields.has_recognized_field());
                assert_eq!(fields.amount_text().as_deref(), Some("42.5"));
                assert_eq!(fields.merchant.as_deref(), Some("Acme Groceries"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_finance_with_empty_fields_not_recognized() {
        let content = r#"{"amount": "", "merchant": "", "category": ""}"#;
        match parse_extraction(ExtractorKind::Finance, content) {
            ExtractedData::Finance(fields) => assert!(!fields.has_recognized_field()),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_parse_invalid_json_is_unparsed() {
        let result = parse_extraction(ExtractorKind::Todo, "I could not find any tasks.");
        assert!(matches!(result, ExtractedData::Unparsed { .. }));
    }

    #[test]
    fn test_parse_error_key_is_unparsed() {
        let content = r#"{"error": "Failed to parse todo data", "todos": []}"#;
        let result = parse_extraction(ExtractorKind::Todo, content);
        assert!(matches!(result, ExtractedData::Unparsed { .. }));
    }

    #[test]
    fn test_summary_passes_through() {
        let result = parse_extraction(ExtractorKind::Summary, "  You received an invoice.  ");
        assert_eq!(
            result,
            ExtractedData::Summary("You received an invoice.".to_string())
        );
    }

    #[test]
    fn test_missing_todos_key_is_empty() {
        let result = parse_extraction(ExtractorKind::Todo, r#"{"has_action_required": false}"#);
        assert_eq!(result, ExtractedData::Todos(vec![]));
    }
}

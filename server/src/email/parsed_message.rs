use super::{
    body::extract_content,
    envelope::{MessageEnvelope, MessagePart},
};

const UNREAD_LABEL: &str = "UNREAD";

/// A provider message flattened into the fields the rest of the system
/// consumes: headers of interest plus normalized plain/HTML bodies.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParsedMessage {
    pub id: String,
    pub thread_id: String,
    pub label_ids: Vec<String>,
    pub subject: Option<String>,
    pub from: String,
    pub to: String,
    pub date: Option<String>,
    pub snippet: Option<String>,
    pub body_plain: String,
    pub body_html: String,
    pub has_attachments: bool,
}

impl ParsedMessage {
    pub fn from_envelope(envelope: &MessageEnvelope) -> Self {
        let (body_plain, body_html) = envelope
            .payload
            .as_ref()
            .map(extract_content)
            .unwrap_or_default();

        let header = |name: &str| {
            envelope
                .payload
                .as_ref()
                .and_then(|p| p.header(name))
                .map(|v| v.to_string())
        };

        let has_attachments = envelope
            .payload
            .as_ref()
            .map(part_has_attachment)
            .unwrap_or(false);

        ParsedMessage {
            id: envelope.id.clone(),
            thread_id: envelope.thread_id.clone(),
            label_ids: envelope.label_ids.clone(),
            subject: header("Subject"),
            from: header("From").unwrap_or_default(),
            to: header("To").unwrap_or_default(),
            date: header("Date"),
            snippet: (!envelope.snippet.is_empty()).then(|| envelope.snippet.clone()),
            body_plain,
            body_html,
            has_attachments,
        }
    }

    pub fn is_read(&self) -> bool {
        !self.label_ids.iter().any(|l| l == UNREAD_LABEL)
    }

    /// Text handed to the extraction layer: plain body, else the HTML body
    /// rendered down to text. `None` when the message has no text content.
    pub fn text(&self) -> Option<String> {
        if !self.body_plain.is_empty() {
            return Some(self.body_plain.clone());
        }
        if !self.body_html.is_empty() {
            return Some(html2text::from_read(self.body_html.as_bytes(), 400));
        }
        None
    }
}

fn part_has_attachment(part: &MessagePart) -> bool {
    let is_attachment = part.filename.as_deref().is_some_and(|f| !f.is_empty())
        || part
            .body
            .as_ref()
            .is_some_and(|b| b.attachment_id.is_some());

    is_attachment || part.parts.iter().any(part_has_attachment)
}

use crate::{
    db_core::prelude::*,
    email::parsed_message::ParsedMessage,
    error::AppResult,
    prompt::extractor::{FinanceFields, ReminderItem, TodoItem},
};

use super::{
    artifacts::{FinanceRecordCtrl, ReminderCtrl, TodoCtrl},
    email::EmailCtrl,
    label::{LabelCtrl, LabelPayload},
};

/// Everything batch processing persists, behind one seam.
#[allow(async_fn_in_trait)]
pub trait MessageStore {
    async fn upsert_message(&self, msg: &ParsedMessage) -> AppResult<()>;
    async fn upsert_label(&self, payload: &LabelPayload) -> AppResult<()>;
    async fn link_label(&self, message_id: &str, label_id: &str) -> AppResult<bool>;
    async fn unlink_label(&self, message_id: &str, label_id: &str) -> AppResult<bool>;
    async fn insert_todo(&self, email_id: &str, item: &TodoItem) -> AppResult<()>;
    async fn insert_reminder(&self, email_id: &str, item: &ReminderItem) -> AppResult<()>;
    async fn insert_finance(&self, email_id: &str, fields: &FinanceFields) -> AppResult<()>;
}

#[derive(Clone)]
pub struct SqlStore {
    conn: DatabaseConnection,
}

impl SqlStore {
    pub fn new(conn: DatabaseConnection) -> Self {
        SqlStore { conn }
    }
}

impl MessageStore for SqlStore {
    async fn upsert_message(&self, msg: &ParsedMessage) -> AppResult<()> {
        EmailCtrl::upsert_message(&self.conn, msg).await?;
        Ok(())
    }

    async fn upsert_label(&self, payload: &LabelPayload) -> AppResult<()> {
        LabelCtrl::upsert(&self.conn, payload).await?;
        Ok(())
    }

    async fn link_label(&self, message_id: &str, label_id: &str) -> AppResult<bool> {
        EmailCtrl::link_label(&self.conn, message_id, label_id).await
    }

    async fn unlink_label(&self, message_id: &str, label_id: &str) -> AppResult<bool> {
        EmailCtrl::unlink_label(&self.conn, message_id, label_id).await
    }

    async fn insert_todo(&self, email_id: &str, item: &TodoItem) -> AppResult<()> {
        TodoCtrl::create(&self.conn, email_id, item).await?;
        Ok(())
    }

    async fn insert_reminder(&self, email_id: &str, item: &ReminderItem) -> AppResult<()> {
        ReminderCtrl::create(&self.conn, email_id, item).await?;
        Ok(())
    }

    async fn insert_finance(&self, email_id: &str, fields: &FinanceFields) -> AppResult<()> {
        FinanceRecordCtrl::create(&self.conn, email_id, fields).await?;
        Ok(())
    }
}

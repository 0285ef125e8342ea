//! Extraction artifacts are append-only: every batch run that finds items
//! inserts fresh rows under the email they came from.

use chrono::{NaiveDate, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::{
    db_core::prelude::*,
    error::AppResult,
    prompt::extractor::{FinanceFields, ReminderItem, TodoItem},
};

fn parse_due_date(raw: Option<&str>) -> Option<Date> {
    raw.and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
}

pub struct TodoCtrl;

impl TodoCtrl {
    pub async fn create(
        conn: &DatabaseConnection,
        email_id: &str,
        item: &TodoItem,
    ) -> AppResult<todo::Model> {
        let model = todo::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            email_id: Set(email_id.to_string()),
            description: Set(item.task.clone().unwrap_or_default()),
            priority: Set(Some(
                item.priority.clone().unwrap_or_else(|| "medium".to_string()),
            )),
            is_completed: Set(false),
            created_at: Set(Utc::now().fixed_offset()),
        }
        .insert(conn)
        .await?;

        Ok(model)
    }

    pub async fn list_by_email(
        conn: &DatabaseConnection,
        email_id: &str,
    ) -> AppResult<Vec<todo::Model>> {
        Ok(Todo::find()
            .filter(todo::Column::EmailId.eq(email_id))
            .all(conn)
            .await?)
    }
}

pub struct ReminderCtrl;

impl ReminderCtrl {
    pub async fn create(
        conn: &DatabaseConnection,
        email_id: &str,
        item: &ReminderItem,
    ) -> AppResult<reminder::Model> {
        let model = reminder::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            email_id: Set(email_id.to_string()),
            description: Set(item.title.clone().unwrap_or_default()),
            due_date: Set(parse_due_date(item.date.as_deref())),
            is_completed: Set(false),
            created_at: Set(Utc::now().fixed_offset()),
        }
        .insert(conn)
        .await?;

        Ok(model)
    }

    pub async fn list_by_email(
        conn: &DatabaseConnection,
        email_id: &str,
    ) -> AppResult<Vec<reminder::Model>> {
        Ok(Reminder::find()
            .filter(reminder::Column::EmailId.eq(email_id))
            .all(conn)
            .await?)
    }
}

pub struct FinanceRecordCtrl;

impl FinanceRecordCtrl {
    pub async fn create(
        conn: &DatabaseConnection,
        email_id: &str,
        fields: &FinanceFields,
    ) -> AppResult<finance_record::Model> {
        // Account numbers stay out of dedicated columns; they ride along in
        // the details blob
        let details = fields
            .account_numbers
            .as_ref()
            .filter(|v| !v.is_null())
            .map(|numbers| json!({ "account_numbers": numbers }));

        let model = finance_record::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            email_id: Set(email_id.to_string()),
            amount: Set(fields.amount_text()),
            currency: Set(None),
            transaction_purpose: Set(fields.transaction_purpose.clone()),
            transaction_type: Set(fields.transaction_type.clone()),
            merchant: Set(fields.merchant.clone()),
            category: Set(fields.category.clone()),
            due_date: Set(parse_due_date(fields.due_date.as_deref())),
            details: Set(details),
            created_at: Set(Utc::now().fixed_offset()),
        }
        .insert(conn)
        .await?;

        Ok(model)
    }

    pub async fn list_by_email(
        conn: &DatabaseConnection,
        email_id: &str,
    ) -> AppResult<Vec<finance_record::Model>> {
        Ok(FinanceRecord::find()
            .filter(finance_record::Column::EmailId.eq(email_id))
            .all(conn)
            .await?)
    }
}

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Messages fetched from the mail provider, keyed by the provider's
/// message id.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "email")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub message_id: String,
    pub thread_id: String,
    pub sender: String,
    pub recipient: String,
    #[sea_orm(nullable)]
    pub subject: Option<String>,
    pub date_received: DateTimeWithTimeZone,
    #[sea_orm(column_type = "Text", nullable)]
    pub snippet: Option<String>,
    pub is_read: bool,
    pub has_attachments: bool,
    #[sea_orm(column_type = "Text", nullable)]
    pub body_plain: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub body_html: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::todo::Entity")]
    Todo,
    #[sea_orm(has_many = "super::reminder::Entity")]
    Reminder,
    #[sea_orm(has_many = "super::finance_record::Entity")]
    FinanceRecord,
}

impl Related<super::todo::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Todo.def()
    }
}

impl Related<super::reminder::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reminder.def()
    }
}

impl Related<super::finance_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FinanceRecord.def()
    }
}

impl Related<super::label::Entity> for Entity {
    fn to() -> RelationDef {
        super::email_label::Relation::Label.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::email_label::Relation::Email.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Financial data extracted from emails. Append-only.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "finance_record")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub email_id: String,
    #[sea_orm(nullable)]
    pub amount: Option<String>,
    #[sea_orm(nullable)]
    pub currency: Option<String>,
    #[sea_orm(nullable)]
    pub transaction_purpose: Option<String>,
    #[sea_orm(nullable)]
    pub transaction_type: Option<String>,
    #[sea_orm(nullable)]
    pub merchant: Option<String>,
    #[sea_orm(nullable)]
    pub category: Option<String>,
    #[sea_orm(nullable)]
    pub due_date: Option<Date>,
    #[sea_orm(nullable)]
    pub details: Option<Json>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::email::Entity",
        from = "Column::EmailId",
        to = "super::email::Column::MessageId"
    )]
    Email,
}

impl Related<super::email::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Email.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

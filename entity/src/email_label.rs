use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Association table between emails and labels.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "email_label")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub email_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub label_id: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::email::Entity",
        from = "Column::EmailId",
        to = "super::email::Column::MessageId"
    )]
    Email,
    #[sea_orm(
        belongs_to = "super::label::Entity",
        from = "Column::LabelId",
        to = "super::label::Column::LabelId"
    )]
    Label,
}

impl ActiveModelBehavior for ActiveModel {}

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Mail provider labels. `kind` is either "system" or "user".
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "label")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub label_id: String,
    pub name: String,
    pub kind: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl Related<super::email::Entity> for Entity {
    fn to() -> RelationDef {
        super::email_label::Relation::Email.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::email_label::Relation::Label.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}

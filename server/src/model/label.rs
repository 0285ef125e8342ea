use serde::Deserialize;

use crate::{db_core::prelude::*, error::AppResult};

#[derive(Debug, Clone, Deserialize)]
pub struct LabelPayload {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub kind: Option<String>,
}

impl LabelPayload {
    /// Batch processing only sees label ids, so id doubles as the name until
    /// a richer label sync fills it in.
    pub fn from_label_id(label_id: &str) -> Self {
        LabelPayload {
            id: label_id.to_string(),
            name: label_id.to_string(),
            kind: None,
        }
    }
}

pub struct LabelCtrl;

impl LabelCtrl {
    pub async fn upsert(conn: &DatabaseConnection, payload: &LabelPayload) -> AppResult<label::Model> {
        let kind = payload.kind.clone().unwrap_or_else(|| "user".to_string());

        let model = match Label::find_by_id(&payload.id).one(conn).await? {
            Some(existing) => {
                let mut active: label::ActiveModel = existing.into();
                active.name = Set(payload.name.clone());
                active.kind = Set(kind);
                active.update(conn).await?
            }
            None => {
                label::ActiveModel {
                    label_id: Set(payload.id.clone()),
                    name: Set(payload.name.clone()),
                    kind: Set(kind),
                }
                .insert(conn)
                .await?
            }
        };

        Ok(model)
    }

    pub async fn list(conn: &DatabaseConnection) -> AppResult<Vec<label::Model>> {
        Ok(Label::find().all(conn).await?)
    }
}

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[sea_orm(string_value = "audio")]
    Audio,
    #[sea_orm(string_value = "image")]
    Image,
}

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize)]
#[sea_orm(table_name = "uploads")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub owner_id: Option<i64>,
    pub original_name: String,
    #[serde(skip_serializing)]
    pub stored_path: String,
    pub mime_type: String,
    pub kind: MediaKind,
    /// Size in bytes
    pub size: i64,
    pub sha256: String,
    pub created_at: i64,
}

impl ActiveModelBehavior for ActiveModel {}

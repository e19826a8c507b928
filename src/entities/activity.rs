use std::fmt;

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    #[sea_orm(string_value = "play")]
    Play,
    #[sea_orm(string_value = "pause")]
    Pause,
    #[sea_orm(string_value = "resume")]
    Resume,
    #[sea_orm(string_value = "skip")]
    Skip,
    #[sea_orm(string_value = "seek")]
    Seek,
    #[sea_orm(string_value = "complete")]
    Complete,
    #[sea_orm(string_value = "like")]
    Like,
    #[sea_orm(string_value = "unlike")]
    Unlike,
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActivityKind::Play => "play",
            ActivityKind::Pause => "pause",
            ActivityKind::Resume => "resume",
            ActivityKind::Skip => "skip",
            ActivityKind::Seek => "seek",
            ActivityKind::Complete => "complete",
            ActivityKind::Like => "like",
            ActivityKind::Unlike => "unlike",
        };
        f.write_str(name)
    }
}

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize)]
#[sea_orm(table_name = "activities")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: i64,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub music_id: Option<i64>,
    pub details: Option<String>,
    pub created_at: i64,
}

impl ActiveModelBehavior for ActiveModel {}

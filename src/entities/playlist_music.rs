use sea_orm::entity::prelude::*;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "playlist_musics")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub playlist_id: i64,
    #[sea_orm(primary_key, auto_increment = false)]
    pub music_id: i64,
    /// Zero-based, dense within a playlist
    pub position: i32,
    pub added_at: i64,
}

impl ActiveModelBehavior for ActiveModel {}

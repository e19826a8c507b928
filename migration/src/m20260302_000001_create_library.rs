use sea_orm_migration::prelude::*;

use super::m20260301_000001_create_accounts::Users;
use super::m20260301_000002_create_catalog::Musics;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create playlists table
        manager
            .create_table(
                Table::create()
                    .table(Playlists::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Playlists::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Playlists::Name).string().not_null())
                    .col(ColumnDef::new(Playlists::NameKey).string().not_null())
                    .col(ColumnDef::new(Playlists::Description).string())
                    .col(ColumnDef::new(Playlists::OwnerId).integer().not_null())
                    .col(
                        ColumnDef::new(Playlists::IsPublic)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Playlists::CreatedAt).integer().not_null())
                    .col(ColumnDef::new(Playlists::UpdatedAt).integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_playlists_owner_id")
                            .from(Playlists::Table, Playlists::OwnerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create playlist_musics junction table
        manager
            .create_table(
                Table::create()
                    .table(PlaylistMusics::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PlaylistMusics::PlaylistId)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PlaylistMusics::MusicId).integer().not_null())
                    .col(ColumnDef::new(PlaylistMusics::Position).integer().not_null())
                    .col(ColumnDef::new(PlaylistMusics::AddedAt).integer().not_null())
                    .primary_key(
                        Index::create()
                            .col(PlaylistMusics::PlaylistId)
                            .col(PlaylistMusics::MusicId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_playlist_musics_playlist_id")
                            .from(PlaylistMusics::Table, PlaylistMusics::PlaylistId)
                            .to(Playlists::Table, Playlists::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_playlist_musics_music_id")
                            .from(PlaylistMusics::Table, PlaylistMusics::MusicId)
                            .to(Musics::Table, Musics::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create reviews table
        manager
            .create_table(
                Table::create()
                    .table(Reviews::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Reviews::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Reviews::UserId).integer().not_null())
                    .col(ColumnDef::new(Reviews::TargetType).string().not_null())
                    .col(ColumnDef::new(Reviews::TargetId).integer().not_null())
                    .col(ColumnDef::new(Reviews::Rating).integer().not_null())
                    .col(ColumnDef::new(Reviews::Comment).text())
                    .col(ColumnDef::new(Reviews::CreatedAt).integer().not_null())
                    .col(ColumnDef::new(Reviews::UpdatedAt).integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_reviews_user_id")
                            .from(Reviews::Table, Reviews::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create activities table
        manager
            .create_table(
                Table::create()
                    .table(Activities::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Activities::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Activities::UserId).integer().not_null())
                    .col(ColumnDef::new(Activities::Kind).string().not_null())
                    .col(ColumnDef::new(Activities::MusicId).integer())
                    .col(ColumnDef::new(Activities::Details).string())
                    .col(ColumnDef::new(Activities::CreatedAt).integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_activities_user_id")
                            .from(Activities::Table, Activities::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_activities_music_id")
                            .from(Activities::Table, Activities::MusicId)
                            .to(Musics::Table, Musics::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // Create indexes
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_playlists_owner_name")
                    .table(Playlists::Table)
                    .col(Playlists::OwnerId)
                    .col(Playlists::NameKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_reviews_user_target")
                    .table(Reviews::Table)
                    .col(Reviews::UserId)
                    .col(Reviews::TargetType)
                    .col(Reviews::TargetId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_activities_user_created")
                    .table(Activities::Table)
                    .col(Activities::UserId)
                    .col(Activities::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop tables in reverse order
        manager
            .drop_table(Table::drop().table(Activities::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Reviews::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PlaylistMusics::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Playlists::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Playlists {
    Table,
    Id,
    Name,
    NameKey,
    Description,
    OwnerId,
    IsPublic,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum PlaylistMusics {
    Table,
    PlaylistId,
    MusicId,
    Position,
    AddedAt,
}

#[derive(DeriveIden)]
enum Reviews {
    Table,
    Id,
    UserId,
    TargetType,
    TargetId,
    Rating,
    Comment,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Activities {
    Table,
    Id,
    UserId,
    Kind,
    MusicId,
    Details,
    CreatedAt,
}

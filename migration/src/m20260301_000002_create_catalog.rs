use sea_orm_migration::prelude::*;

use super::m20260301_000001_create_accounts::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create uploads table
        manager
            .create_table(
                Table::create()
                    .table(Uploads::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Uploads::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Uploads::OwnerId).integer())
                    .col(ColumnDef::new(Uploads::OriginalName).string().not_null())
                    .col(ColumnDef::new(Uploads::StoredPath).string().not_null())
                    .col(ColumnDef::new(Uploads::MimeType).string().not_null())
                    .col(ColumnDef::new(Uploads::Kind).string().not_null())
                    .col(ColumnDef::new(Uploads::Size).big_integer().not_null())
                    .col(
                        ColumnDef::new(Uploads::Sha256)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Uploads::CreatedAt).integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_uploads_owner_id")
                            .from(Uploads::Table, Uploads::OwnerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // Create artists table
        manager
            .create_table(
                Table::create()
                    .table(Artists::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Artists::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Artists::Name).string().not_null())
                    .col(
                        ColumnDef::new(Artists::NameKey)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Artists::Bio).text())
                    .col(ColumnDef::new(Artists::Genre).string())
                    .col(ColumnDef::new(Artists::ImageUrl).string())
                    .col(ColumnDef::new(Artists::OwnerId).integer())
                    .col(ColumnDef::new(Artists::CreatedAt).integer().not_null())
                    .col(ColumnDef::new(Artists::UpdatedAt).integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_artists_owner_id")
                            .from(Artists::Table, Artists::OwnerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // Create albums table
        manager
            .create_table(
                Table::create()
                    .table(Albums::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Albums::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Albums::Title).string().not_null())
                    .col(ColumnDef::new(Albums::TitleKey).string().not_null())
                    .col(ColumnDef::new(Albums::ArtistId).integer().not_null())
                    .col(ColumnDef::new(Albums::ReleaseYear).integer())
                    .col(ColumnDef::new(Albums::Genre).string())
                    .col(ColumnDef::new(Albums::CoverUrl).string())
                    .col(
                        ColumnDef::new(Albums::TrackCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Albums::Duration)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Albums::CreatedAt).integer().not_null())
                    .col(ColumnDef::new(Albums::UpdatedAt).integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_albums_artist_id")
                            .from(Albums::Table, Albums::ArtistId)
                            .to(Artists::Table, Artists::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // Create musics table
        manager
            .create_table(
                Table::create()
                    .table(Musics::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Musics::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Musics::Title).string().not_null())
                    .col(ColumnDef::new(Musics::TitleKey).string().not_null())
                    .col(ColumnDef::new(Musics::ArtistId).integer().not_null())
                    .col(ColumnDef::new(Musics::AlbumId).integer())
                    .col(
                        ColumnDef::new(Musics::Duration)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Musics::TrackNumber).integer())
                    .col(ColumnDef::new(Musics::Genre).string())
                    .col(ColumnDef::new(Musics::UploadId).integer())
                    .col(
                        ColumnDef::new(Musics::PlayCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Musics::CreatedAt).integer().not_null())
                    .col(ColumnDef::new(Musics::UpdatedAt).integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_musics_artist_id")
                            .from(Musics::Table, Musics::ArtistId)
                            .to(Artists::Table, Artists::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_musics_album_id")
                            .from(Musics::Table, Musics::AlbumId)
                            .to(Albums::Table, Albums::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_musics_upload_id")
                            .from(Musics::Table, Musics::UploadId)
                            .to(Uploads::Table, Uploads::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // Create indexes
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_albums_artist_title")
                    .table(Albums::Table)
                    .col(Albums::ArtistId)
                    .col(Albums::TitleKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_musics_artist_title")
                    .table(Musics::Table)
                    .col(Musics::ArtistId)
                    .col(Musics::TitleKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_musics_album_id")
                    .table(Musics::Table)
                    .col(Musics::AlbumId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop tables in reverse order
        manager
            .drop_table(Table::drop().table(Musics::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Albums::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Artists::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Uploads::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Uploads {
    Table,
    Id,
    OwnerId,
    OriginalName,
    StoredPath,
    MimeType,
    Kind,
    Size,
    Sha256,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Artists {
    Table,
    Id,
    Name,
    NameKey,
    Bio,
    Genre,
    ImageUrl,
    OwnerId,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Albums {
    Table,
    Id,
    Title,
    TitleKey,
    ArtistId,
    ReleaseYear,
    Genre,
    CoverUrl,
    TrackCount,
    Duration,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub(crate) enum Musics {
    Table,
    Id,
    Title,
    TitleKey,
    ArtistId,
    AlbumId,
    Duration,
    #[allow(clippy::enum_variant_names)]
    TrackNumber,
    Genre,
    UploadId,
    PlayCount,
    CreatedAt,
    UpdatedAt,
}

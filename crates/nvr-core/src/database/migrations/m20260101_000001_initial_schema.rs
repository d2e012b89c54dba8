use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        self.create_streams_table(manager).await?;
        self.create_segments_table(manager).await?;
        self.create_indexes(manager).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Segments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Streams::Table).to_owned())
            .await?;
        Ok(())
    }
}

impl Migration {
    /// Every backend stores timestamps as RFC3339 strings; keeps the column
    /// type identical across SQLite/Postgres/MySQL without a per-backend
    /// `chrono` feature mismatch.
    fn create_timestamp_column(&self, column: impl IntoIden) -> ColumnDef {
        let mut col = ColumnDef::new(column);
        col.string().not_null();
        col
    }

    async fn create_streams_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Streams::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Streams::Name).string().not_null().primary_key())
                    .col(ColumnDef::new(Streams::Url).string().not_null())
                    .col(ColumnDef::new(Streams::OnvifUsername).string())
                    .col(ColumnDef::new(Streams::OnvifPassword).string())
                    .col(
                        ColumnDef::new(Streams::Enabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Streams::Backchannel)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Streams::SegmentDurationSeconds)
                            .integer()
                            .not_null()
                            .default(60),
                    )
                    .col(
                        ColumnDef::new(Streams::MaxAgeDays)
                            .integer()
                            .not_null()
                            .default(30),
                    )
                    .col(ColumnDef::new(Streams::StorageCapBytes).big_integer())
                    .col(
                        ColumnDef::new(Streams::PtzEnabled)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(self.create_timestamp_column(Streams::CreatedAt))
                    .col(self.create_timestamp_column(Streams::UpdatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_segments_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Segments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Segments::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Segments::Stream).string().not_null())
                    .col(ColumnDef::new(Segments::Path).string().not_null())
                    .col(self.create_timestamp_column(Segments::StartTime))
                    .col(self.create_timestamp_column(Segments::EndTime))
                    .col(ColumnDef::new(Segments::SizeBytes).big_integer().not_null())
                    .col(
                        ColumnDef::new(Segments::HasDetection)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Segments::Protected)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Segments::RetentionOverrideDays).integer())
                    .to_owned(),
            )
            .await
    }

    /// Segment query (spec.md §4.6) filters by stream and overlaps a time
    /// window; the Health/Recording tick loop reads streams by `enabled`.
    async fn create_indexes(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .name("idx_segments_stream_start")
                    .table(Segments::Table)
                    .col(Segments::Stream)
                    .col(Segments::StartTime)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_streams_enabled")
                    .table(Streams::Table)
                    .col(Streams::Enabled)
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum Streams {
    Table,
    Name,
    Url,
    OnvifUsername,
    OnvifPassword,
    Enabled,
    Backchannel,
    SegmentDurationSeconds,
    MaxAgeDays,
    StorageCapBytes,
    PtzEnabled,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Segments {
    Table,
    Id,
    Stream,
    Path,
    StartTime,
    EndTime,
    SizeBytes,
    HasDetection,
    Protected,
    RetentionOverrideDays,
}

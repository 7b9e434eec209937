use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20251001_000001_create_hotels_table::Migration),
            Box::new(m20251001_000002_create_hotel_pictures_table::Migration),
        ]
    }
}

mod m20251001_000001_create_hotels_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20251001_000001_create_hotels_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Hotels::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Hotels::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Hotels::Name).string_len(255).not_null())
                        .col(ColumnDef::new(Hotels::Address1).string_len(255).not_null())
                        .col(ColumnDef::new(Hotels::Address2).string_len(255).null())
                        .col(ColumnDef::new(Hotels::Zipcode).string_len(20).not_null())
                        .col(ColumnDef::new(Hotels::City).string_len(100).not_null())
                        .col(ColumnDef::new(Hotels::Country).string_len(100).not_null())
                        .col(ColumnDef::new(Hotels::Lat).decimal_len(10, 8).not_null())
                        .col(ColumnDef::new(Hotels::Lng).decimal_len(11, 8).not_null())
                        .col(ColumnDef::new(Hotels::Description).text().null())
                        .col(ColumnDef::new(Hotels::MaxCapacity).integer().not_null())
                        .col(
                            ColumnDef::new(Hotels::PricePerNight)
                                .decimal_len(10, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Hotels::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null()
                                .default(Expr::current_timestamp()),
                        )
                        .col(
                            ColumnDef::new(Hotels::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null()
                                .default(Expr::current_timestamp()),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_hotels_created_at")
                        .table(Hotels::Table)
                        .col(Hotels::CreatedAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_hotels_city")
                        .table(Hotels::Table)
                        .col(Hotels::City)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Hotels::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Hotels {
        Table,
        Id,
        Name,
        Address1,
        Address2,
        Zipcode,
        City,
        Country,
        Lat,
        Lng,
        Description,
        MaxCapacity,
        PricePerNight,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20251001_000002_create_hotel_pictures_table {
    use super::m20251001_000001_create_hotels_table::Hotels;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20251001_000002_create_hotel_pictures_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(HotelPictures::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(HotelPictures::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(HotelPictures::HotelId).integer().not_null())
                        .col(
                            ColumnDef::new(HotelPictures::Filepath)
                                .string_len(255)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(HotelPictures::Filesize)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(HotelPictures::Position)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(HotelPictures::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null()
                                .default(Expr::current_timestamp()),
                        )
                        .col(
                            ColumnDef::new(HotelPictures::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null()
                                .default(Expr::current_timestamp()),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_hotel_pictures_hotel_id")
                                .from(HotelPictures::Table, HotelPictures::HotelId)
                                .to(Hotels::Table, Hotels::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            // Backs the "first picture" lookup and ordered gallery reads
            manager
                .create_index(
                    Index::create()
                        .name("idx_hotel_pictures_hotel_position")
                        .table(HotelPictures::Table)
                        .col(HotelPictures::HotelId)
                        .col(HotelPictures::Position)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(HotelPictures::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum HotelPictures {
        Table,
        Id,
        HotelId,
        Filepath,
        Filesize,
        Position,
        CreatedAt,
        UpdatedAt,
    }
}

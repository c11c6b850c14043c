use sea_orm_migration::{prelude::*, schema::*};

use super::m20250301_000001_create_users::User;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Ride::Table)
                    .if_not_exists()
                    .col(uuid(Ride::Id).primary_key())
                    .col(uuid(Ride::DriverId).not_null())
                    .col(string_len(Ride::Origin, 100).not_null())
                    .col(string_len(Ride::Destination, 100).not_null())
                    .col(date(Ride::DepartureDate).not_null())
                    .col(time(Ride::DepartureTime).not_null())
                    .col(integer(Ride::Seats).not_null())
                    .col(decimal_len(Ride::Price, 7, 2).not_null())
                    .col(string_len(Ride::VehicleType, 5).not_null().default("car"))
                    .col(string_len(Ride::License, 100).not_null().default(""))
                    .col(string_len(Ride::Status, 20).not_null().default("OPEN"))
                    .col(
                        timestamp_with_time_zone(Ride::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .check(Expr::col(Ride::Seats).gte(0))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ride_driver")
                            .from(Ride::Table, Ride::DriverId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_ride_status_date")
                    .table(Ride::Table)
                    .col(Ride::Status)
                    .col(Ride::DepartureDate)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Ride::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Ride {
    Table,
    Id,
    DriverId,
    Origin,
    Destination,
    DepartureDate,
    DepartureTime,
    Seats,
    Price,
    VehicleType,
    License,
    Status,
    CreatedAt,
}

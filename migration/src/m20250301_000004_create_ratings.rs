use sea_orm_migration::{prelude::*, schema::*};

use super::m20250301_000003_create_bookings::Booking;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Rating::Table)
                    .if_not_exists()
                    .col(uuid(Rating::Id).primary_key())
                    .col(uuid(Rating::BookingId).not_null().unique_key())
                    .col(integer(Rating::Stars).not_null())
                    .col(text_null(Rating::Comment))
                    .col(
                        timestamp_with_time_zone(Rating::RatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .check(Expr::col(Rating::Stars).between(1, 5))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_rating_booking")
                            .from(Rating::Table, Rating::BookingId)
                            .to(Booking::Table, Booking::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Rating::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Rating {
    Table,
    Id,
    BookingId,
    Stars,
    Comment,
    RatedAt,
}

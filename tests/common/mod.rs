#![allow(dead_code)]

use chrono::{NaiveDate, NaiveTime, Utc};
use sea_orm::{
    prelude::Decimal, ActiveModelTrait, ConnectionTrait, Database, DatabaseConnection, DbBackend,
    EntityTrait, Schema, Set,
};
use uuid::Uuid;

use ride_share_backend::entities::{booking, rating, ride, user};
use ride_share_backend::services::booking::{request, BookingRequest};
use ride_share_backend::services::ride::{create, RideDraft};

/// Fresh in-memory database with every table, created in foreign key order.
pub async fn setup() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("connect to in-memory sqlite");

    let schema = Schema::new(DbBackend::Sqlite);
    let tables = [
        schema.create_table_from_entity(user::Entity),
        schema.create_table_from_entity(ride::Entity),
        schema.create_table_from_entity(booking::Entity),
        schema.create_table_from_entity(rating::Entity),
    ];
    for table in tables {
        db.execute(db.get_database_backend().build(&table))
            .await
            .expect("create table");
    }

    db
}

pub async fn create_user(db: &DatabaseConnection, username: &str) -> user::Model {
    user::ActiveModel {
        id: Set(Uuid::new_v4()),
        username: Set(username.to_string()),
        email: Set(format!("{}@example.com", username)),
        password_hash: Set("not-a-real-hash".to_string()),
        first_name: Set(username.to_string()),
        last_name: Set("Tester".to_string()),
        phone_number: Set(None),
        emergency_email: Set(None),
        total_rating: Set(0.0),
        rating_count: Set(0),
        created_at: Set(Utc::now().into()),
    }
    .insert(db)
    .await
    .expect("insert user")
}

pub fn draft(origin: &str, destination: &str, seats: i32) -> RideDraft {
    RideDraft {
        origin: Some(origin.to_string()),
        destination: Some(destination.to_string()),
        departure_date: NaiveDate::from_ymd_opt(2026, 11, 2),
        departure_time: NaiveTime::from_hms_opt(8, 30, 0),
        seats: Some(seats),
        price: Some(Decimal::new(25000, 2)),
        vehicle_type: None,
        license: Some("MH12AB1234".to_string()),
    }
}

pub async fn create_ride(db: &DatabaseConnection, driver: &user::Model, seats: i32) -> ride::Model {
    create(db, driver.id, draft("Pune", "Mumbai", seats))
        .await
        .expect("create ride")
}

pub async fn book(
    db: &DatabaseConnection,
    passenger: &user::Model,
    ride: &ride::Model,
    count: i32,
) -> booking::Model {
    request(
        db,
        passenger.id,
        BookingRequest {
            ride_id: ride.id,
            passenger_count: count,
            pickup_note: None,
            payment_method: booking::PaymentMethod::Cash,
        },
    )
    .await
    .expect("request booking")
    .into_booking()
}

pub async fn reload_ride(db: &DatabaseConnection, id: Uuid) -> ride::Model {
    ride::Entity::find_by_id(id)
        .one(db)
        .await
        .expect("query ride")
        .expect("ride exists")
}

pub async fn reload_booking(db: &DatabaseConnection, id: Uuid) -> Option<booking::Model> {
    booking::Entity::find_by_id(id)
        .one(db)
        .await
        .expect("query booking")
}

pub async fn reload_user(db: &DatabaseConnection, id: Uuid) -> user::Model {
    user::Entity::find_by_id(id)
        .one(db)
        .await
        .expect("query user")
        .expect("user exists")
}

pub mod auth;
pub mod bookings;
pub mod otp;
pub mod profile;
pub mod rides;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use sea_orm::prelude::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::entities::booking::{self, BookingStatus, PaymentMethod};
use crate::entities::ride::{self, RideStatus, VehicleType};
use crate::entities::user;

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Public view of another user. Never carries contact details.
#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub total_rating: f64,
    pub rating_count: i32,
}

impl From<&user::Model> for UserSummary {
    fn from(u: &user::Model) -> Self {
        Self {
            id: u.id,
            username: u.username.clone(),
            full_name: u.full_name(),
            total_rating: u.total_rating,
            rating_count: u.rating_count,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RideResponse {
    pub id: Uuid,
    pub origin: String,
    pub destination: String,
    pub departure_date: NaiveDate,
    pub departure_time: NaiveTime,
    pub seats: i32,
    pub price: Decimal,
    pub vehicle_type: VehicleType,
    pub license: String,
    pub status: RideStatus,
    pub created_at: DateTime<FixedOffset>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<UserSummary>,
}

impl RideResponse {
    pub fn new(ride: ride::Model, driver: Option<&user::Model>) -> Self {
        Self {
            id: ride.id,
            origin: ride.origin,
            destination: ride.destination,
            departure_date: ride.departure_date,
            departure_time: ride.departure_time,
            seats: ride.seats,
            price: ride.price,
            vehicle_type: ride.vehicle_type,
            license: ride.license,
            status: ride.status,
            created_at: ride.created_at,
            driver: driver.map(UserSummary::from),
        }
    }
}

impl From<ride::Model> for RideResponse {
    fn from(ride: ride::Model) -> Self {
        Self::new(ride, None)
    }
}

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub id: Uuid,
    pub ride_id: Uuid,
    pub booker_id: Uuid,
    pub passenger_count: i32,
    pub pickup_note: Option<String>,
    pub payment_method: PaymentMethod,
    pub status: BookingStatus,
    pub created_at: DateTime<FixedOffset>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booker: Option<UserSummary>,
}

impl BookingResponse {
    pub fn new(booking: booking::Model, booker: Option<&user::Model>) -> Self {
        Self {
            id: booking.id,
            ride_id: booking.ride_id,
            booker_id: booking.booker_id,
            passenger_count: booking.passenger_count,
            pickup_note: booking.pickup_note,
            payment_method: booking.payment_method,
            status: booking.status,
            created_at: booking.created_at,
            booker: booker.map(UserSummary::from),
        }
    }
}

impl From<booking::Model> for BookingResponse {
    fn from(booking: booking::Model) -> Self {
        Self::new(booking, None)
    }
}

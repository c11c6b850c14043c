use std::collections::HashMap;

use chrono::{NaiveDate, NaiveTime, Utc};
use sea_orm::{
    sea_query::Expr,
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use sea_orm::prelude::Decimal;
use uuid::Uuid;

use crate::entities::booking::{self, BookingStatus};
use crate::entities::rating;
use crate::entities::ride::{self, RideStatus, VehicleType};
use crate::entities::user;
use crate::error::{AppError, AppResult};
use crate::utils::search::contains_ci;

/// What happens to a FULL ride when cancelled seats are handed back to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatRestore {
    /// Seats go up, status stays FULL until the driver acts.
    KeepStatus,
    /// A FULL ride with seats again becomes OPEN.
    Reopen,
}

/// Ride fields as submitted. Anything missing is a validation error.
#[derive(Debug, Clone, Default)]
pub struct RideDraft {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub departure_date: Option<NaiveDate>,
    pub departure_time: Option<NaiveTime>,
    pub seats: Option<i32>,
    pub price: Option<Decimal>,
    pub vehicle_type: Option<VehicleType>,
    pub license: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewRide {
    pub origin: String,
    pub destination: String,
    pub departure_date: NaiveDate,
    pub departure_time: NaiveTime,
    pub seats: i32,
    pub price: Decimal,
    pub vehicle_type: VehicleType,
    pub license: String,
}

impl RideDraft {
    pub fn validate(self) -> AppResult<NewRide> {
        let origin = required_text(self.origin, "origin")?;
        let destination = required_text(self.destination, "destination")?;
        let departure_date = self
            .departure_date
            .ok_or_else(|| missing("departure_date"))?;
        let departure_time = self
            .departure_time
            .ok_or_else(|| missing("departure_time"))?;
        let seats = self.seats.ok_or_else(|| missing("seats"))?;
        let price = self.price.ok_or_else(|| missing("price"))?;

        if seats < 1 {
            return Err(AppError::Validation(
                "A ride must offer at least 1 seat".to_string(),
            ));
        }
        if price.is_sign_negative() {
            return Err(AppError::Validation("Price cannot be negative".to_string()));
        }

        Ok(NewRide {
            origin,
            destination,
            departure_date,
            departure_time,
            seats,
            price,
            vehicle_type: self.vehicle_type.unwrap_or(VehicleType::Car),
            license: self.license.map(|l| l.trim().to_string()).unwrap_or_default(),
        })
    }
}

fn missing(field: &str) -> AppError {
    AppError::Validation(format!("{} is required", field))
}

fn required_text(value: Option<String>, field: &str) -> AppResult<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(missing(field)),
    }
}

/// Post a new ride. It starts OPEN with all offered seats available.
pub async fn create(
    db: &DatabaseConnection,
    driver_id: Uuid,
    draft: RideDraft,
) -> AppResult<ride::Model> {
    let new_ride = draft.validate()?;

    user::Entity::find_by_id(driver_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let ride = ride::ActiveModel {
        id: Set(Uuid::new_v4()),
        driver_id: Set(driver_id),
        origin: Set(new_ride.origin),
        destination: Set(new_ride.destination),
        departure_date: Set(new_ride.departure_date),
        departure_time: Set(new_ride.departure_time),
        seats: Set(new_ride.seats),
        price: Set(new_ride.price),
        vehicle_type: Set(new_ride.vehicle_type),
        license: Set(new_ride.license),
        status: Set(RideStatus::Open),
        created_at: Set(Utc::now().into()),
    }
    .insert(db)
    .await?;

    tracing::info!(ride_id = %ride.id, driver_id = %driver_id, seats = ride.seats, "Ride created");
    Ok(ride)
}

#[derive(Debug, Clone, Default)]
pub struct RideSearch {
    /// Case-insensitive substring of the origin.
    pub origin: Option<String>,
    /// Case-insensitive substring of the destination.
    pub destination: Option<String>,
    pub date: Option<NaiveDate>,
    /// Only rides with at least this many seats left.
    pub min_seats: Option<i32>,
}

/// OPEN rides matching every given filter, with their drivers.
pub async fn search(
    db: &DatabaseConnection,
    filter: &RideSearch,
) -> AppResult<Vec<(ride::Model, Option<user::Model>)>> {
    let mut query = ride::Entity::find().filter(ride::Column::Status.eq(RideStatus::Open));

    if let Some(origin) = non_empty(&filter.origin) {
        query = query.filter(contains_ci((ride::Entity, ride::Column::Origin), origin));
    }
    if let Some(destination) = non_empty(&filter.destination) {
        query = query.filter(contains_ci((ride::Entity, ride::Column::Destination), destination));
    }
    if let Some(date) = filter.date {
        query = query.filter(ride::Column::DepartureDate.eq(date));
    }
    if let Some(min_seats) = filter.min_seats {
        query = query.filter(ride::Column::Seats.gte(min_seats));
    }

    let rides = query
        .order_by_asc(ride::Column::DepartureDate)
        .order_by_asc(ride::Column::DepartureTime)
        .find_also_related(user::Entity)
        .all(db)
        .await?;

    Ok(rides)
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// A ride with its driver, regardless of status.
pub async fn details(
    db: &DatabaseConnection,
    ride_id: Uuid,
) -> AppResult<(ride::Model, Option<user::Model>)> {
    ride::Entity::find_by_id(ride_id)
        .find_also_related(user::Entity)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Ride not found".to_string()))
}

#[derive(Debug, Clone)]
pub struct OwnRide {
    pub ride: ride::Model,
    /// Bookings the driver has accepted, with their bookers.
    pub accepted: Vec<(booking::Model, Option<user::Model>)>,
}

/// Every ride the driver has posted, newest first.
pub async fn list_for_driver(db: &DatabaseConnection, driver_id: Uuid) -> AppResult<Vec<OwnRide>> {
    let rides = ride::Entity::find()
        .filter(ride::Column::DriverId.eq(driver_id))
        .order_by_desc(ride::Column::CreatedAt)
        .all(db)
        .await?;

    let mut result = Vec::with_capacity(rides.len());
    for ride in rides {
        let accepted = booking::Entity::find()
            .filter(booking::Column::RideId.eq(ride.id))
            .filter(booking::Column::Status.eq(BookingStatus::Accepted))
            .find_also_related(user::Entity)
            .all(db)
            .await?;
        result.push(OwnRide { ride, accepted });
    }

    Ok(result)
}

/// Load a ride under a row lock. Use inside a transaction.
pub async fn find_locked<C>(conn: &C, ride_id: Uuid) -> AppResult<ride::Model>
where
    C: ConnectionTrait,
{
    ride::Entity::find_by_id(ride_id)
        .lock_exclusive()
        .one(conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Ride not found".to_string()))
}

fn ensure_owner(ride: &ride::Model, actor_id: Uuid) -> AppResult<()> {
    if ride.driver_id != actor_id {
        return Err(AppError::Forbidden(
            "Only the driver who posted this ride can do that".to_string(),
        ));
    }
    Ok(())
}

/// Take `count` seats from a locked ride. A ride left with no seats becomes FULL.
pub async fn take_seats<C>(conn: &C, ride: ride::Model, count: i32) -> AppResult<ride::Model>
where
    C: ConnectionTrait,
{
    if count < 1 {
        return Err(AppError::Validation(
            "Seat count must be at least 1".to_string(),
        ));
    }
    if ride.seats < count {
        return Err(AppError::Capacity(format!(
            "Only {} seats available",
            ride.seats
        )));
    }

    let remaining = ride.seats - count;
    let mut active: ride::ActiveModel = ride.into();
    active.seats = Set(remaining);
    if remaining == 0 {
        active.status = Set(RideStatus::Full);
    }

    Ok(active.update(conn).await?)
}

/// Hand `count` seats back to a locked ride.
pub async fn restore_seats<C>(
    conn: &C,
    ride: ride::Model,
    count: i32,
    policy: SeatRestore,
) -> AppResult<ride::Model>
where
    C: ConnectionTrait,
{
    let seats = ride.seats + count;
    let reopen = policy == SeatRestore::Reopen && ride.status == RideStatus::Full && seats > 0;

    let mut active: ride::ActiveModel = ride.into();
    active.seats = Set(seats);
    if reopen {
        active.status = Set(RideStatus::Open);
    }

    Ok(active.update(conn).await?)
}

/// Move the ride to ONGOING and every accepted booking on it to IN_PROGRESS.
///
/// Returns the updated ride and how many bookings were promoted.
pub async fn start_journey(
    db: &DatabaseConnection,
    driver_id: Uuid,
    ride_id: Uuid,
) -> AppResult<(ride::Model, u64)> {
    let txn = db.begin().await?;

    let ride = find_locked(&txn, ride_id).await?;
    ensure_owner(&ride, driver_id)?;

    match ride.status {
        RideStatus::Ongoing => {
            return Err(AppError::StateConflict(
                "Ride is already in progress".to_string(),
            ));
        }
        RideStatus::Completed | RideStatus::Closed => {
            return Err(AppError::StateConflict(format!(
                "A {:?} ride cannot be started",
                ride.status
            )));
        }
        RideStatus::Open | RideStatus::Full => {}
    }

    let mut active: ride::ActiveModel = ride.into();
    active.status = Set(RideStatus::Ongoing);
    let ride = active.update(&txn).await?;

    let promoted = booking::Entity::update_many()
        .col_expr(booking::Column::Status, Expr::value(BookingStatus::InProgress))
        .filter(booking::Column::RideId.eq(ride_id))
        .filter(booking::Column::Status.eq(BookingStatus::Accepted))
        .exec(&txn)
        .await?
        .rows_affected;

    txn.commit().await?;

    tracing::info!(ride_id = %ride_id, bookings = promoted, "Journey started");
    Ok((ride, promoted))
}

/// Move an ONGOING ride to COMPLETED and its in-progress bookings with it.
pub async fn end_journey(
    db: &DatabaseConnection,
    driver_id: Uuid,
    ride_id: Uuid,
) -> AppResult<(ride::Model, u64)> {
    let txn = db.begin().await?;

    let ride = find_locked(&txn, ride_id).await?;
    ensure_owner(&ride, driver_id)?;

    if ride.status != RideStatus::Ongoing {
        return Err(AppError::StateConflict(
            "Ride has not started yet".to_string(),
        ));
    }

    let mut active: ride::ActiveModel = ride.into();
    active.status = Set(RideStatus::Completed);
    let ride = active.update(&txn).await?;

    let completed = booking::Entity::update_many()
        .col_expr(booking::Column::Status, Expr::value(BookingStatus::Completed))
        .filter(booking::Column::RideId.eq(ride_id))
        .filter(booking::Column::Status.eq(BookingStatus::InProgress))
        .exec(&txn)
        .await?
        .rows_affected;

    txn.commit().await?;

    tracing::info!(ride_id = %ride_id, bookings = completed, "Journey completed");
    Ok((ride, completed))
}

/// Cancel a ride that has not started. Live bookings become
/// CANCELLED_BY_DRIVER and accepted seats are returned.
pub async fn close(
    db: &DatabaseConnection,
    driver_id: Uuid,
    ride_id: Uuid,
) -> AppResult<ride::Model> {
    let txn = db.begin().await?;

    let ride = find_locked(&txn, ride_id).await?;
    ensure_owner(&ride, driver_id)?;

    if !ride.status.is_bookable() {
        return Err(AppError::StateConflict(format!(
            "A {:?} ride cannot be closed",
            ride.status
        )));
    }

    let live = booking::Entity::find()
        .filter(booking::Column::RideId.eq(ride_id))
        .filter(booking::Column::Status.is_in([BookingStatus::Pending, BookingStatus::Accepted]))
        .all(&txn)
        .await?;

    let returned: i32 = live
        .iter()
        .filter(|b| b.status.holds_seats())
        .map(|b| b.passenger_count)
        .sum();

    for b in live {
        let mut active: booking::ActiveModel = b.into();
        active.status = Set(BookingStatus::CancelledByDriver);
        active.update(&txn).await?;
    }

    let seats = ride.seats + returned;
    let mut active: ride::ActiveModel = ride.into();
    active.seats = Set(seats);
    active.status = Set(RideStatus::Closed);
    let ride = active.update(&txn).await?;

    txn.commit().await?;

    tracing::info!(ride_id = %ride_id, "Ride closed");
    Ok(ride)
}

/// Delete a ride with its bookings and their ratings.
pub async fn delete(db: &DatabaseConnection, driver_id: Uuid, ride_id: Uuid) -> AppResult<()> {
    let txn = db.begin().await?;

    let ride = find_locked(&txn, ride_id).await?;
    ensure_owner(&ride, driver_id)?;

    let booking_ids: Vec<Uuid> = booking::Entity::find()
        .select_only()
        .column(booking::Column::Id)
        .filter(booking::Column::RideId.eq(ride_id))
        .into_tuple()
        .all(&txn)
        .await?;

    if !booking_ids.is_empty() {
        rating::Entity::delete_many()
            .filter(rating::Column::BookingId.is_in(booking_ids))
            .exec(&txn)
            .await?;
    }

    booking::Entity::delete_many()
        .filter(booking::Column::RideId.eq(ride_id))
        .exec(&txn)
        .await?;

    ride::Entity::delete_by_id(ride_id).exec(&txn).await?;

    txn.commit().await?;

    tracing::info!(ride_id = %ride_id, driver_id = %driver_id, "Ride deleted");
    Ok(())
}

/// All booking requests on a ride, for its driver.
pub async fn requests(
    db: &DatabaseConnection,
    driver_id: Uuid,
    ride_id: Uuid,
) -> AppResult<Vec<(booking::Model, Option<user::Model>)>> {
    let ride = ride::Entity::find_by_id(ride_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Ride not found".to_string()))?;
    ensure_owner(&ride, driver_id)?;

    Ok(booking::Entity::find()
        .filter(booking::Column::RideId.eq(ride_id))
        .order_by_asc(booking::Column::CreatedAt)
        .find_also_related(user::Entity)
        .all(db)
        .await?)
}

#[derive(Debug, Clone)]
pub struct RideComment {
    pub rating: rating::Model,
    pub rater: Option<user::Model>,
}

/// Ratings left on a ride's bookings, for its driver.
pub async fn comments(
    db: &DatabaseConnection,
    driver_id: Uuid,
    ride_id: Uuid,
) -> AppResult<Vec<RideComment>> {
    let ride = ride::Entity::find_by_id(ride_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Ride not found".to_string()))?;
    ensure_owner(&ride, driver_id)?;

    let rated = booking::Entity::find()
        .filter(booking::Column::RideId.eq(ride_id))
        .find_also_related(rating::Entity)
        .all(db)
        .await?;

    let booker_ids: Vec<Uuid> = rated.iter().map(|(b, _)| b.booker_id).collect();
    let raters = users_by_id(db, booker_ids).await?;

    Ok(rated
        .into_iter()
        .filter_map(|(b, r)| {
            r.map(|rating| RideComment {
                rating,
                rater: raters.get(&b.booker_id).cloned(),
            })
        })
        .collect())
}

pub(crate) async fn users_by_id<C>(conn: &C, ids: Vec<Uuid>) -> AppResult<HashMap<Uuid, user::Model>>
where
    C: ConnectionTrait,
{
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    Ok(user::Entity::find()
        .filter(user::Column::Id.is_in(ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect())
}

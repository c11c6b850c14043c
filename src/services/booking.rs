use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::entities::booking::{self, BookingStatus, PaymentMethod};
use crate::entities::rating;
use crate::entities::ride;
use crate::entities::user;
use crate::error::{AppError, AppResult};
use crate::services::rating::{fold_into_driver, validate_stars};
use crate::services::ride::{find_locked, restore_seats, take_seats, users_by_id, SeatRestore};

#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub ride_id: Uuid,
    pub passenger_count: i32,
    pub pickup_note: Option<String>,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Clone)]
pub enum BookingOutcome {
    /// First request from this passenger on this ride.
    Created(booking::Model),
    /// Seats added to the passenger's existing booking.
    Merged(booking::Model),
}

impl BookingOutcome {
    pub fn booking(&self) -> &booking::Model {
        match self {
            BookingOutcome::Created(b) | BookingOutcome::Merged(b) => b,
        }
    }

    pub fn into_booking(self) -> booking::Model {
        match self {
            BookingOutcome::Created(b) | BookingOutcome::Merged(b) => b,
        }
    }
}

/// Join pickup notes line by line, ignoring blanks.
pub fn append_note(existing: Option<String>, new: Option<&str>) -> Option<String> {
    let new = new.map(str::trim).filter(|n| !n.is_empty());
    match (existing.filter(|e| !e.trim().is_empty()), new) {
        (Some(existing), Some(new)) => Some(format!("{}\n{}", existing, new)),
        (Some(existing), None) => Some(existing),
        (None, Some(new)) => Some(new.to_string()),
        (None, None) => None,
    }
}

/// Request seats on a ride. A passenger holds at most one booking per ride:
/// a repeat request adds its seats and note to the existing booking.
pub async fn request(
    db: &DatabaseConnection,
    booker_id: Uuid,
    req: BookingRequest,
) -> AppResult<BookingOutcome> {
    if req.passenger_count < 1 {
        return Err(AppError::Validation(
            "Must book at least 1 seat".to_string(),
        ));
    }

    let txn = db.begin().await?;

    let ride = find_locked(&txn, req.ride_id).await?;

    if ride.driver_id == booker_id {
        return Err(AppError::Forbidden(
            "You cannot book your own ride".to_string(),
        ));
    }
    if !ride.status.is_bookable() {
        return Err(AppError::StateConflict(format!(
            "Ride is {:?} and no longer takes bookings",
            ride.status
        )));
    }
    if ride.seats < req.passenger_count {
        return Err(AppError::Capacity("Not enough seats available".to_string()));
    }

    let existing = booking::Entity::find()
        .filter(booking::Column::BookerId.eq(booker_id))
        .filter(booking::Column::RideId.eq(ride.id))
        .lock_exclusive()
        .one(&txn)
        .await?;

    let outcome = match existing {
        None => {
            let created = booking::ActiveModel {
                id: Set(Uuid::new_v4()),
                ride_id: Set(ride.id),
                booker_id: Set(booker_id),
                passenger_count: Set(req.passenger_count),
                pickup_note: Set(append_note(None, req.pickup_note.as_deref())),
                payment_method: Set(req.payment_method),
                status: Set(BookingStatus::Pending),
                created_at: Set(Utc::now().into()),
            }
            .insert(&txn)
            .await?;

            tracing::info!(booking_id = %created.id, ride_id = %ride.id, seats = created.passenger_count, "Booking requested");
            BookingOutcome::Created(created)
        }
        Some(existing) => {
            let total = existing.passenger_count + req.passenger_count;

            match existing.status {
                BookingStatus::Pending => {
                    if total > ride.seats {
                        return Err(AppError::Capacity(
                            "Not enough seats available after update".to_string(),
                        ));
                    }
                }
                // The driver already said yes to this passenger; the extra seats
                // come off the ride now. `ride.seats >= passenger_count` was checked above.
                BookingStatus::Accepted => {
                    take_seats(&txn, ride, req.passenger_count).await?;
                }
                other => {
                    return Err(AppError::StateConflict(format!(
                        "A {:?} booking can no longer be changed",
                        other
                    )));
                }
            }

            let note = append_note(existing.pickup_note.clone(), req.pickup_note.as_deref());
            let mut active: booking::ActiveModel = existing.into();
            active.passenger_count = Set(total);
            active.pickup_note = Set(note);
            active.payment_method = Set(req.payment_method);
            let merged = active.update(&txn).await?;

            tracing::info!(booking_id = %merged.id, seats = merged.passenger_count, "Booking merged");
            BookingOutcome::Merged(merged)
        }
    };

    txn.commit().await?;
    Ok(outcome)
}

/// Load a booking and its ride, both locked.
async fn find_with_ride_locked<C>(
    conn: &C,
    booking_id: Uuid,
) -> AppResult<(booking::Model, ride::Model)>
where
    C: sea_orm::ConnectionTrait,
{
    let booking = booking::Entity::find_by_id(booking_id)
        .lock_exclusive()
        .one(conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;
    let ride = find_locked(conn, booking.ride_id).await?;
    Ok((booking, ride))
}

fn ensure_ride_owner(ride: &ride::Model, actor_id: Uuid) -> AppResult<()> {
    if ride.driver_id != actor_id {
        return Err(AppError::Forbidden("Unauthorized action".to_string()));
    }
    Ok(())
}

fn ensure_pending(booking: &booking::Model) -> AppResult<()> {
    if booking.status != BookingStatus::Pending {
        return Err(AppError::StateConflict(format!(
            "Booking is already {:?}",
            booking.status
        )));
    }
    Ok(())
}

/// Driver accepts a pending request; its seats come off the ride.
pub async fn accept(
    db: &DatabaseConnection,
    driver_id: Uuid,
    booking_id: Uuid,
) -> AppResult<(booking::Model, ride::Model)> {
    let txn = db.begin().await?;

    let (booking, ride) = find_with_ride_locked(&txn, booking_id).await?;
    ensure_ride_owner(&ride, driver_id)?;
    ensure_pending(&booking)?;

    if !ride.status.is_bookable() {
        return Err(AppError::StateConflict(format!(
            "Ride is {:?} and no longer takes bookings",
            ride.status
        )));
    }

    let ride = take_seats(&txn, ride, booking.passenger_count).await?;

    let mut active: booking::ActiveModel = booking.into();
    active.status = Set(BookingStatus::Accepted);
    let booking = active.update(&txn).await?;

    txn.commit().await?;

    tracing::info!(
        booking_id = %booking_id,
        ride_id = %ride.id,
        seats_left = ride.seats,
        "Booking accepted"
    );
    Ok((booking, ride))
}

/// Driver turns down a pending request. Seats are untouched.
pub async fn reject(
    db: &DatabaseConnection,
    driver_id: Uuid,
    booking_id: Uuid,
) -> AppResult<booking::Model> {
    let txn = db.begin().await?;

    let (booking, ride) = find_with_ride_locked(&txn, booking_id).await?;
    ensure_ride_owner(&ride, driver_id)?;
    ensure_pending(&booking)?;

    let mut active: booking::ActiveModel = booking.into();
    active.status = Set(BookingStatus::Rejected);
    let booking = active.update(&txn).await?;

    txn.commit().await?;

    tracing::info!(booking_id = %booking_id, "Booking rejected");
    Ok(booking)
}

/// Cancel a booking before the ride starts, keeping the record.
///
/// The booker cancels as passenger, the ride's driver as driver. Accepted
/// seats go back to the ride.
pub async fn cancel(
    db: &DatabaseConnection,
    actor_id: Uuid,
    booking_id: Uuid,
    policy: SeatRestore,
) -> AppResult<booking::Model> {
    let txn = db.begin().await?;

    let (booking, ride) = find_with_ride_locked(&txn, booking_id).await?;

    let cancelled_status = if booking.booker_id == actor_id {
        BookingStatus::CancelledByPassenger
    } else if ride.driver_id == actor_id {
        BookingStatus::CancelledByDriver
    } else {
        return Err(AppError::Forbidden(
            "You can only cancel your own bookings or bookings on your rides".to_string(),
        ));
    };

    if !matches!(booking.status, BookingStatus::Pending | BookingStatus::Accepted) {
        return Err(AppError::StateConflict(format!(
            "A {:?} booking cannot be cancelled",
            booking.status
        )));
    }
    if booking.status.holds_seats() {
        restore_seats(&txn, ride, booking.passenger_count, policy).await?;
    }

    let mut active: booking::ActiveModel = booking.into();
    active.status = Set(cancelled_status);
    let booking = active.update(&txn).await?;

    txn.commit().await?;

    tracing::info!(booking_id = %booking_id, status = ?booking.status, "Booking cancelled");
    Ok(booking)
}

/// Passenger removes their booking. Accepted seats go back to the ride.
pub async fn delete(
    db: &DatabaseConnection,
    booker_id: Uuid,
    booking_id: Uuid,
    policy: SeatRestore,
) -> AppResult<()> {
    let txn = db.begin().await?;

    let (booking, ride) = find_with_ride_locked(&txn, booking_id).await?;

    if booking.booker_id != booker_id {
        return Err(AppError::Forbidden(
            "You can only delete your own bookings".to_string(),
        ));
    }

    if booking.status == BookingStatus::Accepted {
        restore_seats(&txn, ride, booking.passenger_count, policy).await?;
    }

    rating::Entity::delete_many()
        .filter(rating::Column::BookingId.eq(booking_id))
        .exec(&txn)
        .await?;
    booking::Entity::delete_by_id(booking_id).exec(&txn).await?;

    txn.commit().await?;

    tracing::info!(booking_id = %booking_id, "Booking deleted");
    Ok(())
}

#[derive(Debug, Clone)]
pub struct RatingOutcome {
    pub rating: rating::Model,
    /// False when an earlier rating for the booking was replaced.
    pub created: bool,
    pub driver: user::Model,
}

/// Rate a completed booking, or replace the passenger's earlier rating.
/// The ride's driver aggregate is updated in the same transaction.
pub async fn rate(
    db: &DatabaseConnection,
    booker_id: Uuid,
    booking_id: Uuid,
    stars: i32,
    comment: Option<String>,
) -> AppResult<RatingOutcome> {
    validate_stars(stars)?;
    let comment = comment.map(|c| c.trim().to_string()).filter(|c| !c.is_empty());

    let txn = db.begin().await?;

    let booking = booking::Entity::find_by_id(booking_id)
        .lock_exclusive()
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

    if booking.booker_id != booker_id {
        return Err(AppError::Forbidden(
            "You can only rate your own bookings".to_string(),
        ));
    }
    if booking.status != BookingStatus::Completed {
        return Err(AppError::StateConflict(
            "You can only rate completed rides".to_string(),
        ));
    }

    let ride = ride::Entity::find_by_id(booking.ride_id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Ride not found".to_string()))?;

    let existing = rating::Entity::find()
        .filter(rating::Column::BookingId.eq(booking_id))
        .lock_exclusive()
        .one(&txn)
        .await?;

    let (saved, old_stars) = match existing {
        Some(existing) => {
            let old = existing.stars;
            let mut active: rating::ActiveModel = existing.into();
            active.stars = Set(stars);
            active.comment = Set(comment);
            (active.update(&txn).await?, Some(old))
        }
        None => {
            let created = rating::ActiveModel {
                id: Set(Uuid::new_v4()),
                booking_id: Set(booking_id),
                stars: Set(stars),
                comment: Set(comment),
                rated_at: Set(Utc::now().into()),
            }
            .insert(&txn)
            .await?;
            (created, None)
        }
    };

    let driver = fold_into_driver(&txn, ride.driver_id, stars, old_stars).await?;

    txn.commit().await?;

    tracing::info!(booking_id = %booking_id, stars, replaced = old_stars.is_some(), "Ride rated");
    Ok(RatingOutcome {
        rating: saved,
        created: old_stars.is_none(),
        driver,
    })
}

#[derive(Debug, Clone)]
pub struct PassengerBooking {
    pub booking: booking::Model,
    pub ride: ride::Model,
    pub driver: Option<user::Model>,
}

/// The passenger's bookings with their rides and drivers.
pub async fn list_for_passenger(
    db: &DatabaseConnection,
    booker_id: Uuid,
) -> AppResult<Vec<PassengerBooking>> {
    let bookings = booking::Entity::find()
        .filter(booking::Column::BookerId.eq(booker_id))
        .order_by_desc(booking::Column::CreatedAt)
        .find_also_related(ride::Entity)
        .all(db)
        .await?;

    let driver_ids = bookings
        .iter()
        .filter_map(|(_, r)| r.as_ref().map(|r| r.driver_id))
        .collect();
    let drivers = users_by_id(db, driver_ids).await?;

    Ok(bookings
        .into_iter()
        .filter_map(|(booking, ride)| {
            let ride = ride?;
            let driver = drivers.get(&ride.driver_id).cloned();
            Some(PassengerBooking {
                booking,
                ride,
                driver,
            })
        })
        .collect())
}

/// The booker a driver may send a ride confirmation code to: someone holding
/// an accepted or in-progress booking on one of the driver's rides.
pub async fn confirmation_recipient(
    db: &DatabaseConnection,
    driver_id: Uuid,
    booker_id: Uuid,
) -> AppResult<user::Model> {
    let booker = user::Entity::find_by_id(booker_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Booker not found".to_string()))?;

    let live = booking::Entity::find()
        .inner_join(ride::Entity)
        .filter(booking::Column::BookerId.eq(booker_id))
        .filter(ride::Column::DriverId.eq(driver_id))
        .filter(booking::Column::Status.is_in([BookingStatus::Accepted, BookingStatus::InProgress]))
        .one(db)
        .await?;

    if live.is_none() {
        return Err(AppError::Forbidden(
            "This passenger has no accepted booking on your rides".to_string(),
        ));
    }

    Ok(booker)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_note_joins_with_newline() {
        assert_eq!(
            append_note(Some("gate 2".to_string()), Some("  blue bag ")),
            Some("gate 2\nblue bag".to_string())
        );
    }

    #[test]
    fn test_append_note_skips_blank() {
        assert_eq!(
            append_note(Some("gate 2".to_string()), Some("   ")),
            Some("gate 2".to_string())
        );
        assert_eq!(append_note(None, Some("")), None);
        assert_eq!(append_note(Some(String::new()), Some("x")), Some("x".to_string()));
    }
}

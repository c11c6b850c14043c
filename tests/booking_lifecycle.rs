mod common;

use ride_share_backend::entities::booking::{BookingStatus, PaymentMethod};
use ride_share_backend::entities::ride::RideStatus;
use ride_share_backend::error::AppError;
use ride_share_backend::services::booking::{self, BookingOutcome, BookingRequest};
use ride_share_backend::services::ride::SeatRestore;

use common::{book, create_ride, create_user, reload_booking, reload_ride, setup};

#[tokio::test]
async fn accept_to_zero_seats_marks_ride_full_and_delete_restores_seats() {
    let db = setup().await;
    let driver = create_user(&db, "driver").await;
    let passenger = create_user(&db, "alice").await;
    let ride = create_ride(&db, &driver, 2).await;

    let pending = book(&db, &passenger, &ride, 2).await;
    assert_eq!(pending.status, BookingStatus::Pending);
    assert_eq!(reload_ride(&db, ride.id).await.seats, 2);

    let (accepted, ride_after) = booking::accept(&db, driver.id, pending.id).await.unwrap();
    assert_eq!(accepted.status, BookingStatus::Accepted);
    assert_eq!(ride_after.seats, 0);
    assert_eq!(ride_after.status, RideStatus::Full);

    booking::delete(&db, passenger.id, pending.id, SeatRestore::KeepStatus)
        .await
        .unwrap();

    let ride_after = reload_ride(&db, ride.id).await;
    assert_eq!(ride_after.seats, 2);
    assert_eq!(ride_after.status, RideStatus::Full);
    assert!(reload_booking(&db, pending.id).await.is_none());
}

#[tokio::test]
async fn passenger_cancel_keeps_record_and_restores_seats() {
    let db = setup().await;
    let driver = create_user(&db, "driver").await;
    let passenger = create_user(&db, "alice").await;
    let ride = create_ride(&db, &driver, 2).await;

    let b = book(&db, &passenger, &ride, 2).await;
    booking::accept(&db, driver.id, b.id).await.unwrap();

    let cancelled = booking::cancel(&db, passenger.id, b.id, SeatRestore::KeepStatus)
        .await
        .unwrap();
    assert_eq!(cancelled.status, BookingStatus::CancelledByPassenger);

    let ride_after = reload_ride(&db, ride.id).await;
    assert_eq!(ride_after.seats, 2);
    assert_eq!(ride_after.status, RideStatus::Full);
}

#[tokio::test]
async fn reopen_policy_returns_full_ride_to_open() {
    let db = setup().await;
    let driver = create_user(&db, "driver").await;
    let passenger = create_user(&db, "alice").await;
    let ride = create_ride(&db, &driver, 2).await;

    let b = book(&db, &passenger, &ride, 2).await;
    booking::accept(&db, driver.id, b.id).await.unwrap();

    booking::cancel(&db, passenger.id, b.id, SeatRestore::Reopen)
        .await
        .unwrap();

    let ride_after = reload_ride(&db, ride.id).await;
    assert_eq!(ride_after.seats, 2);
    assert_eq!(ride_after.status, RideStatus::Open);
}

#[tokio::test]
async fn driver_cancel_marks_booking_cancelled_by_driver() {
    let db = setup().await;
    let driver = create_user(&db, "driver").await;
    let passenger = create_user(&db, "alice").await;
    let ride = create_ride(&db, &driver, 3).await;

    let b = book(&db, &passenger, &ride, 1).await;
    booking::accept(&db, driver.id, b.id).await.unwrap();

    let cancelled = booking::cancel(&db, driver.id, b.id, SeatRestore::KeepStatus)
        .await
        .unwrap();
    assert_eq!(cancelled.status, BookingStatus::CancelledByDriver);
    assert_eq!(reload_ride(&db, ride.id).await.seats, 3);
}

#[tokio::test]
async fn cancel_by_stranger_is_forbidden() {
    let db = setup().await;
    let driver = create_user(&db, "driver").await;
    let passenger = create_user(&db, "alice").await;
    let stranger = create_user(&db, "mallory").await;
    let ride = create_ride(&db, &driver, 3).await;
    let b = book(&db, &passenger, &ride, 1).await;

    let err = booking::cancel(&db, stranger.id, b.id, SeatRestore::KeepStatus)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
    assert_eq!(
        reload_booking(&db, b.id).await.unwrap().status,
        BookingStatus::Pending
    );
}

#[tokio::test]
async fn repeat_request_merges_into_one_booking() {
    let db = setup().await;
    let driver = create_user(&db, "driver").await;
    let passenger = create_user(&db, "alice").await;
    let ride = create_ride(&db, &driver, 4).await;

    let first = booking::request(
        &db,
        passenger.id,
        BookingRequest {
            ride_id: ride.id,
            passenger_count: 1,
            pickup_note: Some("Gate 2".to_string()),
            payment_method: PaymentMethod::Cash,
        },
    )
    .await
    .unwrap();
    assert!(matches!(first, BookingOutcome::Created(_)));

    let second = booking::request(
        &db,
        passenger.id,
        BookingRequest {
            ride_id: ride.id,
            passenger_count: 2,
            pickup_note: Some("Bring water".to_string()),
            payment_method: PaymentMethod::Online,
        },
    )
    .await
    .unwrap();

    let BookingOutcome::Merged(merged) = second else {
        panic!("second request should merge");
    };
    assert_eq!(merged.id, first.booking().id);
    assert_eq!(merged.passenger_count, 3);
    assert_eq!(merged.pickup_note.as_deref(), Some("Gate 2\nBring water"));
    assert_eq!(merged.payment_method, PaymentMethod::Online);
    assert_eq!(merged.status, BookingStatus::Pending);

    let all = booking::list_for_passenger(&db, passenger.id).await.unwrap();
    assert_eq!(all.len(), 1);
    // Pending requests hold no seats
    assert_eq!(reload_ride(&db, ride.id).await.seats, 4);
}

#[tokio::test]
async fn merge_beyond_available_seats_is_rejected() {
    let db = setup().await;
    let driver = create_user(&db, "driver").await;
    let passenger = create_user(&db, "alice").await;
    let ride = create_ride(&db, &driver, 3).await;

    let b = book(&db, &passenger, &ride, 2).await;
    let err = booking::request(
        &db,
        passenger.id,
        BookingRequest {
            ride_id: ride.id,
            passenger_count: 2,
            pickup_note: None,
            payment_method: PaymentMethod::Cash,
        },
    )
    .await
    .unwrap_err();

    assert!(matches!(err, AppError::Capacity(_)));
    assert_eq!(reload_booking(&db, b.id).await.unwrap().passenger_count, 2);
}

#[tokio::test]
async fn merge_into_accepted_booking_takes_seats_immediately() {
    let db = setup().await;
    let driver = create_user(&db, "driver").await;
    let passenger = create_user(&db, "alice").await;
    let ride = create_ride(&db, &driver, 3).await;

    let b = book(&db, &passenger, &ride, 1).await;
    booking::accept(&db, driver.id, b.id).await.unwrap();
    assert_eq!(reload_ride(&db, ride.id).await.seats, 2);

    let merged = book(&db, &passenger, &ride, 2).await;
    assert_eq!(merged.id, b.id);
    assert_eq!(merged.passenger_count, 3);
    assert_eq!(merged.status, BookingStatus::Accepted);

    let ride_after = reload_ride(&db, ride.id).await;
    assert_eq!(ride_after.seats, 0);
    assert_eq!(ride_after.status, RideStatus::Full);
}

#[tokio::test]
async fn merge_into_rejected_booking_is_a_state_conflict() {
    let db = setup().await;
    let driver = create_user(&db, "driver").await;
    let passenger = create_user(&db, "alice").await;
    let ride = create_ride(&db, &driver, 3).await;

    let b = book(&db, &passenger, &ride, 1).await;
    booking::reject(&db, driver.id, b.id).await.unwrap();

    let err = booking::request(
        &db,
        passenger.id,
        BookingRequest {
            ride_id: ride.id,
            passenger_count: 1,
            pickup_note: None,
            payment_method: PaymentMethod::Cash,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::StateConflict(_)));
}

#[tokio::test]
async fn accept_leaving_seats_keeps_ride_open() {
    let db = setup().await;
    let driver = create_user(&db, "driver").await;
    let passenger = create_user(&db, "alice").await;
    let ride = create_ride(&db, &driver, 3).await;

    let b = book(&db, &passenger, &ride, 2).await;
    let (_, ride_after) = booking::accept(&db, driver.id, b.id).await.unwrap();
    assert_eq!(ride_after.seats, 1);
    assert_eq!(ride_after.status, RideStatus::Open);
}

#[tokio::test]
async fn requesting_more_seats_than_available_fails() {
    let db = setup().await;
    let driver = create_user(&db, "driver").await;
    let passenger = create_user(&db, "alice").await;
    let ride = create_ride(&db, &driver, 2).await;

    let err = booking::request(
        &db,
        passenger.id,
        BookingRequest {
            ride_id: ride.id,
            passenger_count: 3,
            pickup_note: None,
            payment_method: PaymentMethod::Cash,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Capacity(_)));
    assert!(booking::list_for_passenger(&db, passenger.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn zero_seat_request_is_invalid() {
    let db = setup().await;
    let driver = create_user(&db, "driver").await;
    let passenger = create_user(&db, "alice").await;
    let ride = create_ride(&db, &driver, 2).await;

    let err = booking::request(
        &db,
        passenger.id,
        BookingRequest {
            ride_id: ride.id,
            passenger_count: 0,
            pickup_note: None,
            payment_method: PaymentMethod::Cash,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn driver_cannot_book_own_ride() {
    let db = setup().await;
    let driver = create_user(&db, "driver").await;
    let ride = create_ride(&db, &driver, 2).await;

    let err = booking::request(
        &db,
        driver.id,
        BookingRequest {
            ride_id: ride.id,
            passenger_count: 1,
            pickup_note: None,
            payment_method: PaymentMethod::Cash,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[tokio::test]
async fn second_acceptance_cannot_overbook() {
    let db = setup().await;
    let driver = create_user(&db, "driver").await;
    let alice = create_user(&db, "alice").await;
    let bob = create_user(&db, "bob").await;
    let ride = create_ride(&db, &driver, 2).await;

    // Both fit while pending; only one can be accepted
    let a = book(&db, &alice, &ride, 2).await;
    let b = book(&db, &bob, &ride, 1).await;

    booking::accept(&db, driver.id, a.id).await.unwrap();
    let err = booking::accept(&db, driver.id, b.id).await.unwrap_err();
    assert!(matches!(err, AppError::Capacity(_)));

    assert_eq!(
        reload_booking(&db, b.id).await.unwrap().status,
        BookingStatus::Pending
    );
    assert_eq!(reload_ride(&db, ride.id).await.seats, 0);
}

#[tokio::test]
async fn only_the_driver_can_accept_or_reject() {
    let db = setup().await;
    let driver = create_user(&db, "driver").await;
    let passenger = create_user(&db, "alice").await;
    let ride = create_ride(&db, &driver, 2).await;
    let b = book(&db, &passenger, &ride, 1).await;

    let err = booking::accept(&db, passenger.id, b.id).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
    let err = booking::reject(&db, passenger.id, b.id).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    assert_eq!(reload_ride(&db, ride.id).await.seats, 2);
}

#[tokio::test]
async fn accepting_twice_is_a_state_conflict() {
    let db = setup().await;
    let driver = create_user(&db, "driver").await;
    let passenger = create_user(&db, "alice").await;
    let ride = create_ride(&db, &driver, 3).await;
    let b = book(&db, &passenger, &ride, 1).await;

    booking::accept(&db, driver.id, b.id).await.unwrap();
    let err = booking::accept(&db, driver.id, b.id).await.unwrap_err();
    assert!(matches!(err, AppError::StateConflict(_)));
    assert_eq!(reload_ride(&db, ride.id).await.seats, 2);
}

#[tokio::test]
async fn reject_leaves_seats_alone() {
    let db = setup().await;
    let driver = create_user(&db, "driver").await;
    let passenger = create_user(&db, "alice").await;
    let ride = create_ride(&db, &driver, 2).await;
    let b = book(&db, &passenger, &ride, 2).await;

    let rejected = booking::reject(&db, driver.id, b.id).await.unwrap();
    assert_eq!(rejected.status, BookingStatus::Rejected);

    let ride_after = reload_ride(&db, ride.id).await;
    assert_eq!(ride_after.seats, 2);
    assert_eq!(ride_after.status, RideStatus::Open);
}

#[tokio::test]
async fn only_the_booker_can_delete() {
    let db = setup().await;
    let driver = create_user(&db, "driver").await;
    let passenger = create_user(&db, "alice").await;
    let ride = create_ride(&db, &driver, 2).await;
    let b = book(&db, &passenger, &ride, 1).await;

    let err = booking::delete(&db, driver.id, b.id, SeatRestore::KeepStatus)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
    assert!(reload_booking(&db, b.id).await.is_some());
}

#[tokio::test]
async fn missing_booking_is_not_found() {
    let db = setup().await;
    let driver = create_user(&db, "driver").await;

    let err = booking::accept(&db, driver.id, uuid::Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn confirmation_recipient_requires_an_accepted_booking() {
    let db = setup().await;
    let driver = create_user(&db, "driver").await;
    let passenger = create_user(&db, "alice").await;
    let ride = create_ride(&db, &driver, 2).await;
    let b = book(&db, &passenger, &ride, 1).await;

    let err = booking::confirmation_recipient(&db, driver.id, passenger.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    booking::accept(&db, driver.id, b.id).await.unwrap();
    let recipient = booking::confirmation_recipient(&db, driver.id, passenger.id)
        .await
        .unwrap();
    assert_eq!(recipient.email, passenger.email);
}

#[tokio::test]
async fn held_seats_never_exceed_capacity() {
    let db = setup().await;
    let driver = create_user(&db, "driver").await;
    let alice = create_user(&db, "alice").await;
    let bob = create_user(&db, "bob").await;
    let carol = create_user(&db, "carol").await;
    let ride = create_ride(&db, &driver, 4).await;

    let a = book(&db, &alice, &ride, 2).await;
    let b = book(&db, &bob, &ride, 2).await;
    let c = book(&db, &carol, &ride, 1).await;

    booking::accept(&db, driver.id, a.id).await.unwrap();
    booking::accept(&db, driver.id, b.id).await.unwrap();
    assert!(booking::accept(&db, driver.id, c.id).await.is_err());
    booking::cancel(&db, bob.id, b.id, SeatRestore::KeepStatus)
        .await
        .unwrap();
    booking::accept(&db, driver.id, c.id).await.unwrap();
    ride_share_backend::services::ride::start_journey(&db, driver.id, ride.id)
        .await
        .unwrap();

    let bookings = ride_share_backend::services::ride::requests(&db, driver.id, ride.id)
        .await
        .unwrap();
    let held: i32 = bookings
        .iter()
        .filter(|(b, _)| b.status.holds_seats())
        .map(|(b, _)| b.passenger_count)
        .sum();

    let ride_after = reload_ride(&db, ride.id).await;
    assert_eq!(held, 3);
    assert_eq!(held + ride_after.seats, 4);
}

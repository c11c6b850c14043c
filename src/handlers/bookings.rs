use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::booking::PaymentMethod;
use crate::error::AppResult;
use crate::handlers::{BookingResponse, MessageResponse, RideResponse, UserSummary};
use crate::services::alert::{self, EmergencyAlert};
use crate::services::booking::{self, BookingOutcome, BookingRequest};
use crate::utils::jwt::Claims;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub ride_id: Uuid,
    pub passenger_count: i32,
    pub pickup_note: Option<String>,
    #[serde(default = "default_payment")]
    pub payment_method: PaymentMethod,
}

fn default_payment() -> PaymentMethod {
    PaymentMethod::Cash
}

#[derive(Debug, Serialize)]
pub struct AcceptResponse {
    pub booking: BookingResponse,
    pub ride: RideResponse,
}

#[derive(Debug, Serialize)]
pub struct PassengerBookingResponse {
    #[serde(flatten)]
    pub booking: BookingResponse,
    pub ride: RideResponse,
}

#[derive(Debug, Deserialize)]
pub struct RateRequest {
    pub stars: i32,
    pub comment: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RateResponse {
    pub booking_id: Uuid,
    pub stars: i32,
    pub comment: Option<String>,
    pub driver: UserSummary,
}

#[derive(Debug, Deserialize)]
pub struct EmergencyRequest {
    pub message: String,
    pub location: Option<String>,
}

/// Request seats on a ride. A repeat request merges into the existing booking.
pub async fn create_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateBookingRequest>,
) -> AppResult<(StatusCode, Json<BookingResponse>)> {
    let outcome = booking::request(
        &state.db,
        claims.sub,
        BookingRequest {
            ride_id: payload.ride_id,
            passenger_count: payload.passenger_count,
            pickup_note: payload.pickup_note,
            payment_method: payload.payment_method,
        },
    )
    .await?;

    let status = match outcome {
        BookingOutcome::Created(_) => StatusCode::CREATED,
        BookingOutcome::Merged(_) => StatusCode::OK,
    };
    Ok((status, Json(outcome.into_booking().into())))
}

/// Bookings made by the logged-in passenger, with their rides
pub async fn my_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Vec<PassengerBookingResponse>>> {
    let bookings = booking::list_for_passenger(&state.db, claims.sub).await?;

    Ok(Json(
        bookings
            .into_iter()
            .map(|pb| PassengerBookingResponse {
                booking: pb.booking.into(),
                ride: RideResponse::new(pb.ride, pb.driver.as_ref()),
            })
            .collect(),
    ))
}

pub async fn accept_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<AcceptResponse>> {
    let (b, r) = booking::accept(&state.db, claims.sub, id).await?;
    Ok(Json(AcceptResponse {
        booking: b.into(),
        ride: r.into(),
    }))
}

pub async fn reject_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<BookingResponse>> {
    let b = booking::reject(&state.db, claims.sub, id).await?;
    Ok(Json(b.into()))
}

/// Cancel as either the passenger or the ride's driver
pub async fn cancel_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<BookingResponse>> {
    let b = booking::cancel(&state.db, claims.sub, id, state.config.seat_restore()).await?;
    Ok(Json(b.into()))
}

pub async fn delete_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    booking::delete(&state.db, claims.sub, id, state.config.seat_restore()).await?;
    Ok(Json(MessageResponse::new("Booking deleted")))
}

/// Rate the driver of a completed booking. Rating again replaces the old stars.
pub async fn rate_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RateRequest>,
) -> AppResult<(StatusCode, Json<RateResponse>)> {
    let outcome = booking::rate(&state.db, claims.sub, id, payload.stars, payload.comment).await?;

    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(RateResponse {
            booking_id: outcome.rating.booking_id,
            stars: outcome.rating.stars,
            comment: outcome.rating.comment,
            driver: UserSummary::from(&outcome.driver),
        }),
    ))
}

pub async fn emergency_alert(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<EmergencyRequest>,
) -> AppResult<Json<MessageResponse>> {
    let sent_to = alert::send_emergency_alert(
        &state.db,
        state.mailer.as_ref(),
        state.config.default_emergency_email.as_deref(),
        claims.sub,
        id,
        EmergencyAlert {
            message: payload.message,
            location: payload.location,
        },
    )
    .await?;

    Ok(Json(MessageResponse::new(format!(
        "Emergency alert sent to {}",
        sent_to
    ))))
}

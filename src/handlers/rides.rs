use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use sea_orm::prelude::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::ride::VehicleType;
use crate::error::AppResult;
use crate::handlers::{BookingResponse, MessageResponse, RideResponse, UserSummary};
use crate::services::ride::{self, RideComment, RideDraft, RideSearch};
use crate::utils::jwt::Claims;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateRideRequest {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub departure_date: Option<NaiveDate>,
    pub departure_time: Option<NaiveTime>,
    pub seats: Option<i32>,
    pub price: Option<Decimal>,
    pub vehicle_type: Option<VehicleType>,
    pub license: Option<String>,
}

impl From<CreateRideRequest> for RideDraft {
    fn from(req: CreateRideRequest) -> Self {
        RideDraft {
            origin: req.origin,
            destination: req.destination,
            departure_date: req.departure_date,
            departure_time: req.departure_time,
            seats: req.seats,
            price: req.price,
            vehicle_type: req.vehicle_type,
            license: req.license,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub date: Option<NaiveDate>,
    pub seats: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct OwnRideResponse {
    #[serde(flatten)]
    pub ride: RideResponse,
    pub passengers: Vec<BookingResponse>,
}

#[derive(Debug, Serialize)]
pub struct JourneyResponse {
    pub ride: RideResponse,
    pub bookings_updated: u64,
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub booking_id: Uuid,
    pub stars: i32,
    pub comment: Option<String>,
    pub rated_at: DateTime<FixedOffset>,
    pub rater: Option<UserSummary>,
}

impl From<RideComment> for CommentResponse {
    fn from(c: RideComment) -> Self {
        Self {
            booking_id: c.rating.booking_id,
            stars: c.rating.stars,
            comment: c.rating.comment,
            rated_at: c.rating.rated_at,
            rater: c.rater.as_ref().map(UserSummary::from),
        }
    }
}

/// Offer a ride as the logged-in driver
pub async fn create_ride(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateRideRequest>,
) -> AppResult<(StatusCode, Json<RideResponse>)> {
    let ride = ride::create(&state.db, claims.sub, payload.into()).await?;
    Ok((StatusCode::CREATED, Json(ride.into())))
}

/// List every OPEN ride
pub async fn list_rides(State(state): State<AppState>) -> AppResult<Json<Vec<RideResponse>>> {
    let rides = ride::search(&state.db, &RideSearch::default()).await?;
    Ok(Json(
        rides
            .into_iter()
            .map(|(r, driver)| RideResponse::new(r, driver.as_ref()))
            .collect(),
    ))
}

/// Search OPEN rides by origin, destination, date and free seats
pub async fn search_rides(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<Vec<RideResponse>>> {
    let filter = RideSearch {
        origin: params.origin,
        destination: params.destination,
        date: params.date,
        min_seats: params.seats,
    };

    let rides = ride::search(&state.db, &filter).await?;
    Ok(Json(
        rides
            .into_iter()
            .map(|(r, driver)| RideResponse::new(r, driver.as_ref()))
            .collect(),
    ))
}

pub async fn get_ride(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<RideResponse>> {
    let (r, driver) = ride::details(&state.db, id).await?;
    Ok(Json(RideResponse::new(r, driver.as_ref())))
}

/// Rides offered by the logged-in driver, with their accepted passengers
pub async fn my_rides(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Vec<OwnRideResponse>>> {
    let rides = ride::list_for_driver(&state.db, claims.sub).await?;

    let response = rides
        .into_iter()
        .map(|own| OwnRideResponse {
            ride: own.ride.into(),
            passengers: own
                .accepted
                .into_iter()
                .map(|(b, booker)| BookingResponse::new(b, booker.as_ref()))
                .collect(),
        })
        .collect();

    Ok(Json(response))
}

pub async fn start_ride(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<JourneyResponse>> {
    let (r, bookings_updated) = ride::start_journey(&state.db, claims.sub, id).await?;
    Ok(Json(JourneyResponse {
        ride: r.into(),
        bookings_updated,
    }))
}

pub async fn end_ride(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<JourneyResponse>> {
    let (r, bookings_updated) = ride::end_journey(&state.db, claims.sub, id).await?;
    Ok(Json(JourneyResponse {
        ride: r.into(),
        bookings_updated,
    }))
}

/// Stop taking bookings. Outstanding requests are cancelled.
pub async fn close_ride(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<RideResponse>> {
    let r = ride::close(&state.db, claims.sub, id).await?;
    Ok(Json(r.into()))
}

pub async fn delete_ride(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    ride::delete(&state.db, claims.sub, id).await?;
    Ok(Json(MessageResponse::new("Ride deleted")))
}

/// Every booking on one of the driver's rides, any status
pub async fn ride_requests(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<BookingResponse>>> {
    let bookings = ride::requests(&state.db, claims.sub, id).await?;
    Ok(Json(
        bookings
            .into_iter()
            .map(|(b, booker)| BookingResponse::new(b, booker.as_ref()))
            .collect(),
    ))
}

pub async fn ride_comments(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<CommentResponse>>> {
    let comments = ride::comments(&state.db, claims.sub, id).await?;
    Ok(Json(comments.into_iter().map(CommentResponse::from).collect()))
}

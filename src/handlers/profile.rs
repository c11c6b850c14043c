use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::user;
use crate::error::AppResult;
use crate::handlers::{rides::CommentResponse, UserSummary};
use crate::services::account::{self, ProfileUpdate};
use crate::utils::jwt::Claims;
use crate::AppState;

/// The caller's own account, contact details included
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    pub emergency_email: Option<String>,
    pub total_rating: f64,
    pub rating_count: i32,
    pub created_at: DateTime<FixedOffset>,
}

impl From<user::Model> for ProfileResponse {
    fn from(u: user::Model) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            first_name: u.first_name,
            last_name: u.last_name,
            phone_number: u.phone_number,
            emergency_email: u.emergency_email,
            total_rating: u.total_rating,
            rating_count: u.rating_count,
            created_at: u.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UserSearchParams {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub emergency_email: Option<String>,
}

pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<ProfileResponse>> {
    let user = account::find_user(&state.db, claims.sub).await?;
    Ok(Json(user.into()))
}

pub async fn update_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<UpdateProfileRequest>,
) -> AppResult<Json<ProfileResponse>> {
    let user = account::update_profile(
        &state.db,
        claims.sub,
        ProfileUpdate {
            first_name: payload.first_name,
            last_name: payload.last_name,
            phone_number: payload.phone_number,
            emergency_email: payload.emergency_email,
        },
    )
    .await?;

    Ok(Json(user.into()))
}

/// Drop the caller's account, their rides and their bookings
pub async fn delete_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<StatusCode> {
    account::delete_account(&state.db, claims.sub, state.config.seat_restore()).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn search_users(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<UserSearchParams>,
) -> AppResult<Json<Vec<UserSummary>>> {
    let users = account::search_users(&state.db, claims.sub, &params.query).await?;
    Ok(Json(users.iter().map(UserSummary::from).collect()))
}

pub async fn public_profile(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<UserSummary>> {
    let user = account::find_user(&state.db, id).await?;
    Ok(Json(UserSummary::from(&user)))
}

/// Ratings the user has received as a driver
pub async fn reviews(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<CommentResponse>>> {
    let reviews = account::reviews(&state.db, id).await?;
    Ok(Json(reviews.into_iter().map(CommentResponse::from).collect()))
}

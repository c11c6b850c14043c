use axum::{extract::State, Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::handlers::MessageResponse;
use crate::services::{account, booking, otp::issue_and_send};
use crate::utils::jwt::Claims;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SendOtpRequest {
    pub booker_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub booker_id: Uuid,
    pub otp: String,
}

/// Mail a ride confirmation code to one of the driver's accepted passengers
pub async fn send_ride_otp(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<SendOtpRequest>,
) -> AppResult<Json<MessageResponse>> {
    let booker = booking::confirmation_recipient(&state.db, claims.sub, payload.booker_id).await?;

    issue_and_send(
        state.ride_otps.as_ref(),
        state.mailer.as_ref(),
        &booker.email,
        "Ride Confirmation OTP",
        |code| {
            format!(
                "Hello {},\n\nYour ride confirmation code is {:06}.\nShare it with your driver at pickup.",
                booker.full_name(),
                code
            )
        },
    )
    .await?;

    Ok(Json(MessageResponse::new("OTP sent successfully")))
}

/// Check the code the passenger shows the driver. A code works once.
pub async fn verify_ride_otp(
    State(state): State<AppState>,
    Json(payload): Json<VerifyOtpRequest>,
) -> AppResult<Json<MessageResponse>> {
    let booker = account::find_user(&state.db, payload.booker_id).await?;
    state.ride_otps.verify(&booker.email, &payload.otp).await?;

    tracing::info!(booker_id = %booker.id, "Ride OTP verified");
    Ok(Json(MessageResponse::new("OTP verified successfully")))
}

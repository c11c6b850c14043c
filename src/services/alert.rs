use sea_orm::{DatabaseConnection, EntityTrait};
use uuid::Uuid;

use crate::entities::{booking, ride, user};
use crate::error::{AppError, AppResult};
use crate::services::mail::Mailer;

#[derive(Debug, Clone)]
pub struct EmergencyAlert {
    pub message: String,
    pub location: Option<String>,
}

pub fn render(driver: &str, passenger: &str, passenger_email: &str, alert: &EmergencyAlert) -> (String, String) {
    let subject = format!("Emergency Alert for {}'s Ride", driver);
    let body = format!(
        "Emergency Alert!\n\n\
         Passenger: {}\n\n\
         Message: {}\n\n\
         Location: {}\n\n\
         Alert sent by: {}\n\n\
         Please take immediate action.\n",
        passenger,
        alert.message.trim(),
        alert.location.as_deref().unwrap_or("Location not available"),
        passenger_email,
    );
    (subject, body)
}

/// Mail the booker's emergency contact about a booking.
///
/// Falls back to `default_recipient` when the booker has no contact set.
/// Returns the address the alert went to.
pub async fn send_emergency_alert(
    db: &DatabaseConnection,
    mailer: &dyn Mailer,
    default_recipient: Option<&str>,
    booker_id: Uuid,
    booking_id: Uuid,
    alert: EmergencyAlert,
) -> AppResult<String> {
    if alert.message.trim().is_empty() {
        return Err(AppError::Validation("Message is required".to_string()));
    }

    let booking = booking::Entity::find_by_id(booking_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

    if booking.booker_id != booker_id {
        return Err(AppError::Forbidden(
            "You can only raise alerts for your own bookings".to_string(),
        ));
    }

    let passenger = user::Entity::find_by_id(booker_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let ride = ride::Entity::find_by_id(booking.ride_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Ride not found".to_string()))?;
    let driver = user::Entity::find_by_id(ride.driver_id)
        .one(db)
        .await?
        .map(|d| d.full_name())
        .unwrap_or_else(|| "Unknown driver".to_string());

    let recipient = passenger
        .emergency_email
        .clone()
        .filter(|e| !e.trim().is_empty())
        .or_else(|| default_recipient.map(str::to_string))
        .ok_or_else(|| {
            AppError::Validation("No emergency contact is configured".to_string())
        })?;

    let (subject, body) = render(&driver, &passenger.full_name(), &passenger.email, &alert);
    mailer.send(&recipient, &subject, &body).await?;

    tracing::warn!(booking_id = %booking_id, booker_id = %booker_id, "Emergency alert sent");
    Ok(recipient)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_uses_placeholder_location() {
        let alert = EmergencyAlert {
            message: " car broke down ".to_string(),
            location: None,
        };
        let (subject, body) = render("Asha Rao", "Ravi K", "ravi@example.com", &alert);

        assert_eq!(subject, "Emergency Alert for Asha Rao's Ride");
        assert!(body.contains("Message: car broke down\n"));
        assert!(body.contains("Location: Location not available"));
        assert!(body.contains("Alert sent by: ravi@example.com"));
    }
}

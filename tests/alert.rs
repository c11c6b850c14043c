mod common;

use std::sync::Mutex;

use async_trait::async_trait;
use ride_share_backend::error::{AppError, AppResult};
use ride_share_backend::services::alert::{send_emergency_alert, EmergencyAlert};
use ride_share_backend::services::mail::Mailer;
use sea_orm::{ActiveModelTrait, Set};

use common::{book, create_ride, create_user, setup};

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<(String, String, String)>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> AppResult<()> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), subject.to_string(), body.to_string()));
        Ok(())
    }
}

fn alert(message: &str) -> EmergencyAlert {
    EmergencyAlert {
        message: message.to_string(),
        location: Some("NH48 km 112".to_string()),
    }
}

#[tokio::test]
async fn alert_goes_to_the_passengers_contact() {
    let db = setup().await;
    let driver = create_user(&db, "driver").await;
    let passenger = create_user(&db, "alice").await;

    let mut active: ride_share_backend::entities::user::ActiveModel = passenger.clone().into();
    active.emergency_email = Set(Some("family@example.com".to_string()));
    let passenger = active.update(&db).await.unwrap();

    let ride = create_ride(&db, &driver, 2).await;
    let b = book(&db, &passenger, &ride, 1).await;

    let mailer = RecordingMailer::default();
    let sent_to = send_emergency_alert(
        &db,
        &mailer,
        Some("ops@example.com"),
        passenger.id,
        b.id,
        alert("Driver is speeding"),
    )
    .await
    .unwrap();
    assert_eq!(sent_to, "family@example.com");

    let sent = mailer.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    let (to, subject, body) = &sent[0];
    assert_eq!(to, "family@example.com");
    assert_eq!(subject, "Emergency Alert for driver Tester's Ride");
    assert!(body.contains("Driver is speeding"));
    assert!(body.contains("NH48 km 112"));
    assert!(body.contains("alice@example.com"));
}

#[tokio::test]
async fn alert_falls_back_to_default_recipient() {
    let db = setup().await;
    let driver = create_user(&db, "driver").await;
    let passenger = create_user(&db, "alice").await;
    let ride = create_ride(&db, &driver, 2).await;
    let b = book(&db, &passenger, &ride, 1).await;

    let mailer = RecordingMailer::default();
    let sent_to = send_emergency_alert(
        &db,
        &mailer,
        Some("ops@example.com"),
        passenger.id,
        b.id,
        alert("Need help"),
    )
    .await
    .unwrap();
    assert_eq!(sent_to, "ops@example.com");
}

#[tokio::test]
async fn alert_on_someone_elses_booking_is_forbidden() {
    let db = setup().await;
    let driver = create_user(&db, "driver").await;
    let passenger = create_user(&db, "alice").await;
    let ride = create_ride(&db, &driver, 2).await;
    let b = book(&db, &passenger, &ride, 1).await;

    let mailer = RecordingMailer::default();
    let err = send_emergency_alert(
        &db,
        &mailer,
        Some("ops@example.com"),
        driver.id,
        b.id,
        alert("Need help"),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, AppError::Forbidden(_)));
    assert!(mailer.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn blank_message_is_rejected() {
    let db = setup().await;
    let passenger = create_user(&db, "alice").await;

    let mailer = RecordingMailer::default();
    let err = send_emergency_alert(
        &db,
        &mailer,
        None,
        passenger.id,
        uuid::Uuid::new_v4(),
        alert("   "),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;

use chrono::Duration;
use sea_orm::DatabaseConnection;

use services::mail::Mailer;
use services::otp::{InMemoryOtpStore, OtpStore};

pub use config::Config;
pub use error::{AppError, AppResult};

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Config,
    pub mailer: Arc<dyn Mailer>,
    /// Codes a driver sends a booker to confirm them at pickup.
    pub ride_otps: Arc<dyn OtpStore>,
    /// Codes that authorize a password reset.
    pub reset_otps: Arc<dyn OtpStore>,
}

impl AppState {
    pub fn new(db: DatabaseConnection, config: Config, mailer: Arc<dyn Mailer>) -> Self {
        let ttl = Duration::minutes(config.otp_ttl_minutes);
        Self {
            db,
            mailer,
            ride_otps: Arc::new(InMemoryOtpStore::new(ttl)),
            reset_otps: Arc::new(InMemoryOtpStore::new(ttl)),
            config,
        }
    }
}

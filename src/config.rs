use std::env;

use crate::services::ride::SeatRestore;

#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub jwt_secret: String,
    pub jwt_expiration_hours: i64,
    pub server_host: String,
    pub server_port: u16,
    /// How long an issued OTP stays valid.
    pub otp_ttl_minutes: i64,
    /// Put a FULL ride back to OPEN when cancelled seats are returned to it.
    pub reopen_ride_on_seat_restore: bool,
    /// Mail is only delivered over SMTP when this is set; otherwise it is logged.
    pub smtp: Option<SmtpConfig>,
    pub mail_from: String,
    /// Fallback recipient for emergency alerts when a user has no contact set.
    pub default_emergency_email: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let smtp = env::var("SMTP_HOST").ok().map(|host| SmtpConfig {
            host,
            port: env::var("SMTP_PORT")
                .unwrap_or_else(|_| "587".to_string())
                .parse()
                .expect("SMTP_PORT must be a number"),
            username: env::var("SMTP_USERNAME").unwrap_or_default(),
            password: env::var("SMTP_PASSWORD").unwrap_or_default(),
        });

        Self {
            database_url: env::var("DATABASE_URL")
                .expect("DATABASE_URL must be set"),
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .expect("DB_MAX_CONNECTIONS must be a number"),
            jwt_secret: env::var("JWT_SECRET")
                .expect("JWT_SECRET must be set"),
            jwt_expiration_hours: env::var("JWT_EXPIRATION_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .expect("JWT_EXPIRATION_HOURS must be a number"),
            server_host: env::var("SERVER_HOST")
                .unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .expect("SERVER_PORT must be a number"),
            otp_ttl_minutes: env::var("OTP_TTL_MINUTES")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .expect("OTP_TTL_MINUTES must be a number"),
            reopen_ride_on_seat_restore: env::var("REOPEN_RIDE_ON_SEAT_RESTORE")
                .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            smtp,
            mail_from: env::var("MAIL_FROM")
                .unwrap_or_else(|_| "RideShare <no-reply@rideshare.local>".to_string()),
            default_emergency_email: env::var("DEFAULT_EMERGENCY_EMAIL").ok(),
        }
    }

    pub fn seat_restore(&self) -> SeatRestore {
        if self.reopen_ride_on_seat_restore {
            SeatRestore::Reopen
        } else {
            SeatRestore::KeepStatus
        }
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

use std::str::FromStr;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use sea_orm::{
    sea_query::Condition, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;
use validator::ValidateEmail;

use crate::entities::booking::BookingStatus;
use crate::entities::{booking, rating, ride, user};
use crate::error::{AppError, AppResult};
use crate::services::mail::Mailer;
use crate::services::otp::{issue_and_send, OtpStore};
use crate::services::ride::{self as rides, users_by_id, RideComment, SeatRestore};
use crate::utils::search::contains_ci;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const USER_SEARCH_LIMIT: u64 = 10;

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    pub emergency_email: Option<String>,
}

/// Editable profile fields. `None` leaves a field untouched; a blank string
/// clears an optional one.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub emergency_email: Option<String>,
}

pub fn hash_password(password: &str) -> AppResult<String> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

/// Lower-cased, trimmed address, or a validation error.
pub fn normalize_email(email: &str) -> AppResult<String> {
    let email = email.trim().to_lowercase();
    if !email.validate_email() {
        return Err(AppError::Validation("Invalid email address".to_string()));
    }
    Ok(email)
}

fn optional_email(value: Option<&str>) -> AppResult<Option<String>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(email) => normalize_email(email).map(Some),
    }
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub async fn register(db: &DatabaseConnection, account: NewAccount) -> AppResult<user::Model> {
    let email = normalize_email(&account.email)?;
    let username = account.username.trim().to_string();
    let first_name = account.first_name.trim().to_string();
    if username.is_empty() || first_name.is_empty() {
        return Err(AppError::Validation(
            "Username and first name are required".to_string(),
        ));
    }
    let emergency_email = optional_email(account.emergency_email.as_deref())?;

    let existing = user::Entity::find()
        .filter(
            user::Column::Email
                .eq(&email)
                .or(user::Column::Username.eq(&username)),
        )
        .one(db)
        .await?;

    if let Some(existing) = existing {
        let field = if existing.email == email { "Email" } else { "Username" };
        return Err(AppError::Conflict(format!("{} already registered", field)));
    }

    let password_hash = hash_password(&account.password)?;

    let user = user::ActiveModel {
        id: Set(Uuid::new_v4()),
        username: Set(username),
        email: Set(email),
        password_hash: Set(password_hash),
        first_name: Set(first_name),
        last_name: Set(account.last_name.trim().to_string()),
        phone_number: Set(optional_text(account.phone_number)),
        emergency_email: Set(emergency_email),
        total_rating: Set(0.0),
        rating_count: Set(0),
        created_at: Set(Utc::now().into()),
    }
    .insert(db)
    .await?;

    tracing::info!(user_id = %user.id, "User registered");
    Ok(user)
}

/// Check credentials. Unknown email and wrong password fail the same way.
pub async fn login(db: &DatabaseConnection, email: &str, password: &str) -> AppResult<user::Model> {
    let invalid = || AppError::Unauthorized("Invalid email or password".to_string());

    let user = user::Entity::find()
        .filter(user::Column::Email.eq(email.trim().to_lowercase()))
        .one(db)
        .await?
        .ok_or_else(invalid)?;

    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|e| AppError::Internal(format!("Failed to parse password hash: {}", e)))?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| invalid())?;

    Ok(user)
}

pub async fn find_user(db: &DatabaseConnection, user_id: Uuid) -> AppResult<user::Model> {
    user::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

/// Users whose username, first or last name contains `query`, ignoring case.
/// The caller is never listed. A blank query finds nobody.
pub async fn search_users(
    db: &DatabaseConnection,
    caller_id: Uuid,
    query: &str,
) -> AppResult<Vec<user::Model>> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(Vec::new());
    }

    let users = user::Entity::find()
        .filter(
            Condition::any()
                .add(contains_ci((user::Entity, user::Column::Username), query))
                .add(contains_ci((user::Entity, user::Column::FirstName), query))
                .add(contains_ci((user::Entity, user::Column::LastName), query)),
        )
        .filter(user::Column::Id.ne(caller_id))
        .order_by_asc(user::Column::Username)
        .limit(USER_SEARCH_LIMIT)
        .all(db)
        .await?;

    Ok(users)
}

/// Account fields that must be unique across users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Username,
    Email,
    PhoneNumber,
}

impl FromStr for UniqueField {
    type Err = AppError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "username" => Ok(UniqueField::Username),
            "email" => Ok(UniqueField::Email),
            "phone_number" => Ok(UniqueField::PhoneNumber),
            other => Err(AppError::Validation(format!("Cannot check availability of {}", other))),
        }
    }
}

/// Whether no account uses `value` for `field` yet. Emails compare the
/// way they are stored, trimmed and lower-cased.
pub async fn is_available(
    db: &DatabaseConnection,
    field: UniqueField,
    value: &str,
) -> AppResult<bool> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation("A value to check is required".to_string()));
    }

    let condition = match field {
        UniqueField::Username => user::Column::Username.eq(value),
        UniqueField::Email => user::Column::Email.eq(value.to_lowercase()),
        UniqueField::PhoneNumber => user::Column::PhoneNumber.eq(value),
    };

    let taken = user::Entity::find().filter(condition).count(db).await?;
    Ok(taken == 0)
}

/// Apply a profile edit. The rating pair is owned by the rating fold and is
/// never touched here.
pub async fn update_profile(
    db: &DatabaseConnection,
    user_id: Uuid,
    update: ProfileUpdate,
) -> AppResult<user::Model> {
    let user = find_user(db, user_id).await?;
    let mut active: user::ActiveModel = user.into();

    if let Some(first_name) = update.first_name {
        let first_name = first_name.trim().to_string();
        if first_name.is_empty() {
            return Err(AppError::Validation("First name cannot be empty".to_string()));
        }
        active.first_name = Set(first_name);
    }
    if let Some(last_name) = update.last_name {
        active.last_name = Set(last_name.trim().to_string());
    }
    if update.phone_number.is_some() {
        active.phone_number = Set(optional_text(update.phone_number));
    }
    if let Some(emergency_email) = update.emergency_email {
        active.emergency_email = Set(optional_email(Some(&emergency_email))?);
    }

    let user = active.update(db).await?;
    tracing::debug!(user_id = %user.id, "Profile updated");
    Ok(user)
}

/// Every rating left on any of the driver's rides, newest first.
pub async fn reviews(db: &DatabaseConnection, driver_id: Uuid) -> AppResult<Vec<RideComment>> {
    find_user(db, driver_id).await?;

    let rated = booking::Entity::find()
        .inner_join(ride::Entity)
        .filter(ride::Column::DriverId.eq(driver_id))
        .find_also_related(rating::Entity)
        .filter(rating::Column::Id.is_not_null())
        .order_by_desc(rating::Column::RatedAt)
        .all(db)
        .await?;

    let booker_ids: Vec<Uuid> = rated.iter().map(|(b, _)| b.booker_id).collect();
    let raters = users_by_id(db, booker_ids).await?;

    Ok(rated
        .into_iter()
        .filter_map(|(b, r)| {
            r.map(|rating| RideComment {
                rating,
                rater: raters.get(&b.booker_id).cloned(),
            })
        })
        .collect())
}

/// Remove an account with everything hanging off it.
///
/// The user's rides go with their bookings and ratings. The user's own
/// bookings on other drivers' rides are removed too, and accepted seats are
/// handed back to those rides under `policy`. Driver aggregates are left
/// as they are.
pub async fn delete_account(
    db: &DatabaseConnection,
    user_id: Uuid,
    policy: SeatRestore,
) -> AppResult<()> {
    let txn = db.begin().await?;

    user::Entity::find_by_id(user_id)
        .lock_exclusive()
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let ride_ids: Vec<Uuid> = ride::Entity::find()
        .select_only()
        .column(ride::Column::Id)
        .filter(ride::Column::DriverId.eq(user_id))
        .into_tuple()
        .all(&txn)
        .await?;

    let own_bookings = booking::Entity::find()
        .filter(booking::Column::BookerId.eq(user_id))
        .filter(booking::Column::RideId.is_not_in(ride_ids.clone()))
        .all(&txn)
        .await?;

    for b in &own_bookings {
        if b.status == BookingStatus::Accepted {
            let ride = rides::find_locked(&txn, b.ride_id).await?;
            rides::restore_seats(&txn, ride, b.passenger_count, policy).await?;
        }
    }

    let booking_ids: Vec<Uuid> = booking::Entity::find()
        .select_only()
        .column(booking::Column::Id)
        .filter(
            Condition::any()
                .add(booking::Column::BookerId.eq(user_id))
                .add(booking::Column::RideId.is_in(ride_ids.clone())),
        )
        .into_tuple()
        .all(&txn)
        .await?;

    if !booking_ids.is_empty() {
        rating::Entity::delete_many()
            .filter(rating::Column::BookingId.is_in(booking_ids.clone()))
            .exec(&txn)
            .await?;
        booking::Entity::delete_many()
            .filter(booking::Column::Id.is_in(booking_ids))
            .exec(&txn)
            .await?;
    }

    ride::Entity::delete_many()
        .filter(ride::Column::DriverId.eq(user_id))
        .exec(&txn)
        .await?;
    user::Entity::delete_by_id(user_id).exec(&txn).await?;

    txn.commit().await?;

    tracing::info!(user_id = %user_id, rides = ride_ids.len(), "Account deleted");
    Ok(())
}

/// Mail a reset code if the address has an account. Unknown addresses are
/// not reported to the caller.
pub async fn request_password_reset(
    db: &DatabaseConnection,
    store: &dyn OtpStore,
    mailer: &dyn Mailer,
    email: &str,
) -> AppResult<()> {
    let email = normalize_email(email)?;

    let Some(user) = user::Entity::find()
        .filter(user::Column::Email.eq(&email))
        .one(db)
        .await?
    else {
        tracing::debug!(email = %email, "Password reset requested for unknown email");
        return Ok(());
    };

    issue_and_send(store, mailer, &user.email, "Password Reset OTP", |code| {
        format!(
            "Hello {},\n\nYour password reset code is {:06}.\n\nIf you did not ask for it, ignore this email.",
            user.username, code
        )
    })
    .await
}

/// Consume a reset code and store the new password.
pub async fn reset_password(
    db: &DatabaseConnection,
    store: &dyn OtpStore,
    email: &str,
    otp: &str,
    new_password: &str,
) -> AppResult<user::Model> {
    let email = normalize_email(email)?;
    // A too-short password must not burn the code
    let password_hash = hash_password(new_password)?;

    store.verify(&email, otp).await?;

    let user = user::Entity::find()
        .filter(user::Column::Email.eq(&email))
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let mut active: user::ActiveModel = user.into();
    active.password_hash = Set(password_hash);
    let user = active.update(db).await?;

    tracing::info!(user_id = %user.id, "Password reset");
    Ok(user)
}

use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, QuerySelect, Set};
use uuid::Uuid;

use crate::entities::user;
use crate::error::{AppError, AppResult};

pub const MIN_STARS: i32 = 1;
pub const MAX_STARS: i32 = 5;

pub fn validate_stars(stars: i32) -> AppResult<()> {
    if !(MIN_STARS..=MAX_STARS).contains(&stars) {
        return Err(AppError::Validation(format!(
            "Rating must be between {} and {}",
            MIN_STARS, MAX_STARS
        )));
    }
    Ok(())
}

/// Fold one rating into a running average.
///
/// `old_value` is the star value being replaced when a passenger re-rates the
/// same booking: its contribution is taken out of the reconstructed sum before
/// `new_value` goes in, so the count is unchanged. Without it the count grows
/// by one.
///
/// Returns `(average, count)`. The average is clamped to `[0, 5]`.
pub fn aggregate(
    current_total: f64,
    current_count: i32,
    new_value: i32,
    old_value: Option<i32>,
) -> AppResult<(f64, i32)> {
    validate_stars(new_value)?;

    let mut sum = current_total * f64::from(current_count);
    let mut count = current_count;

    if let Some(old) = old_value {
        sum -= f64::from(old);
        count -= 1;
    }

    sum += f64::from(new_value);
    count += 1;

    let average = if count > 0 {
        sum / f64::from(count)
    } else {
        f64::from(new_value)
    };

    Ok((average.clamp(0.0, f64::from(MAX_STARS)), count))
}

/// Apply a rating to the driver's stored aggregate under a row lock.
///
/// This is the only writer of `total_rating` and `rating_count`. Call it inside
/// the transaction that writes the rating row so both commit together.
pub async fn fold_into_driver<C>(
    conn: &C,
    driver_id: Uuid,
    new_value: i32,
    old_value: Option<i32>,
) -> AppResult<user::Model>
where
    C: ConnectionTrait,
{
    validate_stars(new_value)?;

    let driver = user::Entity::find_by_id(driver_id)
        .lock_exclusive()
        .one(conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Driver not found".to_string()))?;

    let (total_rating, rating_count) =
        aggregate(driver.total_rating, driver.rating_count, new_value, old_value)?;

    let mut active: user::ActiveModel = driver.into();
    active.total_rating = Set(total_rating);
    active.rating_count = Set(rating_count);
    let updated = active.update(conn).await?;

    tracing::debug!(
        driver_id = %driver_id,
        total_rating,
        rating_count,
        "Driver rating updated"
    );

    Ok(updated)
}

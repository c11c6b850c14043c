use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use crate::handlers::{auth, bookings, otp, profile, rides};
use crate::middleware::auth::auth_middleware;
use crate::middleware::rate_limit::create_public_governor;
use crate::middleware::user_rate_limit::create_user_governor;
use crate::AppState;

pub fn create_router(state: AppState) -> Router {
    // Public routes, limited per IP
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/check", get(auth::check_availability))
        .route("/auth/password/otp", post(auth::request_password_reset))
        .route("/auth/password/reset", post(auth::reset_password))
        .route("/rides", get(rides::list_rides))
        .route("/rides/search", get(rides::search_rides))
        .route("/rides/{id}", get(rides::get_ride))
        .route("/users/{id}", get(profile::public_profile))
        .route("/users/{id}/reviews", get(profile::reviews))
        .route("/otp/verify", post(otp::verify_ride_otp))
        .layer(create_public_governor());

    // Authenticated routes, limited per user. Ownership is checked by the
    // services, so drivers and passengers share one router.
    let user_routes = Router::new()
        // Rides offered by the caller
        .route("/rides", post(rides::create_ride))
        .route("/rides/mine", get(rides::my_rides))
        .route("/rides/{id}", delete(rides::delete_ride))
        .route("/rides/{id}/start", put(rides::start_ride))
        .route("/rides/{id}/end", put(rides::end_ride))
        .route("/rides/{id}/close", put(rides::close_ride))
        .route("/rides/{id}/requests", get(rides::ride_requests))
        .route("/rides/{id}/comments", get(rides::ride_comments))
        // Bookings
        .route(
            "/bookings",
            post(bookings::create_booking).get(bookings::my_bookings),
        )
        .route("/bookings/{id}", delete(bookings::delete_booking))
        .route("/bookings/{id}/accept", put(bookings::accept_booking))
        .route("/bookings/{id}/reject", put(bookings::reject_booking))
        .route("/bookings/{id}/cancel", put(bookings::cancel_booking))
        .route("/bookings/{id}/rating", post(bookings::rate_booking))
        .route("/bookings/{id}/emergency", post(bookings::emergency_alert))
        // Ride confirmation
        .route("/otp/send", post(otp::send_ride_otp))
        // Own account
        .route(
            "/profile",
            get(profile::me)
                .put(profile::update_me)
                .delete(profile::delete_me),
        )
        .route("/users/search", get(profile::search_users))
        .layer(create_user_governor())
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api", public_routes.merge(user_routes))
        .with_state(state)
}

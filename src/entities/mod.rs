pub mod booking;
pub mod rating;
pub mod ride;
pub mod user;

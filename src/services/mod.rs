pub mod account;
pub mod alert;
pub mod booking;
pub mod mail;
pub mod otp;
pub mod rating;
pub mod ride;

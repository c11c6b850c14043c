pub mod jwt;
pub mod search;

//! Request handlers.

pub mod admin_auth;
pub mod admins;
pub mod audit;
pub mod auth;
pub mod health;
pub mod users;

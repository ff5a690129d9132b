//! Request middleware and extractors.

pub mod actor;
pub mod auth;

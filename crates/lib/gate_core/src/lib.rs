//! # gate_core
//!
//! Authentication core for the gate service: credential store, password
//! hashing, token codec, session issuer, access guard and role gate.

pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod migrate;
pub mod models;
pub mod store;
pub mod uuid;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}

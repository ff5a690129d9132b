//! The admin behind a management request, plus the client details recorded
//! in the audit log.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::HeaderMap;
use axum::http::header::USER_AGENT;
use axum::http::request::Parts;
use gate_core::auth::guard::AdminContext;

use crate::error::AppError;

/// Extracted on routes behind [`super::auth::require_admin`].
#[derive(Debug, Clone)]
pub struct Actor {
    pub admin: AdminContext,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let admin = parts
            .extensions
            .get::<AdminContext>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("Missing authorization header".into()))?;
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());
        Ok(Self {
            admin,
            ip_address: forwarded_ip(&parts.headers).or(peer),
            user_agent: header(&parts.headers, USER_AGENT.as_str()),
        })
    }
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// First hop of `X-Forwarded-For`, else `X-Real-IP`.
fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    header(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string()))
        .filter(|ip| !ip.is_empty())
        .or_else(|| header(headers, "x-real-ip"))
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderValue, Request};
    use gate_core::models::auth::AdminRole;
    use uuid::Uuid;

    use super::*;

    fn admin() -> AdminContext {
        AdminContext {
            id: Uuid::new_v4(),
            username: "root".into(),
            role: AdminRole::Elevated,
        }
    }

    async fn extract(request: Request<()>) -> Result<Actor, AppError> {
        let (mut parts, ()) = request.into_parts();
        Actor::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn prefers_forwarded_ip_over_peer() {
        let mut request = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .header(USER_AGENT, "panel/1.0")
            .body(())
            .unwrap();
        request.extensions_mut().insert(admin());
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 9000))));

        let actor = extract(request).await.unwrap();
        assert_eq!(actor.ip_address.as_deref(), Some("203.0.113.7"));
        assert_eq!(actor.user_agent.as_deref(), Some("panel/1.0"));
    }

    #[tokio::test]
    async fn falls_back_to_real_ip_then_peer() {
        let mut request = Request::builder()
            .header("x-real-ip", HeaderValue::from_static("198.51.100.2"))
            .body(())
            .unwrap();
        request.extensions_mut().insert(admin());
        let actor = extract(request).await.unwrap();
        assert_eq!(actor.ip_address.as_deref(), Some("198.51.100.2"));

        let mut request = Request::builder().body(()).unwrap();
        request.extensions_mut().insert(admin());
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 9000))));
        let actor = extract(request).await.unwrap();
        assert_eq!(actor.ip_address.as_deref(), Some("127.0.0.1"));
        assert!(actor.user_agent.is_none());
    }

    #[tokio::test]
    async fn requires_admin_guard() {
        let request = Request::builder().body(()).unwrap();
        assert!(matches!(extract(request).await, Err(AppError::Unauthorized(_))));
    }
}

//! API Middleware
//!
//! Identity resolution, auth enforcement, rate limiting, and request
//! logging, grounded on the teacher's `auth_middleware` /
//! `rate_limit_middleware` / `mask_headers_for_logging` / `logging_middleware`
//! shape in the same file, generalized from a single "every route requires
//! an API key" policy to the spec's optional-vs-required split (§6).

use std::net::IpAddr;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

use super::state::AppState;
use crate::domain::OperationContext;
use crate::identity::Principal;

/// The resolved identity for this request, inserted by `identify_middleware`
/// whether or not a credential was presented. Distinct from
/// `OperationContext` (which also carries correlation id / client ip)
/// so handlers that only care about the principal's permissions don't have
/// to unpack the whole context.
#[derive(Debug, Clone)]
pub struct AuthenticatedPrincipal(pub Option<Principal>);

impl AuthenticatedPrincipal {
    pub fn principal_id(&self) -> Option<Uuid> {
        self.0.as_ref().map(|p| p.principal_id)
    }

    pub fn is_elevated(&self) -> bool {
        self.0.as_ref().map(|p| p.is_elevated()).unwrap_or(false)
    }
}

/// Extract a bearer credential from either `Authorization: Bearer <token>`
/// or the teacher's `X-API-Key` header (accepted as an alias so existing
/// API-key-issued clients keep working).
fn extract_credential(headers: &HeaderMap) -> Option<&str> {
    if let Some(value) = headers.get(axum::http::header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        if let Some(token) = value.strip_prefix("Bearer ") {
            return Some(token);
        }
    }
    headers.get("X-API-Key").and_then(|v| v.to_str().ok())
}

/// Resolve whatever credential is present into a `Principal`, and always
/// attach an `OperationContext` + `AuthenticatedPrincipal`, anonymous if no
/// credential was presented or it didn't resolve. This middleware never
/// fails the request; `require_auth` is the layer that turns "anonymous" into
/// a 401 for routes that need it.
pub async fn identify_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<std::net::SocketAddr>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let principal = match extract_credential(&headers) {
        Some(raw) => state.identity.resolve(raw).await.ok(),
        None => None,
    };

    let correlation_id = headers
        .get("X-Correlation-Id")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);

    let client_ip: IpAddr = addr.ip();

    let mut context = OperationContext::new()
        .with_correlation_id(correlation_id)
        .with_client_ip(client_ip);

    if let Some(ref p) = principal {
        context = context
            .with_api_key(p.api_key_id)
            .with_principal(p.principal_id)
            .with_elevated(p.is_elevated());
    }

    request.extensions_mut().insert(context);
    request.extensions_mut().insert(AuthenticatedPrincipal(principal));

    next.run(request).await
}

/// Reject anonymous requests with 401. Layered only on the routes marked
/// "required" in §6; routes marked "optional" only go through
/// `identify_middleware`.
pub async fn require_auth(request: Request<Body>, next: Next) -> Result<Response, Response> {
    let is_anonymous = request
        .extensions()
        .get::<AuthenticatedPrincipal>()
        .map(|p| p.0.is_none())
        .unwrap_or(true);

    if is_anonymous {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "success": false,
                "message": "a valid bearer credential is required for this endpoint"
            })),
        )
            .into_response());
    }

    Ok(next.run(request).await)
}

// =========================================================================
// Rate Limiting Middleware
// =========================================================================

/// Keyed by principal when authenticated, by client IP otherwise, mirroring
/// the teacher's `check_and_increment_rate_limit` bucket function but
/// generalized to accept an anonymous key.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let (bucket_key, limit) = match request.extensions().get::<AuthenticatedPrincipal>() {
        Some(AuthenticatedPrincipal(Some(principal))) => {
            (principal.api_key_id.to_string(), state.config.rate_limit_per_minute)
        }
        _ => {
            let ip = request
                .extensions()
                .get::<OperationContext>()
                .and_then(|ctx| ctx.client_ip)
                .map(|ip| ip.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            (format!("anon:{ip}"), state.config.rate_limit_per_minute)
        }
    };

    let allowed: bool = match sqlx::query_scalar(r#"SELECT check_and_increment_rate_limit($1, $2)"#)
        .bind(&bucket_key)
        .bind(limit)
        .fetch_one(state.store.pool())
        .await
    {
        Ok(result) => result,
        Err(e) => {
            tracing::error!("Rate limit check error: {}", e);
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "message": "rate limit check failed"
                })),
            )
                .into_response());
        }
    };

    if !allowed {
        return Err((
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "success": false,
                "message": "rate limit exceeded"
            })),
        )
            .into_response());
    }

    Ok(next.run(request).await)
}

// =========================================================================
// Request Logging
// =========================================================================

const SENSITIVE_HEADERS: &[&str] = &["x-api-key", "authorization", "cookie", "set-cookie"];

/// Mask sensitive headers for logging.
pub fn mask_headers_for_logging(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let name_lower = name.as_str().to_lowercase();
            let masked_value = if SENSITIVE_HEADERS.contains(&name_lower.as_str()) {
                "[REDACTED]".to_string()
            } else {
                value.to_str().unwrap_or("[invalid utf8]").to_string()
            };
            (name.to_string(), masked_value)
        })
        .collect()
}

/// Request logging middleware: logs method/uri/status/duration/correlation
/// id, masking sensitive headers before they reach the log.
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let headers = mask_headers_for_logging(request.headers());
    let correlation_id = request
        .extensions()
        .get::<OperationContext>()
        .and_then(|ctx| ctx.correlation_id);

    let start = std::time::Instant::now();

    tracing::info!(
        method = %method,
        uri = %uri,
        headers = ?headers,
        correlation_id = ?correlation_id,
        "Incoming request"
    );

    let response = next.run(request).await;

    let duration = start.elapsed();
    let status = response.status();

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %status,
        duration_ms = %duration.as_millis(),
        correlation_id = ?correlation_id,
        "Request completed"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_headers_for_logging() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", "application/json".parse().unwrap());
        headers.insert("x-api-key", "secret-key-12345".parse().unwrap());
        headers.insert("x-request-user-id", "user-123".parse().unwrap());

        let masked = mask_headers_for_logging(&headers);

        let api_key = masked.iter().find(|(k, _)| k == "x-api-key");
        let content_type = masked.iter().find(|(k, _)| k == "content-type");
        let user_id = masked.iter().find(|(k, _)| k == "x-request-user-id");

        assert_eq!(api_key.unwrap().1, "[REDACTED]");
        assert_eq!(content_type.unwrap().1, "application/json");
        assert_eq!(user_id.unwrap().1, "user-123");
    }

    #[test]
    fn test_sensitive_headers_list() {
        assert!(SENSITIVE_HEADERS.contains(&"x-api-key"));
        assert!(SENSITIVE_HEADERS.contains(&"authorization"));
        assert!(!SENSITIVE_HEADERS.contains(&"content-type"));
    }

    #[test]
    fn test_extract_credential_prefers_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::AUTHORIZATION, "Bearer abc123".parse().unwrap());
        headers.insert("X-API-Key", "other".parse().unwrap());
        assert_eq!(extract_credential(&headers), Some("abc123"));
    }

    #[test]
    fn test_extract_credential_falls_back_to_api_key_header() {
        let mut headers = HeaderMap::new();
        headers.insert("X-API-Key", "evt_live_abc".parse().unwrap());
        assert_eq!(extract_credential(&headers), Some("evt_live_abc"));
    }

    #[test]
    fn test_extract_credential_absent() {
        let headers = HeaderMap::new();
        assert_eq!(extract_credential(&headers), None);
    }
}

//! # Identity Resolution
//!
//! Maps the bearer credential issued by the external auth provider to a
//! [`Subject`], and exposes the request extractors used by handlers.
//! Every failure resolves to "unauthenticated"; there is no anonymous or
//! wildcard identity.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use sea_orm::{ConnectionTrait, DbErr};
use serde::Deserialize;
use thiserror::Error;

use crate::config::AuthConfig;
use crate::error::{ApiError, CoreError, unauthorized};
use crate::models::profile;
use crate::repositories::ProfileRepository;
use crate::server::AppState;

/// Authenticated external subject. Never blank.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subject(String);

impl Subject {
    /// Returns `None` for empty or whitespace-only input.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else if trimmed.len() == raw.len() {
            Some(Self(raw))
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Rate-limit key for authenticated endpoints
    pub fn caller_key(&self) -> String {
        format!("subject:{}", self.0)
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("missing credential")]
    MissingCredential,
    #[error("credential must use the Bearer scheme")]
    InvalidScheme,
    #[error("credential rejected: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
    #[error("credential carries no subject")]
    MissingSubject,
    #[error("credential verification is not configured")]
    NotConfigured,
}

impl From<IdentityError> for CoreError {
    fn from(_: IdentityError) -> Self {
        CoreError::Unauthenticated
    }
}

#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    sub: Option<String>,
}

/// Verifies HS256 bearer tokens issued by the auth provider.
#[derive(Clone)]
pub struct IdentityResolver {
    key: Option<DecodingKey>,
    validation: Validation,
}

impl std::fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityResolver")
            .field("configured", &self.key.is_some())
            .finish()
    }
}

impl IdentityResolver {
    pub fn from_config(config: &AuthConfig) -> Self {
        let key = config
            .jwt_secret
            .as_deref()
            .filter(|secret| !secret.trim().is_empty())
            .map(|secret| DecodingKey::from_secret(secret.as_bytes()));

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = config.leeway_seconds;
        validation.set_required_spec_claims(&["exp", "sub"]);
        if let Some(ref issuer) = config.jwt_issuer {
            validation.set_issuer(&[issuer]);
        }
        match config.jwt_audience {
            Some(ref audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        if key.is_none() {
            tracing::warn!("No JWT secret configured; every bearer credential will be rejected");
        }

        Self { key, validation }
    }

    /// Resolves the raw `Authorization` header value to a subject.
    pub fn resolve_identity(&self, credential: Option<&str>) -> Result<Subject, IdentityError> {
        let credential = credential
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(IdentityError::MissingCredential)?;

        let token = credential
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(IdentityError::InvalidScheme)?;

        let key = self.key.as_ref().ok_or(IdentityError::NotConfigured)?;
        let data = decode::<Claims>(token, key, &self.validation)?;

        data.claims
            .sub
            .and_then(Subject::new)
            .ok_or(IdentityError::MissingSubject)
    }

    pub fn resolve_from_headers(&self, headers: &HeaderMap) -> Result<Subject, IdentityError> {
        let credential = match headers.get(AUTHORIZATION) {
            Some(value) => Some(value.to_str().map_err(|_| IdentityError::InvalidScheme)?),
            None => None,
        };
        self.resolve_identity(credential)
    }
}

/// Maps a subject to its profile, if one exists yet.
pub async fn resolve_profile<C: ConnectionTrait>(
    db: &C,
    subject: &Subject,
) -> Result<Option<profile::Model>, DbErr> {
    ProfileRepository::new(db).find_by_subject(subject).await
}

/// Subject resolved by [`require_subject`] for the current request.
#[derive(Debug, Clone)]
pub struct AuthenticatedSubject(pub Subject);

/// Middleware that rejects requests without a valid bearer credential.
pub async fn require_subject(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    match state.identity.resolve_from_headers(request.headers()) {
        Ok(subject) => {
            request
                .extensions_mut()
                .insert(AuthenticatedSubject(subject));
            Ok(next.run(request).await)
        }
        Err(err) => {
            tracing::info!(
                reason = %err,
                path = %request.uri().path(),
                "Rejected unauthenticated request"
            );
            Err(unauthorized(None))
        }
    }
}

impl<S> FromRequestParts<S> for AuthenticatedSubject
where
    S: Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedSubject>()
            .cloned()
            .ok_or_else(|| unauthorized(None))
    }
}

/// Network-level identifier for unauthenticated callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientKey(pub String);

impl ClientKey {
    pub fn from_parts(headers: &HeaderMap, peer: Option<SocketAddr>) -> Self {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty());

        let real_ip = headers
            .get("x-real-ip")
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty());

        let key = forwarded
            .or(real_ip)
            .map(str::to_string)
            .or_else(|| peer.map(|addr| addr.ip().to_string()))
            .unwrap_or_else(|| "unknown".to_string());

        Self(format!("client:{key}"))
    }
}

impl<S> FromRequestParts<S> for ClientKey
where
    S: Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0);
        Ok(ClientKey::from_parts(&parts.headers, peer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::json;

    const SECRET: &str = "unit-test-secret";

    fn resolver() -> IdentityResolver {
        IdentityResolver::from_config(&AuthConfig {
            jwt_secret: Some(SECRET.to_string()),
            ..Default::default()
        })
    }

    fn token(claims: serde_json::Value) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn in_one_hour() -> i64 {
        chrono::Utc::now().timestamp() + 3600
    }

    #[test]
    fn subject_rejects_blank_input() {
        assert!(Subject::new("").is_none());
        assert!(Subject::new("   ").is_none());
        assert_eq!(Subject::new(" user-1 ").unwrap().as_str(), "user-1");
    }

    #[test]
    fn valid_token_yields_subject() {
        let credential = format!("Bearer {}", token(json!({"sub": "user-1", "exp": in_one_hour()})));
        let subject = resolver().resolve_identity(Some(&credential)).unwrap();
        assert_eq!(subject.as_str(), "user-1");
    }

    #[test]
    fn missing_or_malformed_credentials_are_rejected() {
        let resolver = resolver();
        assert!(matches!(
            resolver.resolve_identity(None),
            Err(IdentityError::MissingCredential)
        ));
        assert!(matches!(
            resolver.resolve_identity(Some("Basic abc")),
            Err(IdentityError::InvalidScheme)
        ));
        assert!(matches!(
            resolver.resolve_identity(Some("Bearer not-a-jwt")),
            Err(IdentityError::InvalidToken(_))
        ));
    }

    #[test]
    fn blank_subject_is_unauthenticated() {
        let credential = format!("Bearer {}", token(json!({"sub": "  ", "exp": in_one_hour()})));
        assert!(matches!(
            resolver().resolve_identity(Some(&credential)),
            Err(IdentityError::MissingSubject)
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let expired = chrono::Utc::now().timestamp() - 3600;
        let credential = format!("Bearer {}", token(json!({"sub": "user-1", "exp": expired})));
        assert!(resolver().resolve_identity(Some(&credential)).is_err());
    }

    #[test]
    fn wrong_signature_is_rejected() {
        let forged = encode(
            &Header::new(Algorithm::HS256),
            &json!({"sub": "user-1", "exp": in_one_hour()}),
            &EncodingKey::from_secret(b"someone-else"),
        )
        .unwrap();
        let credential = format!("Bearer {forged}");
        assert!(resolver().resolve_identity(Some(&credential)).is_err());
    }

    #[test]
    fn unconfigured_resolver_rejects_everything() {
        let resolver = IdentityResolver::from_config(&AuthConfig::default());
        let credential = format!("Bearer {}", token(json!({"sub": "user-1", "exp": in_one_hour()})));
        assert!(matches!(
            resolver.resolve_identity(Some(&credential)),
            Err(IdentityError::NotConfigured)
        ));
    }

    #[test]
    fn issuer_is_enforced_when_configured() {
        let resolver = IdentityResolver::from_config(&AuthConfig {
            jwt_secret: Some(SECRET.to_string()),
            jwt_issuer: Some("https://auth.example.com".to_string()),
            ..Default::default()
        });
        let credential = format!(
            "Bearer {}",
            token(json!({"sub": "user-1", "exp": in_one_hour(), "iss": "https://evil.example"}))
        );
        assert!(resolver.resolve_identity(Some(&credential)).is_err());
    }

    #[test]
    fn client_key_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        headers.insert("x-real-ip", "198.51.100.2".parse().unwrap());
        assert_eq!(ClientKey::from_parts(&headers, None).0, "client:203.0.113.7");

        headers.remove("x-forwarded-for");
        assert_eq!(ClientKey::from_parts(&headers, None).0, "client:198.51.100.2");

        let peer: SocketAddr = "192.0.2.1:5555".parse().unwrap();
        assert_eq!(
            ClientKey::from_parts(&HeaderMap::new(), Some(peer)).0,
            "client:192.0.2.1"
        );
        assert_eq!(ClientKey::from_parts(&HeaderMap::new(), None).0, "client:unknown");
    }

    mod middleware {
        use super::*;
        use axum::{
            Router,
            body::Body,
            http::{Request, StatusCode},
            routing::get,
        };
        use tower::ServiceExt;

        use crate::config::AppConfig;

        async fn run_middleware(request: Request<Body>) -> Response {
            async fn handler(AuthenticatedSubject(subject): AuthenticatedSubject) -> String {
                subject.to_string()
            }

            let config = AppConfig {
                auth: AuthConfig {
                    jwt_secret: Some(SECRET.to_string()),
                    ..Default::default()
                },
                ..Default::default()
            };
            let state = AppState::new(config, sea_orm::DatabaseConnection::default())
                .expect("state builds");

            Router::new()
                .route("/test", get(handler))
                .route_layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    require_subject,
                ))
                .with_state(state)
                .oneshot(request)
                .await
                .unwrap()
        }

        #[tokio::test]
        async fn missing_auth_header_returns_401() {
            let request = Request::builder().uri("/test").body(Body::empty()).unwrap();
            let response = run_middleware(request).await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }

        #[tokio::test]
        async fn invalid_auth_scheme_returns_401() {
            let request = Request::builder()
                .uri("/test")
                .header(AUTHORIZATION, "Basic dXNlcjpwYXNz")
                .body(Body::empty())
                .unwrap();
            let response = run_middleware(request).await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }

        #[tokio::test]
        async fn valid_token_reaches_handler_with_subject() {
            let credential = format!("Bearer {}", token(json!({"sub": "user-1", "exp": in_one_hour()})));
            let request = Request::builder()
                .uri("/test")
                .header(AUTHORIZATION, credential)
                .body(Body::empty())
                .unwrap();
            let response = run_middleware(request).await;
            assert_eq!(response.status(), StatusCode::OK);

            let body = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            assert_eq!(&body[..], b"user-1");
        }
    }
}

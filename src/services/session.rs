//! Caller identity
//!
//! Authentication itself happens elsewhere. These resolvers only turn what the
//! upstream auth layer left on the request into a user id.

use std::time::Duration;

use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use reqwest::Client as HttpClient;
use serde::Deserialize;

use crate::{
    error::{AppError, AppResult},
    models::UserId,
};

/// Header carrying the caller's id when a trusted gateway sits in front
pub const USER_ID_HEADER: &str = "x-user-id";

#[async_trait::async_trait]
pub trait SessionResolver: Send + Sync {
    /// Returns the caller's id, or `None` when the request carries no valid session
    async fn resolve(&self, headers: &HeaderMap) -> AppResult<Option<UserId>>;
}

/// Takes the user id verbatim from `x-user-id`
pub struct TrustedHeaderResolver;

#[async_trait::async_trait]
impl SessionResolver for TrustedHeaderResolver {
    async fn resolve(&self, headers: &HeaderMap) -> AppResult<Option<UserId>> {
        Ok(headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(UserId::new))
    }
}

/// Validates the bearer token against an OIDC userinfo endpoint
pub struct UserInfoResolver {
    http_client: HttpClient,
    userinfo_url: String,
}

#[derive(Deserialize)]
struct UserInfo {
    sub: String,
}

impl UserInfoResolver {
    /// `timeout` bounds the whole userinfo round trip
    pub fn new(userinfo_url: String, timeout: Duration) -> AppResult<Self> {
        let http_client = HttpClient::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            userinfo_url,
        })
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[async_trait::async_trait]
impl SessionResolver for UserInfoResolver {
    async fn resolve(&self, headers: &HeaderMap) -> AppResult<Option<UserId>> {
        let Some(token) = bearer_token(headers) else {
            return Ok(None);
        };

        let response = self
            .http_client
            .get(&self.userinfo_url)
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status == StatusCode::UNAUTHORIZED.as_u16() || status == StatusCode::FORBIDDEN.as_u16() {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(AppError::Internal(format!(
                "Userinfo endpoint returned status {}",
                status
            )));
        }

        let info: UserInfo = response.json().await?;
        Ok(Some(UserId::new(info.sub)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[tokio::test]
    async fn test_trusted_header() {
        let resolver = TrustedHeaderResolver;

        let user = resolver
            .resolve(&headers(&[(USER_ID_HEADER, " auth0|abc ")]))
            .await
            .unwrap();
        assert_eq!(user, Some(UserId::new("auth0|abc")));

        assert_eq!(resolver.resolve(&HeaderMap::new()).await.unwrap(), None);
        assert_eq!(
            resolver.resolve(&headers(&[(USER_ID_HEADER, "  ")])).await.unwrap(),
            None
        );
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&headers(&[("authorization", "Bearer t0k")])), Some("t0k"));
        assert_eq!(bearer_token(&headers(&[("authorization", "Basic abc")])), None);
        assert_eq!(bearer_token(&headers(&[("authorization", "Bearer ")])), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    fn resolver_for(server: &MockServer) -> UserInfoResolver {
        UserInfoResolver::new(format!("{}/userinfo", server.uri()), Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn test_userinfo_subject_becomes_user_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .and(header("authorization", "Bearer good"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "sub": "auth0|99" })),
            )
            .mount(&server)
            .await;

        let resolver = resolver_for(&server);
        let user = resolver
            .resolve(&headers(&[("authorization", "Bearer good")]))
            .await
            .unwrap();
        assert_eq!(user, Some(UserId::new("auth0|99")));
    }

    #[tokio::test]
    async fn test_userinfo_rejection_is_unauthenticated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let resolver = resolver_for(&server);
        let user = resolver
            .resolve(&headers(&[("authorization", "Bearer expired")]))
            .await
            .unwrap();
        assert_eq!(user, None);
    }

    #[tokio::test]
    async fn test_userinfo_outage_is_internal_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let resolver = resolver_for(&server);
        let err = resolver
            .resolve(&headers(&[("authorization", "Bearer any")]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[tokio::test]
    async fn test_hung_userinfo_endpoint_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "sub": "late" }))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let resolver = UserInfoResolver::new(
            format!("{}/userinfo", server.uri()),
            Duration::from_millis(100),
        )
        .unwrap();

        let started = std::time::Instant::now();
        let err = resolver
            .resolve(&headers(&[("authorization", "Bearer any")]))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::HttpClient(ref e) if e.is_timeout()));
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}

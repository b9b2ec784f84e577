//! services/api/src/web/middleware.rs
//!
//! Identity middleware. Sign-in is handled by an upstream identity provider that
//! forwards the user's id, name and avatar as request headers.

use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use rc_practice_core::domain::{UserId, UserProfile};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_NAME_HEADER: &str = "x-user-name";
pub const USER_AVATAR_HEADER: &str = "x-user-avatar";

/// The caller's identity, or `None` for an anonymous visitor.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Identity(pub Option<UserProfile>);

/// Middleware that reads the identity headers into an `Identity` request extension.
///
/// Anonymous requests are let through; handlers that need a user check for one.
pub async fn identify(mut req: Request, next: Next) -> Response {
    let identity = identity_from_headers(req.headers());
    req.extensions_mut().insert(identity);
    next.run(req).await
}

pub fn identity_from_headers(headers: &HeaderMap) -> Identity {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let profile = header(USER_ID_HEADER).map(|id| UserProfile {
        user_id: UserId::new(id),
        display_name: header(USER_NAME_HEADER),
        avatar_url: header(USER_AVATAR_HEADER),
    });
    Identity(profile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn reads_profile_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("uid-1"));
        headers.insert(USER_NAME_HEADER, HeaderValue::from_static("Asha"));

        let Identity(profile) = identity_from_headers(&headers);
        let profile = profile.unwrap();
        assert_eq!(profile.user_id.as_str(), "uid-1");
        assert_eq!(profile.display_name.as_deref(), Some("Asha"));
        assert_eq!(profile.avatar_url, None);
    }

    #[test]
    fn missing_or_blank_id_is_anonymous() {
        assert_eq!(identity_from_headers(&HeaderMap::new()), Identity(None));

        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("   "));
        headers.insert(USER_NAME_HEADER, HeaderValue::from_static("Asha"));
        assert_eq!(identity_from_headers(&headers), Identity(None));
    }
}

//! Session token cookies.
//!
//! The provider token pair rides in two `HttpOnly` cookies. These helpers are
//! the only place cookie names and attributes are spelled out; the guard and
//! the auth routes both go through them.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;

use crate::identity::ProviderSession;
use crate::session::SessionTokens;

/// Cookie carrying the provider access token.
pub const ACCESS_COOKIE: &str = "af-access-token";

/// Cookie carrying the provider refresh token.
pub const REFRESH_COOKIE: &str = "af-refresh-token";

/// Refresh cookie lifetime. The access cookie follows the token's own
/// `expires_in`; the refresh cookie outlives it so recovery has something to
/// work with.
const REFRESH_COOKIE_DAYS: i64 = 30;

/// Read the token pair off a request's cookie jar.
#[must_use]
pub fn session_tokens(jar: &CookieJar) -> SessionTokens {
    SessionTokens {
        access: jar.get(ACCESS_COOKIE).map(|c| c.value().to_owned()),
        refresh: jar.get(REFRESH_COOKIE).map(|c| c.value().to_owned()),
    }
}

/// Build the cookie pair for a freshly minted provider session.
#[must_use]
pub fn session_cookies(
    session: &ProviderSession,
    secure: bool,
) -> (Cookie<'static>, Cookie<'static>) {
    let access = Cookie::build((ACCESS_COOKIE, session.access_token.clone()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(Duration::seconds(
            i64::try_from(session.expires_in).unwrap_or(3600),
        ))
        .build();

    let refresh = Cookie::build((REFRESH_COOKIE, session.refresh_token.clone()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(Duration::days(REFRESH_COOKIE_DAYS))
        .build();

    (access, refresh)
}

/// Build removal cookies for logout.
#[must_use]
pub fn clear_session_cookies() -> (Cookie<'static>, Cookie<'static>) {
    let access = Cookie::build((ACCESS_COOKIE, ""))
        .path("/")
        .max_age(Duration::ZERO)
        .build();

    let refresh = Cookie::build((REFRESH_COOKIE, ""))
        .path("/")
        .max_age(Duration::ZERO)
        .build();

    (access, refresh)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use armorfloor_core::Email;

    use super::*;
    use crate::identity::Identity;

    fn provider_session() -> ProviderSession {
        ProviderSession {
            access_token: "access-value".to_owned(),
            refresh_token: "refresh-value".to_owned(),
            expires_in: 3600,
            user: Identity {
                id: uuid::Uuid::nil().into(),
                email: Email::parse("crew@armorfloorsystems.com").unwrap(),
            },
        }
    }

    #[test]
    fn test_session_tokens_reads_both_cookies() {
        let jar = CookieJar::new()
            .add(Cookie::new(ACCESS_COOKIE, "a"))
            .add(Cookie::new(REFRESH_COOKIE, "r"));

        let tokens = session_tokens(&jar);
        assert_eq!(tokens.access.as_deref(), Some("a"));
        assert_eq!(tokens.refresh.as_deref(), Some("r"));
    }

    #[test]
    fn test_session_tokens_tolerates_missing_cookies() {
        let tokens = session_tokens(&CookieJar::new());
        assert!(tokens.access.is_none());
        assert!(tokens.refresh.is_none());
    }

    #[test]
    fn test_session_cookies_are_http_only() {
        let (access, refresh) = session_cookies(&provider_session(), true);
        assert_eq!(access.http_only(), Some(true));
        assert_eq!(refresh.http_only(), Some(true));
        assert_eq!(access.secure(), Some(true));
        assert_eq!(access.value(), "access-value");
    }

    #[test]
    fn test_clear_cookies_have_zero_max_age() {
        let (access, refresh) = clear_session_cookies();
        assert_eq!(access.max_age(), Some(Duration::ZERO));
        assert_eq!(refresh.max_age(), Some(Duration::ZERO));
        assert_eq!(access.value(), "");
    }
}

use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{DateTime, Utc};
use gatehouse_adapters::config::{
    FLOW_COOKIE_TTL_SECONDS, PREFERRED_METHOD_COOKIE, PREFERRED_METHOD_TTL_DAYS, SESSION_COOKIE,
};
use gatehouse_core::SessionToken;

fn base_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, value);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_secure(secure);
    cookie.set_same_site(SameSite::Lax);
    cookie
}

/// The session bearer cookie; its lifetime tracks the session's sliding
/// expiry.
pub fn session_cookie(
    token: &SessionToken,
    expires_at: DateTime<Utc>,
    secure: bool,
) -> Cookie<'static> {
    let mut cookie = base_cookie(SESSION_COOKIE, token.as_str().to_string(), secure);
    let remaining = (expires_at - Utc::now()).num_seconds().max(0);
    cookie.set_max_age(time::Duration::seconds(remaining));
    cookie
}

/// Short-lived, flow-scoped state: post-login redirect target, OAuth CSRF
/// state, PKCE verifier.
pub fn flow_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    let mut cookie = base_cookie(name, value, secure);
    cookie.set_max_age(time::Duration::seconds(FLOW_COOKIE_TTL_SECONDS));
    cookie
}

/// Remembers which sign-in method worked last, for the login page.
pub fn preferred_method_cookie(method: &'static str, secure: bool) -> Cookie<'static> {
    let mut cookie = base_cookie(PREFERRED_METHOD_COOKIE, method.to_string(), secure);
    cookie.set_max_age(time::Duration::days(PREFERRED_METHOD_TTL_DAYS));
    cookie
}

/// An expired twin of `name`, for removal.
pub fn removal_cookie(name: &'static str, secure: bool) -> Cookie<'static> {
    let mut cookie = base_cookie(name, String::new(), secure);
    cookie.set_max_age(time::Duration::ZERO);
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_is_scoped_and_http_only() {
        let token = SessionToken::generate();
        let cookie = session_cookie(&token, Utc::now() + chrono::Duration::days(30), true);

        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.value(), token.as_str());
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        let max_age = cookie.max_age().unwrap();
        assert!(max_age > time::Duration::days(29));
        assert!(max_age <= time::Duration::days(30));
    }

    #[test]
    fn flow_cookie_expires_within_ten_minutes() {
        let cookie = flow_cookie("oauth_google_state", "state".to_string(), false);
        assert_eq!(cookie.max_age(), Some(time::Duration::minutes(10)));
        assert_eq!(cookie.secure(), Some(false));
    }

    #[test]
    fn removal_cookie_zeroes_the_value() {
        let cookie = removal_cookie(SESSION_COOKIE, true);
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(time::Duration::ZERO));
    }
}

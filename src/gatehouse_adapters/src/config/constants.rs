// Cache key prefixes to prevent collisions and organize data.
pub const SESSION_KEY_PREFIX: &str = "session:";
pub const VERIFICATION_KEY_PREFIX: &str = "verification:";
pub const RATE_LIMIT_KEY_PREFIX: &str = "ratelimit:";

// Cookie names shared between the transport layer and the flows that set
// them.
pub const SESSION_COOKIE: &str = "session";
pub const REDIRECT_COOKIE: &str = "redirect_uri";
pub const PREFERRED_METHOD_COOKIE: &str = "auth_preferred_method";
pub const OAUTH_GOOGLE_STATE_COOKIE: &str = "oauth_google_state";
pub const OAUTH_GOOGLE_VERIFIER_COOKIE: &str = "oauth_google_verifier";
pub const OAUTH_LINKEDIN_STATE_COOKIE: &str = "oauth_linkedin_state";

/// Flow-scoped cookies (redirect target, OAuth state, PKCE verifier) live
/// just long enough to complete one login round-trip.
pub const FLOW_COOKIE_TTL_SECONDS: i64 = 60 * 10;
pub const PREFERRED_METHOD_TTL_DAYS: i64 = 365;

// Post-authentication redirect targets.
pub const DEFAULT_REDIRECT: &str = "/app";
pub const LOGIN_REDIRECT: &str = "/login";
pub const ONBOARDING_REDIRECT: &str = "/onboarding";
pub const TWO_FACTOR_REDIRECT: &str = "/two-factor/verify";

/// Named token-bucket configuration for one guarded endpoint family.
#[derive(Debug, Clone, Copy)]
pub struct LimiterConfig {
    pub namespace: &'static str,
    pub max: u32,
    pub refill_interval_seconds: u64,
}

pub const OTP_LOGIN_LIMITER: LimiterConfig = LimiterConfig {
    namespace: "otp_login_requests",
    max: 5,
    refill_interval_seconds: 60,
};

pub const GOOGLE_OAUTH_LIMITER: LimiterConfig = LimiterConfig {
    namespace: "oauth2_google_requests",
    max: 10,
    refill_interval_seconds: 60,
};

pub const LINKEDIN_OAUTH_LIMITER: LimiterConfig = LimiterConfig {
    namespace: "oauth2_linkedin_requests",
    max: 10,
    refill_interval_seconds: 60,
};

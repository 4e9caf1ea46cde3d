use std::sync::Arc;

use axum::Router;
use axum_extra::extract::cookie::Key;
use color_eyre::eyre::WrapErr;
use gatehouse_adapters::{
    MIGRATOR,
    config::{
        GOOGLE_OAUTH_LIMITER, LINKEDIN_OAUTH_LIMITER, OTP_LOGIN_LIMITER, Settings,
    },
    email::MockEmailClient,
    oauth::{GoogleProvider, LinkedinProvider},
    persistence::{
        HashMapSessionStore, HashMapUserStore, HashMapVerificationCodeStore, InMemoryRateLimiter,
        PostgresUserStore, RedisRateLimiter, RedisSessionStore, RedisVerificationCodeStore,
    },
    sms::MockSmsClient,
    two_factor::{ChaChaSecretCipher, TotpEngine},
};
use gatehouse_axum::AuthState;
use gatehouse_core::OAuthProvider;
use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use crate::tracing::{make_span_with_request_id, on_request, on_response};

/// Main authentication service: the composed router over a fully wired
/// [`AuthState`].
pub struct AuthService {
    router: Router,
}

impl AuthService {
    pub fn new(state: AuthState) -> Self {
        Self {
            router: gatehouse_axum::router().with_state(state),
        }
    }

    pub fn with_trace_layer(mut self) -> Self {
        self.router = self.router.layer(
            TraceLayer::new_for_http()
                .make_span_with(make_span_with_request_id)
                .on_request(on_request)
                .on_response(on_response),
        );
        self
    }

    /// The router, for nesting under an application router.
    pub fn into_router(self) -> Router {
        self.router
    }

    pub async fn serve(self, listener: TcpListener) -> std::io::Result<()> {
        axum::serve(listener, self.router).await
    }
}

/// Opens the shared Redis connection. Constructed once at startup and
/// injected; components never reach for a global client.
pub fn configure_redis(url: &str) -> color_eyre::Result<Arc<RwLock<redis::Connection>>> {
    let client = redis::Client::open(url).wrap_err("parsing redis url")?;
    let conn = client
        .get_connection()
        .wrap_err("connecting to redis")?;
    Ok(Arc::new(RwLock::new(conn)))
}

/// Connects the Postgres pool and applies pending migrations.
pub async fn configure_postgresql(url: &str) -> color_eyre::Result<sqlx::PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(16)
        .connect(url)
        .await
        .wrap_err("connecting to postgres")?;
    MIGRATOR.run(&pool).await.wrap_err("running migrations")?;
    Ok(pool)
}

/// Wires the production state: Redis-backed session/verification/rate-limit
/// stores and the Postgres user store.
pub async fn build_state(settings: &Settings) -> color_eyre::Result<AuthState> {
    let redis_conn = configure_redis(&settings.redis_url)?;
    let pool = configure_postgresql(settings.database_url.expose_secret()).await?;

    let cipher = Arc::new(ChaChaSecretCipher::new(&settings.sealing_key()?));
    let cookie_key = Key::from(&settings.cookie_signing_key()?);

    let google = settings
        .oauth
        .google
        .as_ref()
        .map(|s| Arc::new(GoogleProvider::new(s)) as Arc<dyn OAuthProvider>);
    let linkedin = settings
        .oauth
        .linkedin
        .as_ref()
        .map(|s| Arc::new(LinkedinProvider::new(s)) as Arc<dyn OAuthProvider>);

    Ok(AuthState {
        sessions: Arc::new(RedisSessionStore::new(redis_conn.clone())),
        codes: Arc::new(RedisVerificationCodeStore::new(redis_conn.clone())),
        users: Arc::new(PostgresUserStore::new(pool, cipher.clone())),
        otp_limiter: Arc::new(RedisRateLimiter::new(redis_conn.clone(), OTP_LOGIN_LIMITER)),
        google_limiter: Arc::new(RedisRateLimiter::new(
            redis_conn.clone(),
            GOOGLE_OAUTH_LIMITER,
        )),
        linkedin_limiter: Arc::new(RedisRateLimiter::new(redis_conn, LINKEDIN_OAUTH_LIMITER)),
        google,
        linkedin,
        email: Arc::new(MockEmailClient::new()),
        sms: Arc::new(MockSmsClient::new()),
        totp: Arc::new(TotpEngine::new(settings.totp_issuer.clone())),
        cipher,
        app_name: settings.app_name.clone(),
        secure_cookies: settings.environment.is_production(),
        cookie_key,
    })
}

/// Fully in-memory state for development and integration tests.
pub fn in_memory_state(app_name: &str) -> AuthState {
    let cipher = Arc::new(ChaChaSecretCipher::new(&[7u8; 32]));

    AuthState {
        sessions: Arc::new(HashMapSessionStore::new()),
        codes: Arc::new(HashMapVerificationCodeStore::new()),
        users: Arc::new(HashMapUserStore::new(cipher.clone())),
        otp_limiter: Arc::new(InMemoryRateLimiter::new(
            OTP_LOGIN_LIMITER.namespace,
            OTP_LOGIN_LIMITER.max,
            OTP_LOGIN_LIMITER.refill_interval_seconds,
        )),
        google_limiter: Arc::new(InMemoryRateLimiter::new(
            GOOGLE_OAUTH_LIMITER.namespace,
            GOOGLE_OAUTH_LIMITER.max,
            GOOGLE_OAUTH_LIMITER.refill_interval_seconds,
        )),
        linkedin_limiter: Arc::new(InMemoryRateLimiter::new(
            LINKEDIN_OAUTH_LIMITER.namespace,
            LINKEDIN_OAUTH_LIMITER.max,
            LINKEDIN_OAUTH_LIMITER.refill_interval_seconds,
        )),
        google: None,
        linkedin: None,
        email: Arc::new(MockEmailClient::new()),
        sms: Arc::new(MockSmsClient::new()),
        totp: Arc::new(TotpEngine::new(app_name.to_string())),
        cipher,
        app_name: app_name.to_string(),
        secure_cookies: false,
        cookie_key: Key::generate(),
    }
}

pub mod logout;
pub mod oauth_login;
pub mod otp_login;
pub mod reconcile_identity;
pub mod request_code;
pub mod resolve_session;
pub mod two_factor_reset;
pub mod two_factor_setup;
pub mod two_factor_verify;

use gatehouse_core::{Session, SessionToken, User};

/// The result every login path converges on: a freshly issued session plus
/// the resolved user. `created` signals the onboarding redirect for
/// first-time users.
#[derive(Debug)]
pub struct AuthenticatedLogin {
    pub token: SessionToken,
    pub session: Session,
    pub user: User,
    pub created: bool,
}

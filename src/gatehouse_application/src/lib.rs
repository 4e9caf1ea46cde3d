pub mod use_cases;

pub use use_cases::{
    AuthenticatedLogin,
    logout::{LogoutError, LogoutUseCase},
    oauth_login::{
        AuthorizationRequest, OAuthCallbackUseCase, OAuthLoginError, begin_authorization,
    },
    otp_login::{OtpLoginError, OtpLoginUseCase},
    reconcile_identity::{ReconcileError, ReconcileIdentityUseCase, ReconciledIdentity},
    request_code::{RequestCodeError, RequestCodeUseCase},
    resolve_session::{CurrentSession, ResolveSessionError, ResolveSessionUseCase},
    two_factor_reset::{TwoFactorResetError, TwoFactorResetUseCase},
    two_factor_setup::{TwoFactorEnrollment, TwoFactorSetupError, TwoFactorSetupUseCase},
    two_factor_verify::{TwoFactorVerifyError, TwoFactorVerifyUseCase},
};

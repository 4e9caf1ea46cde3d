use gatehouse_core::{
    AuthError, EmailClient, Identifier, IdentifierError, RateLimitError, RateLimiter, SmsClient,
    VerificationCodeStore, VerificationCodeStoreError,
};

/// Error types for the request-code use case
#[derive(Debug, thiserror::Error)]
pub enum RequestCodeError {
    #[error("rate limited, retry in {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },
    #[error(transparent)]
    InvalidIdentifier(#[from] IdentifierError),
    #[error("verification code store error: {0}")]
    CodeStoreError(#[from] VerificationCodeStoreError),
    #[error("rate limiter error: {0}")]
    RateLimitError(#[from] RateLimitError),
    #[error("failed to deliver code: {0}")]
    DeliveryError(String),
}

impl From<RequestCodeError> for AuthError {
    fn from(error: RequestCodeError) -> Self {
        match error {
            RequestCodeError::RateLimited {
                retry_after_seconds,
            } => AuthError::RateLimited {
                retry_after_seconds,
            },
            RequestCodeError::InvalidIdentifier(e) => AuthError::Validation(e.to_string()),
            RequestCodeError::CodeStoreError(e) => AuthError::Unexpected(e.to_string()),
            RequestCodeError::RateLimitError(e) => AuthError::Unexpected(e.to_string()),
            RequestCodeError::DeliveryError(e) => AuthError::Unexpected(e),
        }
    }
}

/// Request-code use case - issues a one-time code for a contact identifier
/// and delivers it over the matching channel.
pub struct RequestCodeUseCase<V, R, E, S>
where
    V: VerificationCodeStore,
    R: RateLimiter,
    E: EmailClient,
    S: SmsClient,
{
    code_store: V,
    rate_limiter: R,
    email_client: E,
    sms_client: S,
    app_name: String,
}

impl<V, R, E, S> RequestCodeUseCase<V, R, E, S>
where
    V: VerificationCodeStore,
    R: RateLimiter,
    E: EmailClient,
    S: SmsClient,
{
    pub fn new(
        code_store: V,
        rate_limiter: R,
        email_client: E,
        sms_client: S,
        app_name: String,
    ) -> Self {
        Self {
            code_store,
            rate_limiter,
            email_client,
            sms_client,
            app_name,
        }
    }

    /// Execute the request-code use case
    ///
    /// # Arguments
    /// * `raw_identifier` - Email address or phone number as submitted
    /// * `rate_key` - Subject key for the rate limiter, e.g. `ip:1.2.3.4`
    ///
    /// # Returns
    /// The normalized identifier the code was issued for.
    #[tracing::instrument(name = "RequestCodeUseCase::execute", skip(self))]
    pub async fn execute(
        &self,
        raw_identifier: &str,
        rate_key: &str,
    ) -> Result<Identifier, RequestCodeError> {
        if !self.rate_limiter.consume(rate_key, 1).await? {
            return Err(RequestCodeError::RateLimited {
                retry_after_seconds: self.rate_limiter.refill_interval_seconds(),
            });
        }

        let identifier = Identifier::parse(raw_identifier)?;
        let verification = self.code_store.request_code(&identifier).await?;
        let code = verification.code.as_str();

        match &identifier {
            Identifier::Email(address) => {
                let subject = format!("Verify your {} sign-in - {code}", self.app_name);
                let content = format!(
                    "We want to make sure it's really you signing in.\n\
                     Use the following code to confirm your login attempt: {code}"
                );
                self.email_client
                    .send_email(address, &subject, &content)
                    .await
                    .map_err(RequestCodeError::DeliveryError)?;
            }
            Identifier::Mobile(number) => {
                let body = format!("Verify your {} sign-in - {code}", self.app_name);
                self.sms_client
                    .send_sms(number, &body)
                    .await
                    .map_err(RequestCodeError::DeliveryError)?;
            }
        }

        Ok(identifier)
    }
}

use gatehouse_core::{FederatedProvider, OAuthProfile, OAuthProvider, OAuthProviderError};
use reqwest::Url;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

use super::{TokenResponse, bool_from_bool_or_string};
use crate::config::OAuthClientSettings;

const AUTH_URL: &str = "https://www.linkedin.com/oauth/v2/authorization";
const TOKEN_URL: &str = "https://www.linkedin.com/oauth/v2/accessToken";
const USERINFO_URL: &str = "https://api.linkedin.com/v2/userinfo";
const SCOPES: &str = "openid profile email";

#[derive(Debug, Deserialize)]
struct LinkedinUserInfo {
    sub: String,
    name: Option<String>,
    email: Option<String>,
    // LinkedIn has shipped this both as a boolean and as "true"/"false".
    #[serde(default, deserialize_with = "super::opt_bool_from_bool_or_string")]
    email_verified: Option<bool>,
    picture: Option<String>,
}

/// LinkedIn OAuth2 (OIDC userinfo, no PKCE).
#[derive(Clone)]
pub struct LinkedinProvider {
    http: reqwest::Client,
    client_id: String,
    client_secret: Secret<String>,
    redirect_uri: String,
    auth_url: String,
    token_url: String,
    userinfo_url: String,
}

impl LinkedinProvider {
    pub fn new(settings: &OAuthClientSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            redirect_uri: settings.redirect_uri.clone(),
            auth_url: AUTH_URL.to_string(),
            token_url: TOKEN_URL.to_string(),
            userinfo_url: USERINFO_URL.to_string(),
        }
    }

    /// Test constructor pointing at a stub server.
    pub fn with_base_urls(
        settings: &OAuthClientSettings,
        auth_url: String,
        token_url: String,
        userinfo_url: String,
    ) -> Self {
        Self {
            auth_url,
            token_url,
            userinfo_url,
            ..Self::new(settings)
        }
    }
}

#[async_trait::async_trait]
impl OAuthProvider for LinkedinProvider {
    fn provider(&self) -> FederatedProvider {
        FederatedProvider::Linkedin
    }

    fn authorization_url(&self, state: &str, _pkce_verifier: Option<&str>) -> String {
        let params = [
            ("response_type", "code".to_string()),
            ("client_id", self.client_id.clone()),
            ("redirect_uri", self.redirect_uri.clone()),
            ("scope", SCOPES.to_string()),
            ("state", state.to_string()),
        ];

        Url::parse_with_params(&self.auth_url, &params)
            .map(String::from)
            .unwrap_or_else(|_| self.auth_url.clone())
    }

    #[tracing::instrument(name = "Exchanging LinkedIn authorization code", skip_all)]
    async fn exchange_code(
        &self,
        code: &str,
        _pkce_verifier: Option<&str>,
    ) -> Result<String, OAuthProviderError> {
        let form = [
            ("grant_type", "authorization_code".to_string()),
            ("code", code.to_string()),
            ("redirect_uri", self.redirect_uri.clone()),
            ("client_id", self.client_id.clone()),
            ("client_secret", self.client_secret.expose_secret().clone()),
        ];

        let response = self
            .http
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| OAuthProviderError::Exchange(e.to_string()))?;

        if !response.status().is_success() {
            return Err(OAuthProviderError::Exchange(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| OAuthProviderError::Exchange(e.to_string()))?;
        Ok(token.access_token)
    }

    #[tracing::instrument(name = "Fetching LinkedIn profile", skip_all)]
    async fn fetch_profile(&self, access_token: &str) -> Result<OAuthProfile, OAuthProviderError> {
        let response = self
            .http
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| OAuthProviderError::Profile(e.to_string()))?;

        if !response.status().is_success() {
            return Err(OAuthProviderError::Profile(format!(
                "userinfo endpoint returned {}",
                response.status()
            )));
        }

        let info: LinkedinUserInfo = response
            .json()
            .await
            .map_err(|e| OAuthProviderError::Profile(e.to_string()))?;

        Ok(OAuthProfile {
            provider: FederatedProvider::Linkedin,
            subject: info.sub,
            email_verified: info.email.is_some() && info.email_verified.unwrap_or(false),
            email: info.email,
            name: info.name,
            picture: info.picture,
        })
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn settings() -> OAuthClientSettings {
        OAuthClientSettings {
            client_id: "client-2".to_string(),
            client_secret: Secret::from("shhh".to_string()),
            redirect_uri: "https://app.test/api/auth/linkedin/callback".to_string(),
        }
    }

    fn provider(server: &MockServer) -> LinkedinProvider {
        LinkedinProvider::with_base_urls(
            &settings(),
            format!("{}/auth", server.uri()),
            format!("{}/token", server.uri()),
            format!("{}/userinfo", server.uri()),
        )
    }

    #[test]
    fn authorization_url_has_no_pkce() {
        let provider = LinkedinProvider::new(&settings());
        assert!(!provider.uses_pkce());

        let url = provider.authorization_url("state-9", None);
        assert!(url.starts_with(AUTH_URL));
        assert!(url.contains("state=state-9"));
        assert!(!url.contains("code_challenge"));
    }

    #[tokio::test]
    async fn parses_stringly_typed_email_verified() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("client_id=client-2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "access_token": "token-2" })),
            )
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "sub": "linkedin-sub-1",
                    "name": "Ada",
                    "email": "ada@example.com",
                    "email_verified": "true",
                    "picture": null,
                })),
            )
            .mount(&server)
            .await;

        let provider = provider(&server);
        let token = provider.exchange_code("code", None).await.unwrap();
        let profile = provider.fetch_profile(&token).await.unwrap();

        assert_eq!(profile.provider, FederatedProvider::Linkedin);
        assert_eq!(profile.subject, "linkedin-sub-1");
        assert!(profile.email_verified);
    }

    #[tokio::test]
    async fn profile_fetch_failure_surfaces_as_profile_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let result = provider(&server).fetch_profile("token").await;
        assert!(matches!(result, Err(OAuthProviderError::Profile(_))));
    }
}

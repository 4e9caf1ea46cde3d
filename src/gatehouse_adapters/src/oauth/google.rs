use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use gatehouse_core::{FederatedProvider, OAuthProfile, OAuthProvider, OAuthProviderError};
use reqwest::Url;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use super::TokenResponse;
use crate::config::OAuthClientSettings;

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";
const SCOPES: &str = "openid profile email";

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    id: String,
    email: String,
    #[serde(default)]
    verified_email: bool,
    name: Option<String>,
    picture: Option<String>,
}

/// Google OAuth2 with PKCE.
#[derive(Clone)]
pub struct GoogleProvider {
    http: reqwest::Client,
    client_id: String,
    client_secret: Secret<String>,
    redirect_uri: String,
    auth_url: String,
    token_url: String,
    userinfo_url: String,
}

impl GoogleProvider {
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

fn pkce_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

#[async_trait::async_trait]
impl OAuthProvider for GoogleProvider {
    fn provider(&self) -> FederatedProvider {
        FederatedProvider::Google
    }

    fn uses_pkce(&self) -> bool {
        true
    }

    fn authorization_url(&self, state: &str, pkce_verifier: Option<&str>) -> String {
        let mut params = vec![
            ("response_type", "code".to_string()),
            ("client_id", self.client_id.clone()),
            ("redirect_uri", self.redirect_uri.clone()),
            ("scope", SCOPES.to_string()),
            ("state", state.to_string()),
        ];
        if let Some(verifier) = pkce_verifier {
            params.push(("code_challenge", pkce_challenge(verifier)));
            params.push(("code_challenge_method", "S256".to_string()));
        }

        Url::parse_with_params(&self.auth_url, &params)
            .map(String::from)
            .unwrap_or_else(|_| self.auth_url.clone())
    }

    #[tracing::instrument(name = "Exchanging Google authorization code", skip_all)]
    async fn exchange_code(
        &self,
        code: &str,
        pkce_verifier: Option<&str>,
    ) -> Result<String, OAuthProviderError> {
        let mut form = vec![
            ("grant_type", "authorization_code".to_string()),
            ("code", code.to_string()),
            ("redirect_uri", self.redirect_uri.clone()),
            ("client_id", self.client_id.clone()),
            ("client_secret", self.client_secret.expose_secret().clone()),
        ];
        if let Some(verifier) = pkce_verifier {
            form.push(("code_verifier", verifier.to_string()));
        }

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

    #[tracing::instrument(name = "Fetching Google profile", skip_all)]
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

        let info: GoogleUserInfo = response
            .json()
            .await
            .map_err(|e| OAuthProviderError::Profile(e.to_string()))?;

        Ok(OAuthProfile {
            provider: FederatedProvider::Google,
            subject: info.id,
            email: Some(info.email),
            email_verified: info.verified_email,
            name: info.name,
            picture: info.picture,
        })
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn settings() -> OAuthClientSettings {
        OAuthClientSettings {
            client_id: "client-1".to_string(),
            client_secret: Secret::from("shhh".to_string()),
            redirect_uri: "https://app.test/api/auth/google/callback".to_string(),
        }
    }

    fn provider(server: &MockServer) -> GoogleProvider {
        GoogleProvider::with_base_urls(
            &settings(),
            format!("{}/auth", server.uri()),
            format!("{}/token", server.uri()),
            format!("{}/userinfo", server.uri()),
        )
    }

    #[test]
    fn authorization_url_carries_state_and_pkce_challenge() {
        let provider = GoogleProvider::new(&settings());
        let url = provider.authorization_url("state-123", Some("verifier-abc"));

        assert!(url.starts_with(AUTH_URL));
        assert!(url.contains("state=state-123"));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains(&format!("code_challenge={}", pkce_challenge("verifier-abc"))));
        // The verifier itself never appears in the redirect.
        assert!(!url.contains("verifier-abc"));
    }

    #[tokio::test]
    async fn exchanges_code_and_fetches_profile() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code_verifier=verifier-abc"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "access_token": "token-1",
                    "token_type": "Bearer",
                })),
            )
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .and(header("authorization", "Bearer token-1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "id": "google-sub-1",
                    "email": "ada@example.com",
                    "verified_email": true,
                    "name": "Ada",
                    "picture": "https://img.example.com/a.png",
                })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider(&server);
        let token = provider
            .exchange_code("auth-code", Some("verifier-abc"))
            .await
            .unwrap();
        let profile = provider.fetch_profile(&token).await.unwrap();

        assert_eq!(profile.subject, "google-sub-1");
        assert_eq!(profile.email.as_deref(), Some("ada@example.com"));
        assert!(profile.email_verified);
    }

    #[tokio::test]
    async fn token_endpoint_failure_surfaces_as_exchange_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let result = provider(&server).exchange_code("bad-code", None).await;
        assert!(matches!(result, Err(OAuthProviderError::Exchange(_))));
    }
}

use async_trait::async_trait;
use chrono::Utc;
use oauth2::{
    basic::{BasicClient, BasicTokenResponse},
    AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet,
    EndpointSet, HttpRequest, HttpResponse, RedirectUrl, RefreshToken, RequestTokenError, Scope,
    TokenResponse, TokenUrl,
};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

use crate::config::OAuthConfiguration;
use crate::error::ServerError;
use crate::models::TokenPair;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const TOKEN_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

type GoogleClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// The provider side of the authorization-code flow.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Consent screen URL carrying `state` as the CSRF nonce
    fn authorization_url(&self, state: &str) -> Result<String, ServerError>;

    /// Exchange an authorization code for a token pair
    async fn exchange_code(&self, code: &str) -> Result<TokenPair, ServerError>;

    /// Mint a new access token. A rejected grant is `Unauthenticated`, anything else `Upstream`.
    async fn refresh(&self, refresh_token: &SecretString) -> Result<TokenPair, ServerError>;
}

// Async HTTP client for OAuth2; redirects are never followed on the token endpoint
async fn http_client(request: HttpRequest) -> Result<HttpResponse, reqwest::Error> {
    let client = reqwest::Client::builder()
        .timeout(TOKEN_REQUEST_TIMEOUT)
        .redirect(reqwest::redirect::Policy::none())
        .build()?;
    let mut builder = client
        .request(request.method().clone(), request.uri().to_string())
        .body(request.body().clone());

    for (name, value) in request.headers() {
        builder = builder.header(name.as_str(), value.as_bytes());
    }

    let response = builder.send().await?;
    let status = response.status();
    let body = response.bytes().await?.to_vec();

    let mut http_response = HttpResponse::new(body);
    *http_response.status_mut() = status;

    Ok(http_response)
}

pub struct OAuthClient {
    client: GoogleClient,
    scope: String,
}

impl OAuthClient {
    pub fn new(config: &OAuthConfiguration) -> Result<Self, ServerError> {
        let auth_url = AuthUrl::new(GOOGLE_AUTH_URL.to_string())
            .map_err(|e| ServerError::Configuration(format!("Invalid auth URL: {}", e)))?;

        let token_url = TokenUrl::new(GOOGLE_TOKEN_URL.to_string())
            .map_err(|e| ServerError::Configuration(format!("Invalid token URL: {}", e)))?;

        let redirect_url = RedirectUrl::new(config.redirect_uri.clone())
            .map_err(|e| ServerError::Configuration(format!("Invalid redirect URI: {}", e)))?;

        let client = BasicClient::new(ClientId::new(config.client_id.clone()))
            .set_client_secret(ClientSecret::new(
                config.client_secret.expose_secret().to_string(),
            ))
            .set_auth_type(AuthType::RequestBody)
            .set_auth_uri(auth_url)
            .set_token_uri(token_url)
            .set_redirect_uri(redirect_url);

        Ok(Self {
            client,
            scope: config.scope.clone(),
        })
    }

    fn token_pair(token_result: BasicTokenResponse) -> Result<TokenPair, ServerError> {
        let expires_in = token_result
            .expires_in()
            .ok_or_else(|| ServerError::Upstream("No expiration time in response".to_string()))?;

        Ok(TokenPair {
            access_token: SecretString::from(token_result.access_token().secret().to_string()),
            refresh_token: token_result
                .refresh_token()
                .map(|token| SecretString::from(token.secret().to_string())),
            expires_at: Utc::now() + expires_in,
        })
    }
}

#[async_trait]
impl OAuthProvider for OAuthClient {
    fn authorization_url(&self, state: &str) -> Result<String, ServerError> {
        let csrf_token = CsrfToken::new(state.to_string());
        let (auth_url, _) = self
            .client
            .authorize_url(|| csrf_token)
            .add_scope(Scope::new(self.scope.clone()))
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .url();
        Ok(auth_url.to_string())
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenPair, ServerError> {
        let token_result = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&http_client)
            .await?;

        let tokens = Self::token_pair(token_result)?;
        if tokens.refresh_token.is_none() {
            tracing::warn!("Code exchange returned no refresh token; session cannot be renewed");
        }
        tracing::debug!(expires_at = %tokens.expires_at, "Exchanged code for tokens");
        Ok(tokens)
    }

    async fn refresh(&self, refresh_token: &SecretString) -> Result<TokenPair, ServerError> {
        let token_result = self
            .client
            .exchange_refresh_token(&RefreshToken::new(
                refresh_token.expose_secret().to_string(),
            ))
            .request_async(&http_client)
            .await
            .map_err(|err| match err {
                RequestTokenError::ServerResponse(response) => ServerError::Unauthenticated(
                    format!("Refresh rejected: {}", response.error()),
                ),
                other => ServerError::from(other),
            })?;

        let tokens = Self::token_pair(token_result)?;
        tracing::debug!(expires_at = %tokens.expires_at, "Refreshed tokens");
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config() -> OAuthConfiguration {
        OAuthConfiguration {
            client_id: "client-123".to_string(),
            client_secret: SecretString::from("shh".to_string()),
            redirect_uri: "https://api.example.com/oauth/callback".to_string(),
            scope: "https://www.googleapis.com/auth/business.manage".to_string(),
        }
    }

    #[test]
    fn authorization_url_requests_offline_consent() {
        let client = OAuthClient::new(&config()).unwrap();
        let url = client.authorization_url("nonce-abc").unwrap();

        let parsed = url::Url::parse(&url).unwrap();
        assert_eq!(parsed.host_str(), Some("accounts.google.com"));

        let query: HashMap<String, String> = parsed.query_pairs().into_owned().collect();
        assert_eq!(query["client_id"], "client-123");
        assert_eq!(query["redirect_uri"], "https://api.example.com/oauth/callback");
        assert_eq!(query["response_type"], "code");
        assert_eq!(
            query["scope"],
            "https://www.googleapis.com/auth/business.manage"
        );
        assert_eq!(query["access_type"], "offline");
        assert_eq!(query["prompt"], "consent");
        assert_eq!(query["state"], "nonce-abc");
        assert!(!url.contains("shh"));
    }

    #[test]
    fn rejects_invalid_redirect_uri() {
        let mut config = config();
        config.redirect_uri = "not a url".to_string();
        assert!(matches!(
            OAuthClient::new(&config),
            Err(ServerError::Configuration(_))
        ));
    }
}

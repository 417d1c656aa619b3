//! OAuth2 token lifecycle for the Conta Azul API: authorization-code
//! exchange, refresh, and the expiry-driven decision in
//! [`OAuthTokenManager::valid_access_token`].

use std::time::Duration;

use log::{debug, info};
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::SyncError;
use crate::store::{TokenSet, TokenStore};

const AUTH_URL: &str = "https://auth.contaazul.com/oauth2/authorize";
const TOKEN_URL: &str = "https://auth.contaazul.com/oauth2/token";

/// Consent scope required by the Conta Azul Cognito pool.
const SCOPE: &str = "openid profile aws.cognito.signin.user.admin";

/// Anti-forgery value used when the caller does not supply one.
const DEFAULT_STATE: &str = "state";

const TOKEN_TIMEOUT: Duration = Duration::from_secs(30);

/// Client credentials and redirect target, sourced once by the binary.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// Owns the exchange/refresh calls and the stored-token validity check.
#[derive(Debug)]
pub struct OAuthTokenManager {
    config: OAuthConfig,
    store: TokenStore,
    http: HttpClient,
    auth_url: String,
    token_url: String,
}

impl OAuthTokenManager {
    pub fn new(config: OAuthConfig, store: TokenStore) -> Result<Self, SyncError> {
        let http = HttpClient::builder().timeout(TOKEN_TIMEOUT).build()?;
        Ok(Self {
            config,
            store,
            http,
            auth_url: AUTH_URL.to_string(),
            token_url: TOKEN_URL.to_string(),
        })
    }

    /// Override the authorize endpoint (useful for tests or proxies).
    pub fn with_auth_url(mut self, auth_url: impl Into<String>) -> Self {
        self.auth_url = auth_url.into();
        self
    }

    /// Override the token endpoint (useful for tests or proxies).
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    /// The user-facing consent URL the operator must visit to obtain an
    /// authorization code.
    pub fn authorization_url(&self, state: Option<&str>) -> String {
        format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&state={}&scope={}",
            self.auth_url,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode(state.unwrap_or(DEFAULT_STATE)),
            urlencoding::encode(SCOPE),
        )
    }

    /// Returns a usable access token, refreshing when expired.
    ///
    /// Stored tokens with a future expiry are returned without any network
    /// call. Expired tokens with a refresh token trigger exactly one refresh,
    /// whose result replaces the stored set wholesale. Anything else fails
    /// with [`SyncError::AuthRequired`] carrying the consent URL; the caller
    /// must obtain a code out-of-band and run [`Self::exchange_code`].
    pub async fn valid_access_token(&self) -> Result<String, SyncError> {
        if let Some(tokens) = self.store.load()? {
            if tokens.is_valid() {
                debug!("stored access token still valid, skipping network call");
                return Ok(tokens.access_token);
            }
            if let Some(refresh_token) = tokens.refresh_token {
                info!("access token expired, refreshing");
                let refreshed = self.refresh(&refresh_token).await?;
                return Ok(refreshed.access_token);
            }
        }
        Err(SyncError::AuthRequired {
            authorize_url: self.authorization_url(None),
        })
    }

    /// Exchanges an authorization code for tokens and persists them.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenSet, SyncError> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];
        info!("exchanging authorization code for tokens");
        self.request_tokens(&params).await
    }

    /// Trades a refresh token for a fresh token set and persists it.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, SyncError> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        self.request_tokens(&params).await
    }

    async fn request_tokens(&self, params: &[(&str, &str)]) -> Result<TokenSet, SyncError> {
        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::TokenExchange { status, body });
        }

        let parsed: TokenResponse = response.json().await?;
        let tokens = TokenSet::issued_now(
            parsed.access_token,
            parsed.refresh_token,
            parsed.expires_in,
            parsed.extra,
        );
        self.store.save(&tokens)?;
        info!("obtained tokens, valid until {}", tokens.expires_at);
        Ok(tokens)
    }
}

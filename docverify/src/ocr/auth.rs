use std::fmt;

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{DocVerifyError, Result};

const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: u64 = 3600;

/// Cached tokens are refreshed once they are this close to expiry.
const REFRESH_MARGIN_SECS: u64 = 60;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    iss: String,
    scope: String,
    aud: String,
    iat: u64,
    exp: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    ASSERTION_LIFETIME_SECS
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: u64,
}

/// Mints Vision access tokens for a service account using the OAuth2
/// JWT-bearer grant. One token is cached and shared by every request.
pub struct ServiceAccountTokenSource {
    client: Client,
    client_email: String,
    key: EncodingKey,
    token_uri: String,
    cached: Mutex<Option<CachedToken>>,
}

impl fmt::Debug for ServiceAccountTokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountTokenSource")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountTokenSource {
    /// Fails when `private_key` is not a PEM-encoded RSA key.
    pub fn new(
        client: Client,
        client_email: &str,
        private_key: &str,
        token_uri: &str,
    ) -> Result<Self> {
        let key = EncodingKey::from_rsa_pem(private_key.as_bytes()).map_err(|e| {
            DocVerifyError::Ocr(format!("Invalid service account private key: {e}"))
        })?;

        Ok(Self {
            client,
            client_email: client_email.to_string(),
            key,
            token_uri: token_uri.to_string(),
            cached: Mutex::new(None),
        })
    }

    /// Returns the cached token, exchanging a fresh assertion when it is
    /// missing or about to expire.
    pub async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        let now = jsonwebtoken::get_current_timestamp();

        if let Some(token) = cached.as_ref() {
            if token.expires_at > now + REFRESH_MARGIN_SECS {
                return Ok(token.value.clone());
            }
        }

        let token = self.exchange(now).await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    fn assertion(&self, now: u64) -> Result<String> {
        let claims = Claims {
            iss: self.client_email.clone(),
            scope: CLOUD_PLATFORM_SCOPE.to_string(),
            aud: self.token_uri.clone(),
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };

        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.key)
            .map_err(|e| DocVerifyError::Ocr(format!("Failed to sign token assertion: {e}")))
    }

    async fn exchange(&self, now: u64) -> Result<CachedToken> {
        let assertion = self.assertion(now)?;

        let response = self
            .client
            .post(&self.token_uri)
            .form(&[
                ("grant_type", JWT_BEARER_GRANT),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DocVerifyError::Ocr(format!(
                "Token exchange failed: {status} - {body}"
            )));
        }

        let token: TokenResponse = response.json().await?;
        tracing::debug!(
            client_email = %self.client_email,
            expires_in = token.expires_in,
            "Minted Vision access token"
        );

        Ok(CachedToken {
            value: token.access_token,
            expires_at: now + token.expires_in,
        })
    }
}

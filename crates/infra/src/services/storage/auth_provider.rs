use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{error, warn};

// https://developers.google.com/identity/protocols/oauth2/service-account
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Supplies short lived access tokens for the storage and mail transports.
/// `None` means no usable credentials; callers degrade instead of failing
/// hard.
#[async_trait::async_trait]
pub trait ICredentialProvider: Send + Sync {
    async fn get_access_token(&self) -> Option<String>;
}

#[derive(Debug, Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
}

#[derive(Debug, Serialize)]
struct Claims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
    /// Mailbox the service account acts as, for domain-wide delegation
    #[serde(skip_serializing_if = "Option::is_none")]
    sub: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Service account credentials exchanged for access tokens through the
/// RS256 JWT bearer grant. The key file is read lazily on first use so a
/// missing file degrades to tokenless operation instead of preventing
/// startup.
pub struct ServiceAccountAuth {
    key_file: PathBuf,
    scopes: String,
    impersonate: Option<String>,
    client: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountAuth {
    pub fn new(
        key_file: PathBuf,
        scopes: &[&str],
        impersonate: Option<String>,
        timeout: std::time::Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build token exchange http client: {:?}", e);
                reqwest::Client::new()
            });
        Self {
            key_file,
            scopes: scopes.join(" "),
            impersonate,
            client,
            cached: Mutex::new(None),
        }
    }

    fn load_key(&self) -> Option<ServiceAccountKey> {
        let raw = match std::fs::read_to_string(&self.key_file) {
            Ok(raw) => raw,
            Err(e) => {
                error!(
                    "Service account key file not readable: {:?}, error: {:?}",
                    self.key_file, e
                );
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(key) => Some(key),
            Err(e) => {
                error!("Service account key file is not valid JSON: {:?}", e);
                None
            }
        }
    }

    fn cached_token(&self, now: DateTime<Utc>) -> Option<String> {
        let cached = self.cached.lock().unwrap();
        cached.as_ref().and_then(|token| {
            // Refresh a minute early so an almost expired token is never handed out
            if token.expires_at - Duration::seconds(60) > now {
                Some(token.access_token.clone())
            } else {
                None
            }
        })
    }

    async fn exchange(&self, key: &ServiceAccountKey, now: DateTime<Utc>) -> Option<TokenResponse> {
        let claims = Claims {
            iss: key.client_email.clone(),
            scope: self.scopes.clone(),
            aud: TOKEN_ENDPOINT.into(),
            iat: now.timestamp(),
            exp: (now + Duration::minutes(10)).timestamp(),
            sub: self.impersonate.clone(),
        };
        let header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256);
        let encoding_key = match jsonwebtoken::EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        {
            Ok(key) => key,
            Err(e) => {
                error!("Service account private key is not valid RSA PEM: {:?}", e);
                return None;
            }
        };
        let assertion = match jsonwebtoken::encode(&header, &claims, &encoding_key) {
            Ok(assertion) => assertion,
            Err(e) => {
                error!("Failed to sign service account assertion: {:?}", e);
                return None;
            }
        };

        let params = [("grant_type", JWT_BEARER_GRANT), ("assertion", &assertion)];
        let res = match self.client.post(TOKEN_ENDPOINT).form(&params).send().await {
            Ok(res) => res,
            Err(e) => {
                error!("Token exchange request failed: {:?}", e);
                return None;
            }
        };
        if !res.status().is_success() {
            error!("Token exchange was rejected with status: {}", res.status());
            return None;
        }
        match res.json::<TokenResponse>().await {
            Ok(token) => Some(token),
            Err(e) => {
                error!("Token exchange response was malformed: {:?}", e);
                None
            }
        }
    }
}

#[async_trait::async_trait]
impl ICredentialProvider for ServiceAccountAuth {
    async fn get_access_token(&self) -> Option<String> {
        let now = Utc::now();
        if let Some(token) = self.cached_token(now) {
            return Some(token);
        }

        let key = self.load_key()?;
        let token = self.exchange(&key, now).await?;

        let access_token = token.access_token.clone();
        let mut cached = self.cached.lock().unwrap();
        *cached = Some(CachedToken {
            access_token: token.access_token,
            expires_at: now + Duration::seconds(token.expires_in),
        });
        Some(access_token)
    }
}

//! Google service account 认证
//!
//! 用服务账号私钥签发 RS256 JWT，在 OAuth token 端点换取 access token，
//! 缓存到过期前一分钟。所有方法都是同步的，在 spawn_blocking 中调用。

use std::time::{Duration, Instant};

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use ureq::Agent;

use crate::errors::{ClickRelayError, Result};

const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
/// 断言有效期，Google 上限为 1 小时
const ASSERTION_TTL_SECS: i64 = 3600;
/// 提前刷新的余量
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// 服务账号 JSON 中用到的字段
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl ServiceAccountKey {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClickRelayError::file_operation(format!(
                "Failed to read service account file '{}': {}",
                path, e
            ))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| {
            ClickRelayError::configuration(format!("Invalid service account JSON: {}", e))
        })
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

pub struct TokenProvider {
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(key: ServiceAccountKey) -> Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(|e| {
            ClickRelayError::configuration(format!("Invalid service account private key: {}", e))
        })?;
        Ok(Self {
            key,
            encoding_key,
            cached: Mutex::new(None),
        })
    }

    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    /// 签发换取 token 用的 JWT 断言
    pub fn assertion(&self, now_unix: i64) -> Result<String> {
        let claims = Claims {
            iss: &self.key.client_email,
            scope: SHEETS_SCOPE,
            aud: &self.key.token_uri,
            iat: now_unix,
            exp: now_unix + ASSERTION_TTL_SECS,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .map_err(|e| ClickRelayError::configuration(format!("Failed to sign JWT: {}", e)))
    }

    /// 返回有效的 access token，必要时刷新
    pub fn token(&self, agent: &Agent) -> Result<String> {
        let mut cached = self.cached.lock();
        if let Some(token) = cached.as_ref()
            && token.expires_at > Instant::now() + REFRESH_MARGIN
        {
            return Ok(token.value.clone());
        }

        let assertion = self.assertion(chrono::Utc::now().timestamp())?;
        let mut resp = agent
            .post(&self.key.token_uri)
            .send_form([("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])?;

        if !resp.status().is_success() {
            let body = resp.body_mut().read_to_string().unwrap_or_default();
            return Err(ClickRelayError::transient_backend(format!(
                "Token exchange failed with {}: {}",
                resp.status(),
                body
            )));
        }

        let token: TokenResponse = resp.body_mut().read_json()?;
        let ttl = if token.expires_in == 0 {
            ASSERTION_TTL_SECS as u64
        } else {
            token.expires_in
        };
        debug!(
            "Access token refreshed for {}, valid for {}s",
            self.key.client_email, ttl
        );

        let value = token.access_token;
        *cached = Some(CachedToken {
            value: value.clone(),
            expires_at: Instant::now() + Duration::from_secs(ttl),
        });
        Ok(value)
    }
}

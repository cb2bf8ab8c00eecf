//! Feishu/Lark messenger.
//!
//! Replies to inbound messages via `POST /open-apis/im/v1/messages/{id}/reply`.
//! Every API call needs a tenant access token, fetched from the auth
//! endpoint with the app credentials and cached until shortly before its
//! expiry; concurrent replies share one cached token.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use larkbridge_core::error::MessengerError;
use larkbridge_core::messenger::Messenger;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Refresh the token this long before the platform expires it, so a reply
/// never goes out with a token about to lapse mid-flight.
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

/// Lark app credentials and endpoint.
#[derive(Clone)]
pub struct LarkConfig {
    pub app_id: String,
    pub app_secret: String,
    /// Open-platform base URL; override for the international Lark domain.
    pub base_url: String,
}

impl LarkConfig {
    pub fn new(app_id: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            app_secret: app_secret.into(),
            base_url: "https://open.feishu.cn".into(),
        }
    }
}

impl std::fmt::Debug for LarkConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LarkConfig")
            .field("app_id", &self.app_id)
            .field("app_secret", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .finish()
    }
}

struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// The Lark IM client.
pub struct LarkMessenger {
    config: LarkConfig,
    client: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
}

impl LarkMessenger {
    pub fn new(config: LarkConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            config,
            client,
            token: Mutex::new(None),
        }
    }

    /// Return a valid tenant access token, fetching a fresh one if the
    /// cached token is missing or near expiry. The lock is held across the
    /// fetch so concurrent callers do not stampede the auth endpoint.
    async fn tenant_access_token(&self) -> Result<String, MessengerError> {
        let mut cache = self.token.lock().await;

        if let Some(cached) = cache.as_ref()
            && cached.expires_at > Utc::now()
        {
            return Ok(cached.token.clone());
        }

        debug!(app_id = %self.config.app_id, "Fetching tenant access token");

        let url = format!(
            "{}/open-apis/auth/v3/tenant_access_token/internal",
            self.config.base_url
        );
        let response = self
            .client
            .post(&url)
            .json(&TokenRequest {
                app_id: self.config.app_id.clone(),
                app_secret: self.config.app_secret.clone(),
            })
            .send()
            .await
            .map_err(|e| MessengerError::Network(e.to_string()))?;

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| MessengerError::InvalidPayload(e.to_string()))?;

        if body.code != 0 {
            return Err(MessengerError::Auth(format!(
                "token request rejected: code {} ({})",
                body.code, body.msg
            )));
        }

        let token = body
            .tenant_access_token
            .ok_or_else(|| MessengerError::Auth("token response without token".into()))?;

        let ttl = body.expire.unwrap_or(0).max(0) - TOKEN_EXPIRY_MARGIN_SECS;
        *cache = Some(CachedToken {
            token: token.clone(),
            expires_at: Utc::now() + Duration::seconds(ttl.max(0)),
        });

        Ok(token)
    }
}

#[async_trait]
impl Messenger for LarkMessenger {
    async fn reply(&self, message_id: &str, text: &str) -> Result<(), MessengerError> {
        let token = self.tenant_access_token().await?;

        let url = format!(
            "{}/open-apis/im/v1/messages/{}/reply",
            self.config.base_url, message_id
        );
        let body = ReplyRequest::text(text);

        debug!(message_id = %message_id, text_len = text.len(), "Sending reply");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {token}"))
            .json(&body)
            .send()
            .await
            .map_err(|e| MessengerError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let api: ReplyResponse = response
            .json()
            .await
            .map_err(|e| MessengerError::InvalidPayload(e.to_string()))?;

        if status != 200 || api.code != 0 {
            warn!(message_id = %message_id, status, code = api.code, msg = %api.msg, "Reply rejected");
            return Err(MessengerError::DeliveryFailed {
                message_id: message_id.to_string(),
                reason: format!("code {} ({})", api.code, api.msg),
            });
        }

        Ok(())
    }
}

// --- API types (internal) ---

#[derive(Debug, Serialize)]
struct TokenRequest {
    app_id: String,
    app_secret: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    code: i64,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    tenant_access_token: Option<String>,
    /// Token lifetime in seconds.
    #[serde(default)]
    expire: Option<i64>,
}

/// Reply payload: the text goes JSON-encoded *inside* the `content` string.
#[derive(Debug, Serialize)]
struct ReplyRequest {
    content: String,
    msg_type: String,
}

impl ReplyRequest {
    fn text(text: &str) -> Self {
        Self {
            content: serde_json::json!({ "text": text }).to_string(),
            msg_type: "text".into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReplyResponse {
    code: i64,
    #[serde(default)]
    msg: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_payload_nests_text_as_json_string() {
        let body = ReplyRequest::text("hello 你好");
        assert_eq!(body.msg_type, "text");

        // content must be a JSON string field, not a nested object
        let json = serde_json::to_value(&body).unwrap();
        let content = json["content"].as_str().unwrap();
        let inner: serde_json::Value = serde_json::from_str(content).unwrap();
        assert_eq!(inner["text"], "hello 你好");
    }

    #[test]
    fn token_response_parses_success_and_failure() {
        let ok: TokenResponse = serde_json::from_str(
            r#"{"code":0,"msg":"ok","tenant_access_token":"t-abc","expire":7200}"#,
        )
        .unwrap();
        assert_eq!(ok.code, 0);
        assert_eq!(ok.tenant_access_token.as_deref(), Some("t-abc"));
        assert_eq!(ok.expire, Some(7200));

        let err: TokenResponse =
            serde_json::from_str(r#"{"code":10003,"msg":"invalid app_secret"}"#).unwrap();
        assert_eq!(err.code, 10003);
        assert!(err.tenant_access_token.is_none());
    }

    #[test]
    fn debug_redacts_app_secret() {
        let config = LarkConfig::new("cli_123", "very-secret");
        let debug = format!("{config:?}");
        assert!(!debug.contains("very-secret"));
        assert!(debug.contains("[REDACTED]"));
        assert!(debug.contains("cli_123"));
    }

    #[tokio::test]
    async fn token_cache_starts_empty() {
        let messenger = LarkMessenger::new(LarkConfig::new("cli_123", "secret"));
        assert!(messenger.token.lock().await.is_none());
    }

    #[tokio::test]
    async fn cached_token_is_reused_until_expiry() {
        let messenger = LarkMessenger::new(LarkConfig::new("cli_123", "secret"));
        *messenger.token.lock().await = Some(CachedToken {
            token: "t-cached".into(),
            expires_at: Utc::now() + Duration::hours(1),
        });

        let token = messenger.tenant_access_token().await.unwrap();
        assert_eq!(token, "t-cached");
    }
}

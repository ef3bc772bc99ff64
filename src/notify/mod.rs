//! Outbound notifications
//!
//! Delivery is best effort: `Notifier::notify` never fails to the caller,
//! failures are logged and dropped.

use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use chrono::Utc;
use governor::{Quota, RateLimiter};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha2::Sha256;

use crate::config::NotifierSettings;
use crate::error::BotError;
use crate::Result;

type HmacSha256 = Hmac<Sha256>;

type WebhookRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

const DEFAULT_PER_MINUTE: NonZeroU32 = match NonZeroU32::new(20) {
    Some(n) => n,
    None => panic!("rate must be non-zero"),
};

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str);
}

/// Writes messages to the log only
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, message: &str) {
        tracing::info!("📣 {}", message);
    }
}

// ============================================================================
// DingTalk robot webhook
// ============================================================================

#[derive(Debug, Deserialize)]
struct DingTalkResponse {
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

/// DingTalk group robot with signed requests
#[derive(Clone)]
pub struct DingTalkNotifier {
    client: Client,
    url: String,
    access_token: String,
    secret: String,
    rate_limiter: Arc<WebhookRateLimiter>,
}

impl DingTalkNotifier {
    pub fn new(settings: &NotifierSettings, access_token: String, secret: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| BotError::Config(format!("failed to build HTTP client: {}", e)))?;

        let per_minute = NonZeroU32::new(settings.per_minute).unwrap_or(DEFAULT_PER_MINUTE);

        Ok(Self {
            client,
            url: settings.dingtalk_url.clone(),
            access_token,
            secret,
            rate_limiter: Arc::new(RateLimiter::direct(Quota::per_minute(per_minute))),
        })
    }

    /// `DINGTALK_ACCESS_TOKEN` + `DINGTALK_SECRET`; `None` if either is unset
    pub fn from_env(settings: &NotifierSettings) -> Result<Option<Self>> {
        match (
            std::env::var("DINGTALK_ACCESS_TOKEN"),
            std::env::var("DINGTALK_SECRET"),
        ) {
            (Ok(token), Ok(secret)) => Self::new(settings, token, secret).map(Some),
            _ => Ok(None),
        }
    }

    /// Base64(HMAC-SHA256(secret, "{timestamp}\n{secret}"))
    pub fn sign(&self, timestamp_ms: i64) -> Result<String> {
        let string_to_sign = format!("{}\n{}", timestamp_ms, self.secret);
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| BotError::Config(format!("invalid DingTalk secret: {}", e)))?;
        mac.update(string_to_sign.as_bytes());
        Ok(BASE64_STANDARD.encode(mac.finalize().into_bytes()))
    }

    async fn send(&self, message: &str) -> Result<()> {
        self.rate_limiter.until_ready().await;

        let timestamp = Utc::now().timestamp_millis();
        let sign = self.sign(timestamp)?;
        let body = serde_json::json!({
            "msgtype": "text",
            "text": { "content": message },
        });

        let response = self
            .client
            .post(&self.url)
            .query(&[
                ("access_token", self.access_token.as_str()),
                ("timestamp", timestamp.to_string().as_str()),
                ("sign", sign.as_str()),
            ])
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let ack: DingTalkResponse = response.json().await?;
        if ack.errcode != 0 {
            return Err(BotError::exchange(ack.errcode.to_string(), ack.errmsg));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for DingTalkNotifier {
    async fn notify(&self, message: &str) {
        match self.send(message).await {
            Ok(()) => tracing::debug!("DingTalk message delivered"),
            Err(e) => tracing::warn!("⚠️  DingTalk delivery failed: {}", e),
        }
    }
}

// ============================================================================
// Throttling
// ============================================================================

/// Minimum spacing between deliveries, shared by everything holding it
#[derive(Debug)]
pub struct NotifierThrottle {
    last_sent_at: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl NotifierThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_sent_at: Mutex::new(None),
            min_interval,
        }
    }

    /// Claim a slot at `now`; false if the last delivery was too recent
    pub fn try_acquire_at(&self, now: Instant) -> bool {
        let mut last = match self.last_sent_at.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        match *last {
            Some(prev) if now.saturating_duration_since(prev) < self.min_interval => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }

    pub fn try_acquire(&self) -> bool {
        self.try_acquire_at(Instant::now())
    }
}

/// Drops messages arriving faster than the throttle allows
pub struct ThrottledNotifier {
    inner: Arc<dyn Notifier>,
    throttle: NotifierThrottle,
}

impl ThrottledNotifier {
    pub fn new(inner: Arc<dyn Notifier>, min_interval: Duration) -> Self {
        Self {
            inner,
            throttle: NotifierThrottle::new(min_interval),
        }
    }
}

#[async_trait]
impl Notifier for ThrottledNotifier {
    async fn notify(&self, message: &str) {
        if self.throttle.try_acquire() {
            self.inner.notify(message).await;
        } else {
            tracing::info!("🔕 Alert throttled: {}", message);
        }
    }
}

/// DingTalk when configured, otherwise the log
pub fn from_env(settings: &NotifierSettings) -> Result<Arc<dyn Notifier>> {
    match DingTalkNotifier::from_env(settings)? {
        Some(dingtalk) => {
            tracing::info!("📨 Notifications via DingTalk");
            Ok(Arc::new(dingtalk))
        }
        None => {
            tracing::warn!("⚠️  DingTalk not configured, notifications go to the log");
            Ok(Arc::new(LogNotifier))
        }
    }
}

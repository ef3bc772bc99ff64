//! OKX v5 REST client (perpetual swaps)
//!
//! Covers exactly what the bot consumes: candles, account/position snapshot,
//! contract spec and market orders. Private endpoints are signed with
//! HMAC-SHA256 over `timestamp + method + path + body`.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use chrono::{DateTime, Utc};
use governor::{Quota, RateLimiter};
use hmac::{Hmac, Mac};
use reqwest::{header::CONTENT_TYPE, Client, Method};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sha2::Sha256;
use tokio::sync::RwLock;

use super::exchange::{CandleQuery, Exchange};
use crate::config::ExchangeSettings;
use crate::error::BotError;
use crate::models::{Candle, OrderRequest, OrderResult, PositionSide, PositionState};
use crate::Result;

type HmacSha256 = Hmac<Sha256>;

type OkxRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

// 20 requests / 2s is the tightest public limit we hit
const RATE_LIMIT_PER_SEC: NonZeroU32 = match NonZeroU32::new(10) {
    Some(n) => n,
    None => panic!("rate limit must be non-zero"),
};
const RATE_LIMIT_BURST: NonZeroU32 = match NonZeroU32::new(20) {
    Some(n) => n,
    None => panic!("burst must be non-zero"),
};

const RECENT_CANDLES_MAX: usize = 300;
const HISTORY_CANDLES_MAX: usize = 100;
const SETTLEMENT_CCY: &str = "USDT";

/// API key triple, read from the environment
#[derive(Clone)]
pub struct OkxCredentials {
    pub api_key: String,
    pub secret: String,
    pub passphrase: String,
}

impl std::fmt::Debug for OkxCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OkxCredentials")
            .field("api_key", &self.api_key)
            .finish_non_exhaustive()
    }
}

impl OkxCredentials {
    /// `OKX_API_KEY`, `OKX_API_SECRET`, `OKX_PASSPHRASE`; `None` if any is missing
    pub fn from_env() -> Option<Self> {
        Some(Self {
            api_key: std::env::var("OKX_API_KEY").ok()?,
            secret: std::env::var("OKX_API_SECRET").ok()?,
            passphrase: std::env::var("OKX_PASSPHRASE").ok()?,
        })
    }

    /// Base64(HMAC-SHA256(secret, ts + method + path + body))
    pub fn sign(&self, timestamp: &str, method: &str, request_path: &str, body: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| BotError::Config(format!("invalid OKX secret: {}", e)))?;
        mac.update(timestamp.as_bytes());
        mac.update(method.as_bytes());
        mac.update(request_path.as_bytes());
        mac.update(body.as_bytes());
        Ok(BASE64_STANDARD.encode(mac.finalize().into_bytes()))
    }
}

/// Contract parameters from `/public/instruments`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstrumentSpec {
    pub max_leverage: Decimal,
    pub ct_val: Decimal,
    pub lot_sz: Decimal,
    pub min_sz: Decimal,
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: String,
    #[serde(default)]
    msg: String,
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct BalanceData {
    #[serde(default)]
    details: Vec<BalanceDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BalanceDetail {
    ccy: String,
    #[serde(default)]
    avail_eq: String,
    #[serde(default)]
    eq: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PositionData {
    #[serde(default)]
    pos: String,
    #[serde(default)]
    pos_side: String,
    #[serde(default)]
    avg_px: String,
    #[serde(default)]
    upl: String,
    #[serde(default)]
    upl_ratio: String,
    #[serde(default)]
    mark_px: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarkPriceData {
    mark_px: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstrumentData {
    lever: String,
    ct_val: String,
    lot_sz: String,
    min_sz: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderAck {
    #[serde(default)]
    ord_id: String,
    #[serde(default)]
    cl_ord_id: String,
    #[serde(default)]
    s_code: String,
    #[serde(default)]
    s_msg: String,
}

/// Empty strings are OKX's "no value"
fn opt_decimal(raw: &str) -> Result<Option<Decimal>> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    Decimal::from_str(raw.trim())
        .map(Some)
        .map_err(|e| BotError::Decode(format!("bad decimal '{}': {}", raw, e)))
}

fn decimal(raw: &str, field: &str) -> Result<Decimal> {
    opt_decimal(raw)?.ok_or_else(|| BotError::Decode(format!("missing {}", field)))
}

fn parse_f64(raw: &str, field: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|e| BotError::Decode(format!("bad {} '{}': {}", field, raw, e)))
}

/// `[ts, o, h, l, c, vol, ...]`
fn parse_candle_row(row: &[String]) -> Result<Candle> {
    if row.len() < 6 {
        return Err(BotError::Decode(format!("short candle row: {:?}", row)));
    }
    let ts: i64 = row[0]
        .parse()
        .map_err(|e| BotError::Decode(format!("bad candle ts '{}': {}", row[0], e)))?;
    let begin_time = DateTime::from_timestamp_millis(ts)
        .ok_or_else(|| BotError::Decode(format!("candle ts out of range: {}", ts)))?;

    Ok(Candle {
        begin_time,
        open: parse_f64(&row[1], "open")?,
        high: parse_f64(&row[2], "high")?,
        low: parse_f64(&row[3], "low")?,
        close: parse_f64(&row[4], "close")?,
        volume: parse_f64(&row[5], "volume")?,
    })
}

// ============================================================================
// Client
// ============================================================================

/// Shared OKX client
///
/// Cloneable; clones share the HTTP pool, rate limiter and instrument cache.
#[derive(Clone)]
pub struct OkxClient {
    client: Client,
    base_url: String,
    credentials: Option<OkxCredentials>,
    simulated: bool,
    default_timeout: Duration,
    rate_limiter: Arc<OkxRateLimiter>,
    instruments: Arc<RwLock<HashMap<String, InstrumentSpec>>>,
}

impl OkxClient {
    pub fn new(settings: &ExchangeSettings, credentials: Option<OkxCredentials>) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .map_err(|e| BotError::Config(format!("failed to build HTTP client: {}", e)))?;

        if credentials.is_none() {
            tracing::warn!("⚠️  OKX credentials not set, only public endpoints will work");
        }

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            credentials,
            simulated: settings.simulated,
            default_timeout: settings.request_timeout(),
            rate_limiter: Arc::new(RateLimiter::direct(
                Quota::per_second(RATE_LIMIT_PER_SEC).allow_burst(RATE_LIMIT_BURST),
            )),
            instruments: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        request_path: &str,
        body: Option<String>,
        signed: bool,
        timeout: Option<Duration>,
    ) -> Result<Envelope<T>> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{}", self.base_url, request_path);
        let mut req = self
            .client
            .request(method.clone(), &url)
            .timeout(timeout.unwrap_or(self.default_timeout));

        if self.simulated {
            req = req.header("x-simulated-trading", "1");
        }

        if signed {
            let creds = self.credentials.as_ref().ok_or_else(|| {
                BotError::Config("OKX credentials required for private endpoints".to_string())
            })?;
            let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();
            let signature = creds.sign(
                &timestamp,
                method.as_str(),
                request_path,
                body.as_deref().unwrap_or(""),
            )?;
            req = req
                .header("OK-ACCESS-KEY", &creds.api_key)
                .header("OK-ACCESS-SIGN", signature)
                .header("OK-ACCESS-TIMESTAMP", timestamp)
                .header("OK-ACCESS-PASSPHRASE", &creds.passphrase);
        }

        if let Some(body) = body {
            req = req.header(CONTENT_TYPE, "application/json").body(body);
        }

        let response = req.send().await?;
        let status = response.status();

        if status.as_u16() == 429 {
            return Err(BotError::RateLimited(format!("{} {}", method, request_path)));
        }
        if status.is_server_error() {
            return Err(BotError::Network(format!(
                "{} {} returned {}",
                method, request_path, status
            )));
        }

        let text = response.text().await?;
        serde_json::from_str::<Envelope<T>>(&text).map_err(|e| {
            if status.is_success() {
                BotError::Decode(format!("{}: {}", request_path, e))
            } else {
                BotError::exchange(status.as_u16().to_string(), text.clone())
            }
        })
    }

    /// GET returning `data` on `code == "0"`
    async fn get<T: DeserializeOwned>(
        &self,
        request_path: &str,
        signed: bool,
        timeout: Option<Duration>,
    ) -> Result<Vec<T>> {
        let envelope: Envelope<T> = self
            .request(Method::GET, request_path, None, signed, timeout)
            .await?;
        if envelope.code != "0" {
            return Err(BotError::exchange(envelope.code, envelope.msg));
        }
        Ok(envelope.data)
    }

    /// USDT available equity
    pub async fn fetch_balance(&self, timeout: Option<Duration>) -> Result<Decimal> {
        let path = format!("/api/v5/account/balance?ccy={}", SETTLEMENT_CCY);
        let data: Vec<BalanceData> = self.get(&path, true, timeout).await?;

        let detail = data
            .iter()
            .flat_map(|d| d.details.iter())
            .find(|d| d.ccy == SETTLEMENT_CCY);

        match detail {
            Some(d) => Ok(opt_decimal(&d.avail_eq)?
                .or(opt_decimal(&d.eq)?)
                .unwrap_or(Decimal::ZERO)),
            None => Ok(Decimal::ZERO),
        }
    }

    pub async fn fetch_mark_price(&self, inst_id: &str, timeout: Option<Duration>) -> Result<Decimal> {
        let path = format!("/api/v5/public/mark-price?instType=SWAP&instId={}", inst_id);
        let data: Vec<MarkPriceData> = self.get(&path, false, timeout).await?;
        let first = data
            .first()
            .ok_or_else(|| BotError::Decode(format!("no mark price for {}", inst_id)))?;
        decimal(&first.mark_px, "markPx")
    }

    /// Contract spec, cached for the life of the client
    pub async fn instrument_spec(&self, inst_id: &str, timeout: Option<Duration>) -> Result<InstrumentSpec> {
        if let Some(spec) = self.instruments.read().await.get(inst_id) {
            return Ok(*spec);
        }

        let path = format!("/api/v5/public/instruments?instType=SWAP&instId={}", inst_id);
        let data: Vec<InstrumentData> = self.get(&path, false, timeout).await?;
        let raw = data
            .first()
            .ok_or_else(|| BotError::exchange("51001", format!("unknown instrument {}", inst_id)))?;

        let spec = InstrumentSpec {
            max_leverage: decimal(&raw.lever, "lever")?,
            ct_val: decimal(&raw.ct_val, "ctVal")?,
            lot_sz: decimal(&raw.lot_sz, "lotSz")?,
            min_sz: decimal(&raw.min_sz, "minSz")?,
        };

        self.instruments
            .write()
            .await
            .insert(inst_id.to_string(), spec);
        Ok(spec)
    }
}

#[async_trait]
impl Exchange for OkxClient {
    async fn fetch_candles(&self, query: &CandleQuery) -> Result<Vec<Candle>> {
        let path = match query.before {
            Some(before) => format!(
                "/api/v5/market/history-candles?instId={}&bar={}&limit={}&after={}",
                query.inst_id,
                query.interval.as_bar(),
                query.limit.clamp(1, HISTORY_CANDLES_MAX),
                before.timestamp_millis()
            ),
            None => format!(
                "/api/v5/market/candles?instId={}&bar={}&limit={}",
                query.inst_id,
                query.interval.as_bar(),
                query.limit.clamp(1, RECENT_CANDLES_MAX)
            ),
        };

        let rows: Vec<Vec<String>> = self.get(&path, false, query.timeout).await?;
        let mut candles = rows
            .iter()
            .map(|row| parse_candle_row(row))
            .collect::<Result<Vec<_>>>()?;

        // OKX returns newest first
        candles.sort_by_key(|c| c.begin_time);
        Ok(candles)
    }

    async fn fetch_position(&self, inst_id: &str, timeout: Option<Duration>) -> Result<PositionState> {
        let spec = self.instrument_spec(inst_id, timeout).await?;
        let account_balance = self.fetch_balance(timeout).await?;

        let path = format!("/api/v5/account/positions?instType=SWAP&instId={}", inst_id);
        let positions: Vec<PositionData> = self.get(&path, true, timeout).await?;

        let open = positions
            .iter()
            .find(|p| opt_decimal(&p.pos).ok().flatten().is_some_and(|pos| !pos.is_zero()));

        let (side, size, entry_price, upl, upl_ratio, mark) = match open {
            Some(p) => {
                let pos = decimal(&p.pos, "pos")?;
                let side = match p.pos_side.as_str() {
                    "long" => PositionSide::Long,
                    "short" => PositionSide::Short,
                    _ if pos.is_sign_negative() => PositionSide::Short,
                    _ => PositionSide::Long,
                };
                (
                    side,
                    pos.abs(),
                    opt_decimal(&p.avg_px)?,
                    opt_decimal(&p.upl)?,
                    opt_decimal(&p.upl_ratio)?,
                    opt_decimal(&p.mark_px)?,
                )
            }
            None => (PositionSide::None, Decimal::ZERO, None, None, None, None),
        };

        let mark_price = match mark {
            Some(px) => px,
            None => self.fetch_mark_price(inst_id, timeout).await?,
        };

        Ok(PositionState {
            inst_id: inst_id.to_string(),
            account_balance,
            side,
            size,
            entry_price,
            unrealized_pnl_ratio: upl_ratio,
            unrealized_pnl: upl,
            mark_price,
            max_leverage: spec.max_leverage,
            ct_val: spec.ct_val,
            lot_sz: spec.lot_sz,
            min_sz: spec.min_sz,
        })
    }

    async fn place_order(&self, order: &OrderRequest, timeout: Option<Duration>) -> Result<OrderResult> {
        let mut body = serde_json::json!({
            "instId": order.inst_id,
            "tdMode": order.mode.as_str(),
            "side": order.side.as_str(),
            "ordType": "market",
            "sz": order.size.normalize().to_string(),
        });
        if order.reduce_only {
            body["reduceOnly"] = serde_json::Value::Bool(true);
        }

        let envelope: Envelope<OrderAck> = self
            .request(
                Method::POST,
                "/api/v5/trade/order",
                Some(body.to_string()),
                true,
                timeout,
            )
            .await?;

        let ack = envelope.data.first();
        if envelope.code != "0" {
            return Err(match ack {
                Some(a) if !a.s_code.is_empty() && a.s_code != "0" => {
                    BotError::exchange(a.s_code.clone(), a.s_msg.clone())
                }
                _ => BotError::exchange(envelope.code, envelope.msg),
            });
        }

        let ack = ack.ok_or_else(|| BotError::Decode("empty order acknowledgement".to_string()))?;
        if ack.s_code != "0" {
            return Err(BotError::exchange(ack.s_code.clone(), ack.s_msg.clone()));
        }

        tracing::info!(
            "✅ Order accepted: {} {} {} (ordId {})",
            order.side.as_str(),
            order.size,
            order.inst_id,
            ack.ord_id
        );

        Ok(OrderResult {
            order_id: ack.ord_id.clone(),
            client_order_id: Some(ack.cl_ord_id.clone()).filter(|s| !s.is_empty()),
            inst_id: order.inst_id.clone(),
            side: order.side,
            size: order.size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CandleInterval, OrderSide, TradeMode};
    use mockito::Matcher;

    fn settings_for(server: &mockito::Server) -> ExchangeSettings {
        ExchangeSettings {
            base_url: server.url(),
            ..ExchangeSettings::default()
        }
    }

    fn test_credentials() -> OkxCredentials {
        OkxCredentials {
            api_key: "key".to_string(),
            secret: "secret".to_string(),
            passphrase: "pass".to_string(),
        }
    }

    #[test]
    fn test_sign_is_deterministic() {
        let creds = test_credentials();
        let a = creds
            .sign("2020-12-08T09:08:57.715Z", "GET", "/api/v5/account/balance?ccy=USDT", "")
            .unwrap();
        let b = creds
            .sign("2020-12-08T09:08:57.715Z", "GET", "/api/v5/account/balance?ccy=USDT", "")
            .unwrap();
        assert_eq!(a, b);
        // 32-byte digest -> 44 base64 chars
        assert_eq!(a.len(), 44);

        let c = creds
            .sign("2020-12-08T09:08:57.715Z", "POST", "/api/v5/account/balance?ccy=USDT", "")
            .unwrap();
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn test_fetch_candles_sorted_ascending() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v5/market/candles")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("instId".into(), "SOL-USDT-SWAP".into()),
                Matcher::UrlEncoded("bar".into(), "15m".into()),
                Matcher::UrlEncoded("limit".into(), "2".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"code":"0","msg":"","data":[
                    ["1746785700000","174.5","175.0","174.1","174.9","1200","0","0","0"],
                    ["1746784800000","174.0","174.6","173.9","174.5","900","0","0","1"]
                ]}"#,
            )
            .create_async()
            .await;

        let client = OkxClient::new(&settings_for(&server), None).unwrap();
        let candles = client
            .fetch_candles(&CandleQuery::recent("SOL-USDT-SWAP", CandleInterval::Minutes(15), 2))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(candles.len(), 2);
        assert!(candles[0].begin_time < candles[1].begin_time);
        assert_eq!(candles[0].close, 174.5);
        assert_eq!(candles[1].volume, 1200.0);
    }

    #[tokio::test]
    async fn test_history_paging_uses_after_param() {
        let mut server = mockito::Server::new_async().await;
        let before = DateTime::from_timestamp_millis(1746784800000).unwrap();
        let mock = server
            .mock("GET", "/api/v5/market/history-candles")
            .match_query(Matcher::UrlEncoded("after".into(), "1746784800000".into()))
            .with_status(200)
            .with_body(r#"{"code":"0","msg":"","data":[]}"#)
            .create_async()
            .await;

        let client = OkxClient::new(&settings_for(&server), None).unwrap();
        let candles = client
            .fetch_candles(
                &CandleQuery::recent("SOL-USDT-SWAP", CandleInterval::Minutes(15), 500).before(before),
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(candles.is_empty());
    }

    #[tokio::test]
    async fn test_error_code_maps_to_exchange_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v5/market/candles")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"code":"51001","msg":"Instrument ID does not exist","data":[]}"#)
            .create_async()
            .await;

        let client = OkxClient::new(&settings_for(&server), None).unwrap();
        let err = client
            .fetch_candles(&CandleQuery::recent("NOPE-USDT-SWAP", CandleInterval::Minutes(15), 10))
            .await
            .unwrap_err();

        assert!(matches!(err, BotError::Exchange { ref code, .. } if code == "51001"));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_429_is_rate_limited() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v5/market/candles")
            .match_query(Matcher::Any)
            .with_status(429)
            .with_body(r#"{"code":"50011","msg":"Too Many Requests"}"#)
            .create_async()
            .await;

        let client = OkxClient::new(&settings_for(&server), None).unwrap();
        let err = client
            .fetch_candles(&CandleQuery::recent("SOL-USDT-SWAP", CandleInterval::Minutes(15), 10))
            .await
            .unwrap_err();

        assert!(matches!(err, BotError::RateLimited(_)));
    }

    #[tokio::test]
    async fn test_private_endpoint_requires_credentials() {
        let server = mockito::Server::new_async().await;
        let client = OkxClient::new(&settings_for(&server), None).unwrap();
        let err = client.fetch_balance(None).await.unwrap_err();
        assert!(matches!(err, BotError::Config(_)));
    }

    #[tokio::test]
    async fn test_fetch_position_combines_endpoints() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v5/public/instruments")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"code":"0","msg":"","data":[{"lever":"50","ctVal":"1","lotSz":"0.01","minSz":"0.01"}]}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/api/v5/account/balance")
            .match_query(Matcher::Any)
            .match_header("OK-ACCESS-KEY", "key")
            .with_status(200)
            .with_body(r#"{"code":"0","msg":"","data":[{"details":[{"ccy":"USDT","availEq":"250.5","eq":"300"}]}]}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/api/v5/account/positions")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"code":"0","msg":"","data":[{"pos":"-1.5","posSide":"net","avgPx":"180.2","upl":"-0.75","uplRatio":"-0.02","markPx":"180.7"}]}"#,
            )
            .create_async()
            .await;

        let client = OkxClient::new(&settings_for(&server), Some(test_credentials())).unwrap();
        let position = client.fetch_position("SOL-USDT-SWAP", None).await.unwrap();

        assert_eq!(position.side, PositionSide::Short);
        assert_eq!(position.size, Decimal::new(15, 1));
        assert_eq!(position.account_balance, Decimal::new(2505, 1));
        assert_eq!(position.mark_price, Decimal::new(1807, 1));
        assert_eq!(position.max_leverage, Decimal::from(50));
        assert_eq!(position.entry_price, Some(Decimal::new(1802, 1)));

        // Spec comes from the cache the second time
        client.fetch_position("SOL-USDT-SWAP", None).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_order_surfaces_s_code() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v5/trade/order")
            .match_body(Matcher::PartialJsonString(
                r#"{"instId":"SOL-USDT-SWAP","side":"buy","ordType":"market","tdMode":"cross"}"#.to_string(),
            ))
            .with_status(200)
            .with_body(
                r#"{"code":"1","msg":"All operations failed","data":[{"ordId":"","clOrdId":"","sCode":"51008","sMsg":"Insufficient margin"}]}"#,
            )
            .create_async()
            .await;

        let client = OkxClient::new(&settings_for(&server), Some(test_credentials())).unwrap();
        let order = OrderRequest {
            inst_id: "SOL-USDT-SWAP".to_string(),
            side: OrderSide::Buy,
            size: Decimal::new(64, 2),
            mode: TradeMode::Cross,
            reduce_only: false,
        };
        let err = client.place_order(&order, None).await.unwrap_err();
        assert!(matches!(err, BotError::Exchange { ref code, .. } if code == "51008"));
    }

    #[tokio::test]
    async fn test_accepted_order_returns_id() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v5/trade/order")
            .match_body(Matcher::PartialJsonString(r#"{"reduceOnly":true}"#.to_string()))
            .with_status(200)
            .with_body(
                r#"{"code":"0","msg":"","data":[{"ordId":"312269865356374016","clOrdId":"","sCode":"0","sMsg":""}]}"#,
            )
            .create_async()
            .await;

        let client = OkxClient::new(&settings_for(&server), Some(test_credentials())).unwrap();
        let order = OrderRequest {
            inst_id: "SOL-USDT-SWAP".to_string(),
            side: OrderSide::Sell,
            size: Decimal::new(150, 2),
            mode: TradeMode::Cross,
            reduce_only: true,
        };
        let result = client.place_order(&order, None).await.unwrap();
        assert_eq!(result.order_id, "312269865356374016");
        assert_eq!(result.client_order_id, None);
    }
}

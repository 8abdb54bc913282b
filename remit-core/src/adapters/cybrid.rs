//! Cybrid API client
//!
//! Handles communication with the Cybrid bank API for trade submission,
//! identity verification uploads, and corridor price quotes. A remittance is
//! submitted as quote-then-trade; the trade guid becomes the transaction's
//! canonical remote identifier.
//!
//! Failure classification happens here, at the wire boundary: timeouts and
//! connection errors are transient, HTTP 5xx and 429 are transient, every
//! other non-success status is a terminal rejection.

use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use url::Url;

use crate::domain::result::{Error, Result};
use crate::domain::{DocPayload, SendPayload};
use crate::ports::{RateQuote, RemoteAck, RemoteProvider};

/// Seconds a cached bearer token is considered fresh before its expiry
const TOKEN_EXPIRY_SKEW_SECS: i64 = 60;

/// Request timeout for every remote call
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the Cybrid provider
#[derive(Debug, Clone)]
pub struct CybridConfig {
    /// Bank API base URL (e.g. "https://bank.production.cybrid.app")
    pub base_url: String,
    /// Token endpoint of the app backend issuing short-lived bearer tokens
    pub token_url: String,
    /// Corridor symbol quoted for rates (e.g. "USD-SLL")
    pub corridor: String,
    /// Fee fraction applied to the sent amount
    pub fee_pct: Decimal,
}

/// Cybrid API client implementing the remote provider port
pub struct CybridProvider {
    client: reqwest::blocking::Client,
    config: CybridConfig,
    token: Mutex<Option<CachedToken>>,
    /// Last successful quote, served as the offline fallback
    last_quote: Mutex<Option<RateQuote>>,
}

struct CachedToken {
    value: String,
    expires_at: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct PriceListResponse {
    #[serde(default)]
    objects: Vec<PriceObject>,
}

#[derive(Debug, Deserialize)]
struct PriceObject {
    #[serde(default)]
    buy_price: Option<String>,
    #[serde(default)]
    sell_price: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    guid: String,
}

#[derive(Debug, Deserialize)]
struct TradeResponse {
    guid: String,
    #[serde(default)]
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdentityVerificationResponse {
    guid: String,
}

impl CybridProvider {
    /// Create a new Cybrid provider
    pub fn new(config: CybridConfig) -> Result<Self> {
        let parsed = Url::parse(&config.base_url)
            .map_err(|_| Error::Config(format!("Invalid Cybrid base URL: {}", config.base_url)))?;
        if parsed.scheme() != "https" {
            return Err(Error::Config("Cybrid base URL must use HTTPS".to_string()));
        }
        if config.token_url.is_empty() {
            return Err(Error::Config(
                "Provider tokenUrl not configured - set provider.tokenUrl in settings.json \
                 or enable demo mode"
                    .to_string(),
            ));
        }
        Url::parse(&config.token_url)
            .map_err(|_| Error::Config(format!("Invalid token URL: {}", config.token_url)))?;

        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            token: Mutex::new(None),
            last_quote: Mutex::new(None),
        })
    }

    /// Get a bearer token, reusing the cached one while it is fresh
    fn bearer(&self) -> Result<String> {
        let now = Utc::now().timestamp();
        {
            let cached = self.token.lock().unwrap();
            if let Some(token) = cached.as_ref() {
                if now < token.expires_at - TOKEN_EXPIRY_SKEW_SECS {
                    return Ok(token.value.clone());
                }
            }
        }

        let response = self
            .client
            .get(&self.config.token_url)
            .send()
            .map_err(map_request_error)?;
        check_response_status("token", &response)?;
        let body: TokenResponse = response
            .json()
            .map_err(|e| Error::terminal(format!("Malformed token response: {}", e)))?;

        let expires_at = now + body.expires_in.unwrap_or(900);
        let mut cached = self.token.lock().unwrap();
        *cached = Some(CachedToken {
            value: body.access_token.clone(),
            expires_at,
        });
        Ok(body.access_token)
    }

    fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        label: &str,
        path: &str,
        body: &serde_json::Value,
        idempotency_key: Option<&str>,
    ) -> Result<T> {
        let token = self.bearer()?;
        let mut request = self
            .client
            .post(format!("{}{}", self.config.base_url, path))
            .bearer_auth(token)
            .json(body);
        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }

        let response = request.send().map_err(map_request_error)?;
        check_response_status(label, &response)?;
        response
            .json()
            .map_err(|e| Error::terminal(format!("Malformed {} response: {}", label, e)))
    }
}

impl RemoteProvider for CybridProvider {
    fn name(&self) -> &str {
        "cybrid"
    }

    fn fetch_rate(&self, pair: &str) -> Result<RateQuote> {
        let fetched = (|| -> Result<RateQuote> {
            let token = self.bearer()?;
            let response = self
                .client
                .get(format!("{}/api/prices", self.config.base_url))
                .query(&[("symbol", pair), ("page", "0"), ("per_page", "1")])
                .bearer_auth(token)
                .send()
                .map_err(map_request_error)?;
            check_response_status("prices", &response)?;

            let body: PriceListResponse = response
                .json()
                .map_err(|e| Error::terminal(format!("Malformed prices response: {}", e)))?;
            let object = body
                .objects
                .first()
                .ok_or_else(|| Error::terminal(format!("No price returned for {}", pair)))?;
            let raw = object
                .buy_price
                .as_ref()
                .or(object.sell_price.as_ref())
                .ok_or_else(|| Error::terminal(format!("Price object for {} has no price", pair)))?;
            let rate = raw
                .parse::<Decimal>()
                .map_err(|_| Error::terminal(format!("Unparseable price: {}", raw)))?;

            Ok(RateQuote {
                rate,
                fee_pct: self.config.fee_pct,
            })
        })();

        match fetched {
            Ok(quote) => {
                *self.last_quote.lock().unwrap() = Some(quote);
                Ok(quote)
            }
            // Offline: fall back to the last quote seen, if any
            Err(e) if e.is_transient() => {
                let cached = self.last_quote.lock().unwrap();
                cached.as_ref().copied().ok_or(e)
            }
            Err(e) => Err(e),
        }
    }

    fn submit_transaction(&self, payload: &SendPayload, idempotency_key: &str) -> Result<RemoteAck> {
        // 1) Create quote
        let quote: QuoteResponse = self.post_json(
            "quote",
            "/api/quotes",
            &serde_json::json!({
                "product_type": "trading",
                "customer_guid": payload.user_id,
                "symbol": self.config.corridor,
                "side": "sell",
                "deliver_amount": payload.amount.to_string(),
            }),
            None,
        )?;

        // 2) Execute trade; the idempotency key makes redelivery safe
        let trade: TradeResponse = self.post_json(
            "trade",
            "/api/trades",
            &serde_json::json!({
                "quote_guid": quote.guid,
                "customer_guid": payload.user_id,
            }),
            Some(idempotency_key),
        )?;

        Ok(RemoteAck {
            remote_id: trade.guid,
            state: trade.state,
        })
    }

    fn upload_document(&self, payload: &DocPayload, idempotency_key: &str) -> Result<RemoteAck> {
        let verification: IdentityVerificationResponse = self.post_json(
            "identity_verification",
            "/api/identity_verifications",
            &serde_json::json!({
                "customer_guid": payload.user_id,
                "type": "kyc",
                "document_uri": payload.uri,
                "document_mime": payload.mime,
            }),
            Some(idempotency_key),
        )?;

        Ok(RemoteAck {
            remote_id: verification.guid,
            state: None,
        })
    }
}

/// Map request-level errors: anything that never reached a response is
/// transient by definition.
fn map_request_error(error: reqwest::Error) -> Error {
    if error.is_timeout() {
        Error::transient(format!("Connection timed out after {}s", REQUEST_TIMEOUT.as_secs()))
    } else if error.is_connect() {
        Error::transient("Unable to connect to Cybrid servers".to_string())
    } else {
        Error::transient(format!("Cybrid request failed: {}", error))
    }
}

/// Classify response status: 5xx/429 may clear up, other non-success is a
/// rejection.
fn check_response_status(label: &str, response: &reqwest::blocking::Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else if status.is_server_error() || status.as_u16() == 429 {
        Err(Error::transient(format!("{}: HTTP {}", label, status.as_u16())))
    } else {
        Err(Error::terminal(format!("{}: HTTP {}", label, status.as_u16())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> CybridConfig {
        CybridConfig {
            base_url: "https://bank.sandbox.cybrid.app".to_string(),
            token_url: "https://backend.example.com/token".to_string(),
            corridor: "USD-SLL".to_string(),
            fee_pct: Decimal::new(1, 2),
        }
    }

    #[test]
    fn test_reject_http_base_url() {
        let mut config = test_config();
        config.base_url = "http://bank.sandbox.cybrid.app".to_string();
        let result = CybridProvider::new(config);
        assert!(result.is_err());
        assert!(result.err().unwrap().to_string().contains("HTTPS"));
    }

    #[test]
    fn test_reject_malformed_urls() {
        let mut config = test_config();
        config.base_url = "not a url".to_string();
        assert!(CybridProvider::new(config).is_err());

        let mut config = test_config();
        config.token_url = "".to_string();
        assert!(CybridProvider::new(config).is_err());
    }

    #[test]
    fn test_accepts_valid_config() {
        assert!(CybridProvider::new(test_config()).is_ok());
    }
}

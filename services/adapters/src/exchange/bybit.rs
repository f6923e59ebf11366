//! Public REST market-data client

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use types::{Candle, Ticker, Timeframe};

use super::MarketDataClient;
use crate::settings::RestSettings;
use crate::{AdapterError, Result};

/// Venue response envelope: `{retCode, retMsg, result}`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    ret_code: i64,
    #[serde(default)]
    ret_msg: String,
    #[serde(default)]
    result: Value,
}

/// Unauthenticated client for `/v5/market/*`
pub struct BybitPublicClient {
    http: reqwest::Client,
    settings: RestSettings,
}

impl BybitPublicClient {
    pub fn new(settings: RestSettings) -> Result<Self> {
        settings.validate()?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.request_timeout_ms))
            .build()?;
        Ok(Self { http, settings })
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let url = format!("{}{}", self.settings.base_url.trim_end_matches('/'), path);
        debug!(%url, ?query, "REST request");
        let envelope: Envelope = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if envelope.ret_code != 0 {
            return Err(AdapterError::Rest {
                endpoint: path.to_string(),
                code: envelope.ret_code,
                message: envelope.ret_msg,
            });
        }
        Ok(envelope.result)
    }
}

/// `result.list` of a market response
fn result_list(result: &Value) -> Result<&Value> {
    result
        .get("list")
        .ok_or_else(|| AdapterError::from(codec::ProtocolError::MissingField {
            field: "list",
            context: "REST result",
        }))
}

#[async_trait]
impl MarketDataClient for BybitPublicClient {
    async fn get_klines(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        let result = self
            .get(
                "/v5/market/kline",
                &[
                    ("category", self.settings.category.clone()),
                    ("symbol", symbol.to_string()),
                    ("interval", timeframe.interval().to_string()),
                    ("limit", limit.clamp(1, 1000).to_string()),
                ],
            )
            .await?;
        let candles =
            codec::parse_kline_rows(result_list(&result)?, timeframe, types::current_timestamp_ms())?;
        debug!(symbol, %timeframe, count = candles.len(), "Fetched klines");
        Ok(candles)
    }

    async fn get_tickers(&self, symbol: &str) -> Result<Vec<Ticker>> {
        let result = self
            .get(
                "/v5/market/tickers",
                &[
                    ("category", self.settings.category.clone()),
                    ("symbol", symbol.to_string()),
                ],
            )
            .await?;
        let list = result_list(&result)?
            .as_array()
            .cloned()
            .unwrap_or_default();
        list.iter()
            .map(|item| codec::parse_ticker(item).map_err(AdapterError::from))
            .collect()
    }
}

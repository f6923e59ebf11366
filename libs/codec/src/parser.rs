//! Payload decoding for candle and ticker topics
//!
//! Prices arrive either as JSON numbers or decimal strings. They are parsed
//! exactly into `Decimal` first and only then narrowed to `f64` for the
//! analytics side, so a string like `"0.1"` never picks up binary noise on
//! the way in.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use types::{Candle, Ticker, Timeframe};

use crate::error::{ProtocolError, Result};

/// Number-or-string field as sent by the venue
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Lenient {
    Str(String),
    Int(i64),
    Float(f64),
}

impl Lenient {
    fn to_decimal(&self, field: &'static str) -> Result<Decimal> {
        let invalid = |value: String| ProtocolError::InvalidNumber { field, value };
        match self {
            Lenient::Str(s) if s.trim().is_empty() => Ok(Decimal::ZERO),
            Lenient::Str(s) => Decimal::from_str_exact(s.trim())
                .or_else(|_| Decimal::from_scientific(s.trim()))
                .map_err(|_| invalid(s.clone())),
            Lenient::Int(i) => Ok(Decimal::from(*i)),
            Lenient::Float(f) => Decimal::try_from(*f).map_err(|_| invalid(f.to_string())),
        }
    }

    fn to_i64(&self, field: &'static str) -> Result<i64> {
        match self {
            Lenient::Int(i) => Ok(*i),
            Lenient::Str(s) => s.trim().parse().map_err(|_| ProtocolError::InvalidNumber {
                field,
                value: s.clone(),
            }),
            Lenient::Float(f) => Ok(*f as i64),
        }
    }
}

fn to_f64(value: Decimal, field: &'static str) -> Result<f64> {
    value.to_f64().ok_or(ProtocolError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

#[derive(Debug, Deserialize)]
struct RawKline {
    start: Lenient,
    open: Lenient,
    high: Lenient,
    low: Lenient,
    close: Lenient,
    volume: Lenient,
    #[serde(default)]
    confirm: bool,
}

impl RawKline {
    fn into_candle(self) -> Result<Candle> {
        Ok(Candle {
            timestamp_ms: self.start.to_i64("start")?,
            open: to_f64(self.open.to_decimal("open")?, "open")?,
            high: to_f64(self.high.to_decimal("high")?, "high")?,
            low: to_f64(self.low.to_decimal("low")?, "low")?,
            close: to_f64(self.close.to_decimal("close")?, "close")?,
            volume: to_f64(self.volume.to_decimal("volume")?, "volume")?,
            confirmed: self.confirm,
        })
    }
}

/// Treat a single object the same as a one-element array
fn records(data: &Value) -> Vec<&Value> {
    match data {
        Value::Array(items) => items.iter().collect(),
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

/// Decode the `data` array of a kline topic frame.
///
/// Partial ticks (zero price or volume) are returned as-is; the candle buffer
/// decides whether to apply them.
pub fn parse_candles(data: &Value) -> Result<Vec<Candle>> {
    records(data)
        .into_iter()
        .map(|item| {
            let raw: RawKline = RawKline::deserialize(item)?;
            raw.into_candle()
        })
        .collect()
}

/// Decode REST kline rows `[start, open, high, low, close, volume, turnover]`.
///
/// Rows arrive newest first; the result is oldest first. A row is marked
/// confirmed once its bucket has closed relative to `now_ms`.
pub fn parse_kline_rows(rows: &Value, timeframe: Timeframe, now_ms: i64) -> Result<Vec<Candle>> {
    let rows = rows
        .as_array()
        .ok_or_else(|| ProtocolError::unexpected("kline list is not an array"))?;

    let mut candles = Vec::with_capacity(rows.len());
    for row in rows {
        let cols: Vec<Lenient> = Vec::deserialize(row)?;
        if cols.len() < 6 {
            return Err(ProtocolError::unexpected(format!(
                "kline row has {} columns, need 6",
                cols.len()
            )));
        }
        let start = cols[0].to_i64("start")?;
        candles.push(Candle {
            timestamp_ms: start,
            open: to_f64(cols[1].to_decimal("open")?, "open")?,
            high: to_f64(cols[2].to_decimal("high")?, "high")?,
            low: to_f64(cols[3].to_decimal("low")?, "low")?,
            close: to_f64(cols[4].to_decimal("close")?, "close")?,
            volume: to_f64(cols[5].to_decimal("volume")?, "volume")?,
            confirmed: start + timeframe.duration_ms() <= now_ms,
        });
    }
    candles.sort_by_key(|c| c.timestamp_ms);
    candles.dedup_by_key(|c| c.timestamp_ms);
    Ok(candles)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTicker {
    symbol: String,
    last_price: Option<Lenient>,
    mark_price: Option<Lenient>,
    #[serde(rename = "price24hPcnt")]
    price_24h_pcnt: Option<Lenient>,
    #[serde(rename = "volume24h")]
    volume_24h: Option<Lenient>,
}

fn optional_decimal(v: Option<Lenient>, field: &'static str) -> Result<Option<Decimal>> {
    v.map(|l| l.to_decimal(field)).transpose()
}

/// Decode a ticker payload. Delta frames without `lastPrice` are rejected.
pub fn parse_ticker(data: &Value) -> Result<Ticker> {
    let item = records(data)
        .into_iter()
        .next()
        .ok_or_else(|| ProtocolError::EmptyPayload {
            topic: "tickers".to_string(),
        })?;
    let raw = RawTicker::deserialize(item)?;
    let last_price = raw
        .last_price
        .ok_or(ProtocolError::MissingField {
            field: "lastPrice",
            context: "ticker",
        })?
        .to_decimal("lastPrice")?;

    Ok(Ticker {
        symbol: raw.symbol,
        last_price,
        mark_price: optional_decimal(raw.mark_price, "markPrice")?,
        price_24h_pcnt: optional_decimal(raw.price_24h_pcnt, "price24hPcnt")?,
        volume_24h: optional_decimal(raw.volume_24h, "volume24h")?,
    })
}

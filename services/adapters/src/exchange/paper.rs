//! In-memory trading client
//!
//! Fills every order immediately at the request price (or the last mark set
//! with [`PaperTradingClient::set_mark_price`]). Used for dry runs and tests;
//! it never talks to the venue.

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;
use types::{OrderRecord, OrderRequest, Position};

use super::TradingClient;
use crate::{AdapterError, Result};

#[derive(Default)]
pub struct PaperTradingClient {
    positions: Mutex<HashMap<String, Position>>,
    leverage: Mutex<HashMap<String, u32>>,
    marks: Mutex<HashMap<String, Decimal>>,
    orders: Mutex<Vec<OrderRecord>>,
    next_id: AtomicU64,
}

impl PaperTradingClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_mark_price(&self, symbol: &str, price: Decimal) {
        self.marks.lock().insert(symbol.to_string(), price);
    }

    /// Flatten `symbol`, as if TP or SL had been hit
    pub fn close_position(&self, symbol: &str) {
        self.positions.lock().remove(symbol);
    }

    pub fn orders(&self) -> Vec<OrderRecord> {
        self.orders.lock().clone()
    }
}

#[async_trait]
impl TradingClient for PaperTradingClient {
    async fn get_position(&self, symbol: &str) -> Result<Position> {
        Ok(self
            .positions
            .lock()
            .get(symbol)
            .cloned()
            .unwrap_or_else(|| Position::flat(symbol)))
    }

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<()> {
        if leverage == 0 || leverage > 100 {
            return Err(AdapterError::Configuration(format!(
                "leverage {} out of range 1..=100",
                leverage
            )));
        }
        self.leverage.lock().insert(symbol.to_string(), leverage);
        Ok(())
    }

    async fn create_order(&self, request: &OrderRequest) -> Result<OrderRecord> {
        if request.qty <= Decimal::ZERO {
            return Err(AdapterError::Configuration(format!(
                "order quantity must be positive, got {}",
                request.qty
            )));
        }
        let fill = request
            .price
            .or_else(|| self.marks.lock().get(&request.symbol).copied())
            .ok_or_else(|| {
                AdapterError::NotSupported(format!(
                    "no reference price for market order on {}",
                    request.symbol
                ))
            })?;
        let leverage = self
            .leverage
            .lock()
            .get(&request.symbol)
            .copied()
            .unwrap_or(request.leverage);

        let record = OrderRecord {
            order_id: format!("paper-{}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1),
            symbol: request.symbol.clone(),
            side: request.side,
            qty: request.qty,
            entry_price: Some(fill),
            take_profit: request.take_profit,
            stop_loss: request.stop_loss,
            leverage,
            timestamp_ms: types::current_timestamp_ms(),
        };

        self.positions.lock().insert(
            request.symbol.clone(),
            Position {
                symbol: request.symbol.clone(),
                side: Some(request.side),
                size: request.qty,
                entry_price: fill,
                leverage,
                unrealised_pnl: Decimal::ZERO,
            },
        );
        self.orders.lock().push(record.clone());
        info!(order_id = %record.order_id, symbol = %record.symbol, side = %record.side,
              qty = %record.qty, price = %fill, "Paper order filled");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use types::Side;

    fn request(price: Option<Decimal>) -> OrderRequest {
        OrderRequest {
            symbol: "BTCUSDT".into(),
            side: Side::Buy,
            qty: dec!(0.01),
            price,
            take_profit: Some(dec!(102)),
            stop_loss: Some(dec!(99)),
            leverage: 5,
        }
    }

    #[tokio::test]
    async fn test_order_opens_position() {
        let client = PaperTradingClient::new();
        client.set_leverage("BTCUSDT", 7).await.unwrap();
        let record = client.create_order(&request(Some(dec!(100)))).await.unwrap();
        assert_eq!(record.leverage, 7);
        assert_eq!(record.entry_price, Some(dec!(100)));

        let pos = client.get_position("BTCUSDT").await.unwrap();
        assert!(pos.is_open());
        assert_eq!(pos.side, Some(Side::Buy));

        client.close_position("BTCUSDT");
        assert!(!client.get_position("BTCUSDT").await.unwrap().is_open());
        assert_eq!(client.orders().len(), 1);
    }

    #[tokio::test]
    async fn test_market_order_needs_reference_price() {
        let client = PaperTradingClient::new();
        assert!(client.create_order(&request(None)).await.is_err());
        client.set_mark_price("BTCUSDT", dec!(101));
        let record = client.create_order(&request(None)).await.unwrap();
        assert_eq!(record.entry_price, Some(dec!(101)));
    }

    #[tokio::test]
    async fn test_leverage_bounds() {
        let client = PaperTradingClient::new();
        assert!(client.set_leverage("BTCUSDT", 0).await.is_err());
        assert!(client.set_leverage("BTCUSDT", 101).await.is_err());
    }
}

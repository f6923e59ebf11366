//! # Stream Codec
//!
//! Encoding and decoding rules for the market-data stream: control frame
//! construction, inbound frame classification and payload decoding into the
//! shared `types` model.
//!
//! ## Architecture Role
//!
//! ```text
//! adapter-service (socket I/O) ──text──▶ codec::parse_frame ──▶ InboundFrame
//!                                         codec::parse_candles ──▶ Vec<Candle>
//! ```
//!
//! The codec never touches a socket. Every error it returns is recoverable:
//! the caller logs the frame and drops it.

pub mod error;
pub mod frames;
pub mod parser;

pub use error::{ProtocolError, Result};
pub use frames::{parse_frame, ControlFrame, DataFrame, InboundFrame, Op};
pub use parser::{parse_candles, parse_kline_rows, parse_ticker};

// Convert exchange-native wire payloads into canonical fixed-point ticks.
// All four numeric fields are scaled by 1000 and truncated, giving a fixed
// 3-decimal-digit precision contract across every exchange.

use chrono::Utc;

use crate::persist::types::{MarketTick, MARKET_CRYPTO};

use super::payloads::RawExchangePayload;
use super::Exchange;

/// Fixed-point scale: 3 decimal digits survive normalisation.
pub const PRICE_SCALE: f64 = 1e3;

/// Ticks priced below this pre-scaling are placeholder/garbage quotes.
pub const MIN_PRICE: f64 = 0.1;

/// Percent-change sentinel for exchanges whose schema has no such field.
pub const PERCENT_UNAVAILABLE: &str = "nil";

#[derive(Debug, thiserror::Error)]
pub enum NormaliseError {
    #[error("unparsable {field} value {value:?}")]
    Unparsable { field: &'static str, value: String },

    #[error("price {0} below minimum 0.1")]
    PriceBelowMinimum(f64),

    #[error("unsupported payload variant {0}")]
    UnsupportedVariant(&'static str),
}

/// Map one raw payload to a canonical tick, or reject it. The output is
/// always fully populated; there is no partial tick.
pub fn normalise(payload: RawExchangePayload) -> Result<MarketTick, NormaliseError> {
    match payload {
        RawExchangePayload::Binance(t) => build_tick(
            Exchange::Binance,
            t.symbol,
            &t.last_price,
            &t.volume,
            &t.high_price,
            &t.low_price,
            t.price_change_percent,
        ),
        RawExchangePayload::Bybit(t) => build_tick(
            Exchange::Bybit,
            t.symbol,
            &t.last_price,
            &t.volume_24h,
            &t.high_price_24h,
            &t.low_price_24h,
            t.price_24h_pcnt,
        ),
        RawExchangePayload::Okx(t) => build_tick(
            Exchange::Okx,
            t.inst_id,
            &t.last,
            &t.vol_ccy_24h,
            &t.high_24h,
            &t.low_24h,
            PERCENT_UNAVAILABLE.to_string(),
        ),
        RawExchangePayload::Coinbase(t) => build_tick(
            Exchange::Coinbase,
            t.product_id,
            &t.price,
            &t.volume_24h,
            &t.high_24h,
            &t.low_24h,
            PERCENT_UNAVAILABLE.to_string(),
        ),
        // No normalisation mapping for this schema yet.
        unsupported => Err(NormaliseError::UnsupportedVariant(
            unsupported.variant_name(),
        )),
    }
}

fn build_tick(
    exchange: Exchange,
    symbol: String,
    price: &str,
    volume: &str,
    high: &str,
    low: &str,
    price_change_percent: String,
) -> Result<MarketTick, NormaliseError> {
    let price = parse_field("price", price)?;
    if price < MIN_PRICE {
        return Err(NormaliseError::PriceBelowMinimum(price));
    }
    let volume = parse_field("volume", volume)?;
    let high = parse_field("high", high)?;
    let low = parse_field("low", low)?;

    Ok(MarketTick {
        exchange: exchange.as_str().to_string(),
        symbol,
        market: MARKET_CRYPTO.to_string(),
        price: scale(price),
        volume: scale(volume),
        high: scale(high),
        low: scale(low),
        price_change_percent,
        timestamp: Utc::now(),
    })
}

fn parse_field(field: &'static str, raw: &str) -> Result<f64, NormaliseError> {
    raw.parse::<f64>().map_err(|_| NormaliseError::Unparsable {
        field,
        value: raw.to_string(),
    })
}

// Truncation toward zero, never rounding.
fn scale(value: f64) -> i64 {
    (value * PRICE_SCALE) as i64
}

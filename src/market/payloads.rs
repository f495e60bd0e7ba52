// Exchange-native ticker shapes as they arrive off the queue.
// Numeric fields stay string-encoded until normalisation so no precision
// is lost before the fixed-point conversion.

use serde::Deserialize;

use super::Exchange;

/// Binance 24h rolling ticker (single-letter stream fields).
#[derive(Debug, Clone, Deserialize)]
pub struct BinanceTicker {
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "c")]
    pub last_price: String,
    #[serde(rename = "v")]
    pub volume: String,
    #[serde(rename = "h")]
    pub high_price: String,
    #[serde(rename = "l")]
    pub low_price: String,
    #[serde(rename = "P")]
    pub price_change_percent: String,
}

/// Bybit v5 spot ticker.
#[derive(Debug, Clone, Deserialize)]
pub struct BybitTicker {
    pub symbol: String,
    #[serde(rename = "lastPrice")]
    pub last_price: String,
    #[serde(rename = "volume24h")]
    pub volume_24h: String,
    #[serde(rename = "highPrice24h")]
    pub high_price_24h: String,
    #[serde(rename = "lowPrice24h")]
    pub low_price_24h: String,
    #[serde(rename = "price24hPcnt")]
    pub price_24h_pcnt: String,
}

/// OKX ticker. Carries no percent-change field.
#[derive(Debug, Clone, Deserialize)]
pub struct OkxTicker {
    #[serde(rename = "instId")]
    pub inst_id: String,
    pub last: String,
    #[serde(rename = "volCcy24h")]
    pub vol_ccy_24h: String,
    #[serde(rename = "high24h")]
    pub high_24h: String,
    #[serde(rename = "low24h")]
    pub low_24h: String,
}

/// Coinbase ticker channel message. Carries no percent-change field.
#[derive(Debug, Clone, Deserialize)]
pub struct CoinbaseTicker {
    pub product_id: String,
    pub price: String,
    #[serde(rename = "volume_24h")]
    pub volume_24h: String,
    #[serde(rename = "high_24h")]
    pub high_24h: String,
    #[serde(rename = "low_24h")]
    pub low_24h: String,
}

/// MOEX quote as republished by its connector. The only variant whose
/// numerics arrive as JSON numbers rather than strings.
#[derive(Debug, Clone, Deserialize)]
pub struct MoexTicker {
    pub product_id: String,
    pub price: f64,
    #[serde(rename = "volume_24h")]
    pub volume_24h: f64,
    #[serde(rename = "low_24h")]
    pub low_24h: f64,
    #[serde(rename = "high_24h")]
    pub high_24h: f64,
    pub best_bid: f64,
    pub best_ask: f64,
    pub time: String,
}

/// One raw payload, tagged by the exchange it came from.
#[derive(Debug, Clone)]
pub enum RawExchangePayload {
    Binance(BinanceTicker),
    Bybit(BybitTicker),
    Okx(OkxTicker),
    Coinbase(CoinbaseTicker),
    Moex(MoexTicker),
}

impl RawExchangePayload {
    /// Decode raw queue bytes into the variant implied by the configured
    /// exchange tag.
    pub fn decode(exchange: Exchange, body: &[u8]) -> Result<Self, serde_json::Error> {
        let payload = match exchange {
            Exchange::Binance => RawExchangePayload::Binance(serde_json::from_slice(body)?),
            Exchange::Bybit => RawExchangePayload::Bybit(serde_json::from_slice(body)?),
            Exchange::Okx => RawExchangePayload::Okx(serde_json::from_slice(body)?),
            Exchange::Coinbase => RawExchangePayload::Coinbase(serde_json::from_slice(body)?),
            Exchange::Moex => RawExchangePayload::Moex(serde_json::from_slice(body)?),
        };
        Ok(payload)
    }

    pub fn variant_name(&self) -> &'static str {
        match self {
            RawExchangePayload::Binance(_) => "BinanceTicker",
            RawExchangePayload::Bybit(_) => "BybitTicker",
            RawExchangePayload::Okx(_) => "OkxTicker",
            RawExchangePayload::Coinbase(_) => "CoinbaseTicker",
            RawExchangePayload::Moex(_) => "MoexTicker",
        }
    }
}

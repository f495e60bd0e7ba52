// Market data module entrypoint
pub mod payloads;    // exchange-native wire shapes (serde)
pub mod normaliser;  // converts raw payloads into canonical fixed-point ticks

use std::fmt;
use std::str::FromStr;

/// Which exchange this process instance consumes. Fixed for the process
/// lifetime; each connector publishes exactly one payload shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Exchange {
    Binance,
    Bybit,
    Okx,
    Coinbase,
    Moex,
}

impl Exchange {
    pub fn as_str(&self) -> &'static str {
        match self {
            Exchange::Binance => "binance",
            Exchange::Bybit => "bybit",
            Exchange::Okx => "okx",
            Exchange::Coinbase => "coinbase",
            Exchange::Moex => "moex",
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unsupported exchange: {0}")]
pub struct UnknownExchange(String);

impl FromStr for Exchange {
    type Err = UnknownExchange;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "binance" => Ok(Exchange::Binance),
            "bybit" => Ok(Exchange::Bybit),
            "okx" => Ok(Exchange::Okx),
            "coinbase" => Ok(Exchange::Coinbase),
            "moex" => Ok(Exchange::Moex),
            other => Err(UnknownExchange(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_supported_exchange() {
        for name in ["binance", "bybit", "okx", "coinbase", "moex"] {
            let exchange: Exchange = name.parse().unwrap();
            assert_eq!(exchange.as_str(), name);
        }
    }

    #[test]
    fn rejects_unknown_exchange() {
        assert!("kraken".parse::<Exchange>().is_err());
    }
}

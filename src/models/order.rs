//! Order model
//!
//! The signed limit order and its lifecycle state.

use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A maker-signed limit order.
///
/// Immutable once recorded: every field participates in the structural hash
/// that keys the order, so changing any field produces a different order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Account that signed and is bound by the order
    pub maker: Address,

    /// Asset the maker sells
    pub from_token: Address,

    /// Asset the maker buys
    pub to_token: Address,

    /// Exact input quantity of `from_token`
    pub amount_in: U256,

    /// Minimum acceptable output of `to_token` (slippage guard)
    pub amount_out_min: U256,

    /// Receiver of the swap output (usually the maker)
    pub recipient: Address,

    /// Unix timestamp after which the order can no longer be filled
    pub deadline: U256,

    /// Native-value fee escrowed at creation and paid to the filler
    pub fee: U256,
}

/// Order lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Recorded and fillable
    Open,
    /// Filled in full, terminal
    Filled,
    /// Canceled and refunded, terminal
    Canceled,
}

impl OrderStatus {
    /// Check whether the state admits no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::Canceled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Open => "open",
            OrderStatus::Filled => "filled",
            OrderStatus::Canceled => "canceled",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(OrderStatus::Open),
            "filled" => Ok(OrderStatus::Filled),
            "canceled" => Ok(OrderStatus::Canceled),
            _ => Err(format!("Invalid order status: {}", s)),
        }
    }
}

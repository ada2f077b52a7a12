//! Settlement types

use ethers::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};

use crate::models::Order;
use crate::token::TransferError;

/// Settlement engine errors. The message of each variant is a stable
/// identifier callers can match on; pool errors pass through with their
/// original text.
#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    #[error("called-by-contract")]
    CalledByContract,

    #[error("order-not-found")]
    OrderNotFound,

    #[error("already-filled")]
    AlreadyFilled,

    #[error("order-canceled")]
    OrderCanceled,

    #[error("order-expired")]
    OrderExpired,

    #[error("invalid-path")]
    InvalidPath,

    #[error("pair-not-found")]
    PairNotFound,

    #[error("invalid-fill-amount")]
    InvalidFillAmount,

    #[error("unauthorized")]
    Unauthorized,

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error("{0}")]
    Pool(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// A fill request: the full order fields as originally signed, the amount
/// the filler supplies, and the swap route to execute through.
#[derive(Debug, Clone)]
pub struct FillArgs {
    pub order: Order,

    /// Must equal the order's `amount_in`; fills are all-or-nothing
    pub fill_amount_in: U256,

    /// Token route from `from_token` to `to_token`
    pub path: Vec<Address>,
}

/// Outcome of a completed fill
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillReceipt {
    pub hash: H256,
    pub filler: Address,
    pub amount_in: U256,
    pub amount_out: U256,
    pub fee: U256,
}

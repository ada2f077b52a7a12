use anyhow::Context;
use ethers::types::{Address, U256};
use serde::Deserialize;

use crate::auth::eip712::SigningDomain;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Chain the signing domain is bound to
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,

    /// Verifying-contract address for the signing domain
    pub order_book_address: String,

    /// Account that escrows fees and executes fills
    pub settlement_account: String,

    /// Smallest fee an order may carry, in wei
    #[serde(default = "default_minimum_fee_wei")]
    pub minimum_fee_wei: String,

    // Signing domain identity
    #[serde(default = "default_domain_name")]
    pub domain_name: String,

    #[serde(default = "default_domain_version")]
    pub domain_version: String,

    /// Buffered capacity of the protocol event channel
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_chain_id() -> u64 {
    56 // BNB Smart Chain
}

fn default_minimum_fee_wei() -> String {
    "10000000000000000".to_string() // 0.01 in 18-decimal native units
}

fn default_domain_name() -> String {
    "SwapBook".to_string()
}

fn default_domain_version() -> String {
    "1".to_string()
}

fn default_event_capacity() -> usize {
    1024
}

impl AppConfig {
    /// Load from `SWAPBOOK_`-prefixed environment variables,
    /// e.g. `SWAPBOOK_ORDER_BOOK_ADDRESS`, `SWAPBOOK_CHAIN_ID`.
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("SWAPBOOK"))
            .build()?;

        let app_config: AppConfig = config.try_deserialize()?;
        Ok(app_config)
    }

    /// Minimum order fee as a 256-bit amount
    pub fn minimum_fee(&self) -> anyhow::Result<U256> {
        U256::from_dec_str(&self.minimum_fee_wei)
            .with_context(|| format!("invalid minimum_fee_wei: {}", self.minimum_fee_wei))
    }

    /// Parsed order-book address
    pub fn order_book_address(&self) -> anyhow::Result<Address> {
        self.order_book_address
            .parse()
            .with_context(|| format!("invalid order_book_address: {}", self.order_book_address))
    }

    /// Parsed settlement account
    pub fn settlement_account(&self) -> anyhow::Result<Address> {
        self.settlement_account
            .parse()
            .with_context(|| format!("invalid settlement_account: {}", self.settlement_account))
    }

    /// Signing domain derived from chain id and order-book address
    pub fn signing_domain(&self) -> anyhow::Result<SigningDomain> {
        Ok(SigningDomain {
            name: self.domain_name.clone(),
            version: self.domain_version.clone(),
            chain_id: self.chain_id,
            verifying_contract: self.order_book_address()?,
        })
    }
}

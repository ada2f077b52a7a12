//! Gasless, signature-based limit-order protocol core
//!
//! Makers sign limit orders off-chain (EIP-712) and attach a native fee
//! when the order is registered, so placing an order costs them no gas
//! beyond the fee itself. Fillers execute open orders against an external
//! liquidity pool and earn the escrowed fee for doing so.
//!
//! The pieces:
//! 1. [`registry::OrderBook`] validates, stores, and indexes signed orders
//! 2. [`settlement::Settlement`] escrows fees, executes fills, and refunds
//!    cancellations
//! 3. [`auth::eip712`] defines the struct hash that is an order's identity
//!    everywhere in the protocol

pub mod amm;
pub mod auth;
pub mod clock;
pub mod config;
pub mod events;
pub mod models;
pub mod registry;
pub mod settlement;
pub mod store;
pub mod token;

pub use auth::eip712::{order_struct_hash, signing_hash, SigningDomain};
pub use auth::{CallContext, CancelAuthorizer, MakerOnly};
pub use config::AppConfig;
pub use events::{EventBus, ProtocolEvent};
pub use models::{Order, OrderStatus};
pub use registry::{OrderBook, OrderBookError};
pub use settlement::{FillArgs, FillReceipt, Settlement, SettlementError};
pub use store::OrderStore;

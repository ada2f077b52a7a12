//! Order Settlement
//!
//! Executes signed limit orders against the external liquidity pool:
//! 1. The order book escrows each order's native fee here at creation
//! 2. Fillers trigger fills; the engine pulls maker funds, swaps them
//!    through the pool, and delivers output to the order's recipient
//! 3. The filler earns the escrowed fee; cancellation refunds it

mod engine;
mod types;

pub use engine::Settlement;
pub use types::*;

//! Liquidity pool interface
//!
//! The settlement engine quotes and executes swaps through an external
//! AMM. Two seams: pair derivation (used to validate a filler-supplied
//! swap path) and swap execution (which enforces the minimum-output
//! guard itself). Pool failures cross the seam untranslated so a filler
//! can tell a price-guard rejection from protocol validation.

use ethers::types::{Address, U256};

mod mock;

pub use mock::MockAmm;

/// Pool-originated failure, propagated verbatim
pub type PoolError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical pair derivation, used to validate every hop of a swap path
pub trait PairLookup: Send + Sync {
    /// Address of the pool trading `a` against `b`, if one exists
    fn pair_for(&self, a: Address, b: Address) -> Option<Address>;
}

/// Swap execution against the external pool
pub trait SwapRouter: Send + Sync {
    /// Swap an exact `amount_in` of `path[0]` for at least `amount_out_min`
    /// of the final path asset, delivering output to `recipient`. Input is
    /// drawn from `from`. Returns the amount at every path position.
    fn swap_exact_tokens_for_tokens(
        &self,
        from: Address,
        amount_in: U256,
        amount_out_min: U256,
        path: &[Address],
        recipient: Address,
        deadline: U256,
    ) -> Result<Vec<U256>, PoolError>;
}

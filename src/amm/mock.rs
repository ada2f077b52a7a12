//! In-process constant-product AMM
//!
//! Combined factory and router over the in-memory ledger, with UniswapV2
//! pricing (0.3% fee) and UniswapV2 failure tags, so settlement behavior
//! against a live pool is testable without a chain.

use dashmap::DashMap;
use ethers::types::{Address, U256};
use ethers::utils::keccak256;
use std::sync::Arc;

use super::{PairLookup, PoolError, SwapRouter};
use crate::clock::Clock;
use crate::token::{AssetLedger, InMemoryLedger};

struct PoolPair {
    address: Address,
    /// Reserve of the lower-sorted token
    reserve0: U256,
    /// Reserve of the higher-sorted token
    reserve1: U256,
}

/// Constant-product pool set backed by the in-memory ledger.
pub struct MockAmm {
    /// Ledger account holding the pool inventory
    account: Address,
    ledger: Arc<InMemoryLedger>,
    clock: Arc<dyn Clock>,
    /// (token0, token1) -> pair, keyed by sorted addresses
    pairs: DashMap<(Address, Address), PoolPair>,
}

impl MockAmm {
    pub fn new(account: Address, ledger: Arc<InMemoryLedger>, clock: Arc<dyn Clock>) -> Self {
        Self {
            account,
            ledger,
            clock,
            pairs: DashMap::new(),
        }
    }

    /// Seed (or top up) a pair, minting the reserves to the pool account
    pub fn add_liquidity(&self, token_a: Address, token_b: Address, amount_a: U256, amount_b: U256) {
        self.ledger.mint(token_a, self.account, amount_a);
        self.ledger.mint(token_b, self.account, amount_b);

        let (token0, token1) = sort_tokens(token_a, token_b);
        let (added0, added1) = if token_a == token0 {
            (amount_a, amount_b)
        } else {
            (amount_b, amount_a)
        };

        let mut pair = self.pairs.entry((token0, token1)).or_insert_with(|| PoolPair {
            address: derive_pair_address(token0, token1),
            reserve0: U256::zero(),
            reserve1: U256::zero(),
        });
        pair.reserve0 += added0;
        pair.reserve1 += added1;
    }

    /// Constant-product output with the 0.3% input fee:
    /// out = in * 997 * reserve_out / (reserve_in * 1000 + in * 997)
    fn amount_out(amount_in: U256, reserve_in: U256, reserve_out: U256) -> U256 {
        let amount_in_with_fee = amount_in * U256::from(997);
        let numerator = amount_in_with_fee * reserve_out;
        let denominator = reserve_in * U256::from(1000) + amount_in_with_fee;
        numerator / denominator
    }

    /// Reserves oriented as (reserve of `token_in`, reserve of `token_out`)
    fn reserves(&self, token_in: Address, token_out: Address) -> Option<(U256, U256)> {
        let (token0, token1) = sort_tokens(token_in, token_out);
        let pair = self.pairs.get(&(token0, token1))?;
        if token_in == token0 {
            Some((pair.reserve0, pair.reserve1))
        } else {
            Some((pair.reserve1, pair.reserve0))
        }
    }

    fn apply_swap(&self, token_in: Address, token_out: Address, amount_in: U256, amount_out: U256) {
        let (token0, token1) = sort_tokens(token_in, token_out);
        if let Some(mut pair) = self.pairs.get_mut(&(token0, token1)) {
            if token_in == token0 {
                pair.reserve0 += amount_in;
                pair.reserve1 -= amount_out;
            } else {
                pair.reserve1 += amount_in;
                pair.reserve0 -= amount_out;
            }
        }
    }

    /// Quote the amount at every position of `path` for an exact input
    pub fn get_amounts_out(&self, amount_in: U256, path: &[Address]) -> Result<Vec<U256>, PoolError> {
        if path.len() < 2 {
            return Err("INVALID_PATH".into());
        }
        if amount_in.is_zero() {
            return Err("INSUFFICIENT_INPUT_AMOUNT".into());
        }

        let mut amounts = vec![amount_in];
        let mut current = amount_in;
        for hop in path.windows(2) {
            let (reserve_in, reserve_out) = self
                .reserves(hop[0], hop[1])
                .ok_or("INSUFFICIENT_LIQUIDITY")?;
            if reserve_in.is_zero() || reserve_out.is_zero() {
                return Err("INSUFFICIENT_LIQUIDITY".into());
            }
            current = Self::amount_out(current, reserve_in, reserve_out);
            amounts.push(current);
        }
        Ok(amounts)
    }
}

impl PairLookup for MockAmm {
    fn pair_for(&self, a: Address, b: Address) -> Option<Address> {
        let key = sort_tokens(a, b);
        self.pairs.get(&key).map(|pair| pair.address)
    }
}

impl SwapRouter for MockAmm {
    fn swap_exact_tokens_for_tokens(
        &self,
        from: Address,
        amount_in: U256,
        amount_out_min: U256,
        path: &[Address],
        recipient: Address,
        deadline: U256,
    ) -> Result<Vec<U256>, PoolError> {
        if deadline < U256::from(self.clock.now()) {
            return Err("EXPIRED".into());
        }

        let amounts = self.get_amounts_out(amount_in, path)?;
        let amount_out = amounts[amounts.len() - 1];
        if amount_out < amount_out_min {
            return Err("INSUFFICIENT_OUTPUT_AMOUNT".into());
        }

        self.ledger.transfer(path[0], from, self.account, amount_in)?;
        for (i, hop) in path.windows(2).enumerate() {
            self.apply_swap(hop[0], hop[1], amounts[i], amounts[i + 1]);
        }
        self.ledger
            .transfer(path[path.len() - 1], self.account, recipient, amount_out)?;

        Ok(amounts)
    }
}

fn sort_tokens(a: Address, b: Address) -> (Address, Address) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Deterministic pair address from the sorted token pair
fn derive_pair_address(token0: Address, token1: Address) -> Address {
    let mut salt = Vec::with_capacity(40);
    salt.extend_from_slice(token0.as_bytes());
    salt.extend_from_slice(token1.as_bytes());
    Address::from_slice(&keccak256(&salt)[12..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    const NOW: u64 = 1_700_000_000;

    fn addr(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    fn setup() -> (MockAmm, Arc<InMemoryLedger>) {
        let ledger = Arc::new(InMemoryLedger::new());
        let clock = Arc::new(ManualClock::new(NOW));
        let amm = MockAmm::new(addr(0xAA), ledger.clone(), clock);
        (amm, ledger)
    }

    #[test]
    fn test_pair_for() {
        let (amm, _) = setup();
        let (wbnb, busd) = (addr(1), addr(2));

        assert!(amm.pair_for(wbnb, busd).is_none());

        amm.add_liquidity(wbnb, busd, U256::from(1000), U256::from(1000));
        let pair = amm.pair_for(wbnb, busd).unwrap();
        assert_eq!(amm.pair_for(busd, wbnb), Some(pair));
        assert_ne!(pair, Address::zero());
    }

    #[test]
    fn test_amount_out_formula() {
        // 1000 in against 10000/10000 reserves:
        // 997000 * 10000 / (10000 * 1000 + 997000) = 906
        let out = MockAmm::amount_out(U256::from(1000), U256::from(10_000), U256::from(10_000));
        assert_eq!(out, U256::from(906));
    }

    #[test]
    fn test_swap_moves_balances_and_reserves() {
        let (amm, ledger) = setup();
        let (wbnb, busd) = (addr(1), addr(2));
        let (trader, recipient) = (addr(3), addr(4));

        amm.add_liquidity(wbnb, busd, U256::from(10_000), U256::from(10_000));
        ledger.mint(wbnb, trader, U256::from(1000));

        let amounts = amm
            .swap_exact_tokens_for_tokens(
                trader,
                U256::from(1000),
                U256::from(900),
                &[wbnb, busd],
                recipient,
                U256::from(NOW + 60),
            )
            .unwrap();

        assert_eq!(amounts, vec![U256::from(1000), U256::from(906)]);
        assert_eq!(ledger.balance_of(wbnb, trader), U256::zero());
        assert_eq!(ledger.balance_of(busd, recipient), U256::from(906));

        // reserves shift: the next identical swap quotes worse
        let quote = amm.get_amounts_out(U256::from(1000), &[wbnb, busd]).unwrap();
        assert!(quote[1] < U256::from(906));
    }

    #[test]
    fn test_insufficient_output() {
        let (amm, ledger) = setup();
        let (wbnb, busd) = (addr(1), addr(2));
        let trader = addr(3);

        amm.add_liquidity(wbnb, busd, U256::from(10_000), U256::from(10_000));
        ledger.mint(wbnb, trader, U256::from(1000));

        let err = amm
            .swap_exact_tokens_for_tokens(
                trader,
                U256::from(1000),
                U256::from(907),
                &[wbnb, busd],
                trader,
                U256::from(NOW + 60),
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "INSUFFICIENT_OUTPUT_AMOUNT");

        // nothing moved
        assert_eq!(ledger.balance_of(wbnb, trader), U256::from(1000));
        assert_eq!(ledger.balance_of(busd, trader), U256::zero());
    }

    #[test]
    fn test_multi_hop_path() {
        let (amm, ledger) = setup();
        let (wbnb, busd, cake) = (addr(1), addr(2), addr(5));
        let trader = addr(3);

        amm.add_liquidity(wbnb, busd, U256::from(10_000), U256::from(10_000));
        amm.add_liquidity(busd, cake, U256::from(10_000), U256::from(10_000));
        ledger.mint(wbnb, trader, U256::from(1000));

        let amounts = amm
            .swap_exact_tokens_for_tokens(
                trader,
                U256::from(1000),
                U256::zero(),
                &[wbnb, busd, cake],
                trader,
                U256::from(NOW + 60),
            )
            .unwrap();

        assert_eq!(amounts.len(), 3);
        assert_eq!(ledger.balance_of(cake, trader), amounts[2]);
        // intermediate hop output stays in the pool
        assert_eq!(ledger.balance_of(busd, trader), U256::zero());
    }

    #[test]
    fn test_missing_pair() {
        let (amm, _) = setup();
        let err = amm
            .get_amounts_out(U256::from(1000), &[addr(1), addr(2)])
            .unwrap_err();
        assert_eq!(err.to_string(), "INSUFFICIENT_LIQUIDITY");
    }

    #[test]
    fn test_expired_deadline() {
        let (amm, ledger) = setup();
        let (wbnb, busd) = (addr(1), addr(2));
        let trader = addr(3);

        amm.add_liquidity(wbnb, busd, U256::from(10_000), U256::from(10_000));
        ledger.mint(wbnb, trader, U256::from(1000));

        let err = amm
            .swap_exact_tokens_for_tokens(
                trader,
                U256::from(1000),
                U256::zero(),
                &[wbnb, busd],
                trader,
                U256::from(NOW - 1),
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "EXPIRED");
    }
}

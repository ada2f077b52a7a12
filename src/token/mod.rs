//! Asset transfer interface
//!
//! The protocol moves two kinds of value: fungible tokens (the assets being
//! traded, pulled from the maker under a prior allowance) and native value
//! (the escrowed fee). Both cross this trait so the core never talks to a
//! token contract directly; an in-memory implementation backs the tests and
//! lets embedders run the whole protocol off-chain.

use dashmap::DashMap;
use ethers::types::{Address, U256};

/// Asset transfer failures, surfaced unchanged to the caller of the
/// operation that triggered the movement.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    #[error("insufficient allowance: asset {asset:?} owner {owner:?}")]
    InsufficientAllowance { asset: Address, owner: Address },

    #[error("insufficient balance: asset {asset:?} owner {owner:?}")]
    InsufficientBalance { asset: Address, owner: Address },

    #[error("insufficient native balance: account {account:?}")]
    InsufficientNativeBalance { account: Address },
}

/// External fungible-token and native-value transfer surface.
///
/// `transfer_from` consumes an allowance the owner granted beforehand; the
/// recipient is the spender, matching how the settlement engine pulls maker
/// funds into its own account.
pub trait AssetLedger: Send + Sync {
    /// Allowance-consuming transfer of `asset` from `owner` to `recipient`
    fn transfer_from(
        &self,
        asset: Address,
        owner: Address,
        recipient: Address,
        amount: U256,
    ) -> Result<(), TransferError>;

    /// Direct transfer of `asset` out of an account the caller controls
    fn transfer(
        &self,
        asset: Address,
        from: Address,
        recipient: Address,
        amount: U256,
    ) -> Result<(), TransferError>;

    /// Native-value transfer (fee escrow movements)
    fn transfer_native(&self, from: Address, to: Address, amount: U256)
        -> Result<(), TransferError>;

    fn balance_of(&self, asset: Address, owner: Address) -> U256;

    fn native_balance_of(&self, owner: Address) -> U256;
}

/// In-memory ledger with ERC-20 balance/allowance semantics.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    /// (asset, owner) -> balance
    balances: DashMap<(Address, Address), U256>,

    /// (asset, owner, spender) -> remaining allowance
    allowances: DashMap<(Address, Address, Address), U256>,

    /// owner -> native balance
    native: DashMap<Address, U256>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `amount` of `asset` to `to`
    pub fn mint(&self, asset: Address, to: Address, amount: U256) {
        *self.balances.entry((asset, to)).or_default() += amount;
    }

    /// Grant `spender` the right to pull up to `amount` of `asset` from `owner`
    pub fn approve(&self, asset: Address, owner: Address, spender: Address, amount: U256) {
        self.allowances.insert((asset, owner, spender), amount);
    }

    pub fn allowance(&self, asset: Address, owner: Address, spender: Address) -> U256 {
        self.allowances
            .get(&(asset, owner, spender))
            .map(|v| *v)
            .unwrap_or_default()
    }

    /// Credit native value to an account
    pub fn deposit_native(&self, to: Address, amount: U256) {
        *self.native.entry(to).or_default() += amount;
    }

    fn debit(&self, asset: Address, owner: Address, amount: U256) -> Result<(), TransferError> {
        let mut balance = self.balances.entry((asset, owner)).or_default();
        if *balance < amount {
            return Err(TransferError::InsufficientBalance { asset, owner });
        }
        *balance -= amount;
        Ok(())
    }
}

impl AssetLedger for InMemoryLedger {
    fn transfer_from(
        &self,
        asset: Address,
        owner: Address,
        recipient: Address,
        amount: U256,
    ) -> Result<(), TransferError> {
        {
            let mut allowance = self.allowances.entry((asset, owner, recipient)).or_default();
            if *allowance < amount {
                return Err(TransferError::InsufficientAllowance { asset, owner });
            }
            *allowance -= amount;
        }
        if let Err(e) = self.debit(asset, owner, amount) {
            // restore the allowance consumed above
            *self.allowances.entry((asset, owner, recipient)).or_default() += amount;
            return Err(e);
        }
        *self.balances.entry((asset, recipient)).or_default() += amount;
        Ok(())
    }

    fn transfer(
        &self,
        asset: Address,
        from: Address,
        recipient: Address,
        amount: U256,
    ) -> Result<(), TransferError> {
        self.debit(asset, from, amount)?;
        *self.balances.entry((asset, recipient)).or_default() += amount;
        Ok(())
    }

    fn transfer_native(
        &self,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), TransferError> {
        {
            let mut balance = self.native.entry(from).or_default();
            if *balance < amount {
                return Err(TransferError::InsufficientNativeBalance { account: from });
            }
            *balance -= amount;
        }
        *self.native.entry(to).or_default() += amount;
        Ok(())
    }

    fn balance_of(&self, asset: Address, owner: Address) -> U256 {
        self.balances
            .get(&(asset, owner))
            .map(|v| *v)
            .unwrap_or_default()
    }

    fn native_balance_of(&self, owner: Address) -> U256 {
        self.native.get(&owner).map(|v| *v).unwrap_or_default()
    }
}

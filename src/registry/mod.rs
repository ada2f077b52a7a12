//! Order Registry
//!
//! Front door of the protocol:
//! 1. Validates submitted orders (field checks, fee policy, EIP-712
//!    signature recovery) in a fixed check order
//! 2. Escrows the attached native fee with the settlement engine and
//!    stores the order under its struct hash
//! 3. Serves paginated hash listings over all orders, per maker, and
//!    per token side

use std::sync::{Arc, OnceLock};

use ethers::types::{Address, H256, U256};
use tracing::{error, info};

use crate::auth::eip712::{
    order_struct_hash, order_typed_data, verify_order_signature, SigningDomain,
};
use crate::auth::CallContext;
use crate::clock::Clock;
use crate::events::{EventBus, ProtocolEvent};
use crate::models::Order;
use crate::settlement::Settlement;
use crate::store::OrderStore;
use crate::token::{AssetLedger, TransferError};

/// Order validation and wiring errors. Variant messages are stable
/// identifiers callers can match on.
#[derive(Debug, thiserror::Error)]
pub enum OrderBookError {
    #[error("invalid-maker")]
    InvalidMaker,

    #[error("invalid-from-token")]
    InvalidFromToken,

    #[error("invalid-to-token")]
    InvalidToToken,

    #[error("duplicate-tokens")]
    DuplicateTokens,

    #[error("invalid-amount-in")]
    InvalidAmountIn,

    #[error("invalid-amount-out-min")]
    InvalidAmountOutMin,

    #[error("invalid-recipient")]
    InvalidRecipient,

    #[error("invalid-deadline")]
    InvalidDeadline,

    #[error("not-enough-fee")]
    NotEnoughFee,

    #[error("invalid-fee-amount")]
    InvalidFeeAmount,

    #[error("invalid-signature")]
    InvalidSignature,

    #[error("order-exists")]
    OrderExists,

    #[error("caller-not-owner")]
    CallerNotOwner,

    #[error("settlement-already-set")]
    SettlementAlreadySet,

    #[error("settlement-not-set")]
    SettlementNotSet,

    #[error(transparent)]
    Transfer(#[from] TransferError),
}

/// Signed-order registry
pub struct OrderBook {
    /// Account allowed to wire the settlement engine
    owner: Address,
    /// Smallest fee an order may carry
    minimum_fee: U256,
    /// Signing domain orders must be signed under
    domain: SigningDomain,
    /// Order records and indices
    store: Arc<OrderStore>,
    /// Native balance movements for fee escrow
    ledger: Arc<dyn AssetLedger>,
    /// Protocol event fan-out
    events: EventBus,
    /// Time source for deadline validation
    clock: Arc<dyn Clock>,
    /// Settlement engine, wired once by the owner
    settlement: OnceLock<Arc<Settlement>>,
}

impl OrderBook {
    pub fn new(
        owner: Address,
        minimum_fee: U256,
        domain: SigningDomain,
        store: Arc<OrderStore>,
        ledger: Arc<dyn AssetLedger>,
        events: EventBus,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            owner,
            minimum_fee,
            domain,
            store,
            ledger,
            events,
            clock,
            settlement: OnceLock::new(),
        }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn minimum_fee(&self) -> U256 {
        self.minimum_fee
    }

    pub fn domain(&self) -> &SigningDomain {
        &self.domain
    }

    /// Wire the settlement engine. Owner-only, and only once.
    pub fn set_settlement(
        &self,
        ctx: &CallContext,
        settlement: Arc<Settlement>,
    ) -> Result<(), OrderBookError> {
        if ctx.sender != self.owner {
            return Err(OrderBookError::CallerNotOwner);
        }
        self.settlement
            .set(settlement)
            .map_err(|_| OrderBookError::SettlementAlreadySet)
    }

    /// Validate a signed order, escrow the attached native fee, and store
    /// the order under its struct hash. `attached_value` is the native
    /// amount the sender put up with the call; it must equal the order's
    /// fee exactly and is moved into the settlement account on success.
    pub fn create_order(
        &self,
        ctx: &CallContext,
        order: Order,
        signature: &str,
        attached_value: U256,
    ) -> Result<H256, OrderBookError> {
        let settlement = self
            .settlement
            .get()
            .ok_or(OrderBookError::SettlementNotSet)?;

        // Field checks run in a fixed order so a given bad order always
        // reports the same error.
        if order.maker.is_zero() {
            return Err(OrderBookError::InvalidMaker);
        }
        if order.from_token.is_zero() {
            return Err(OrderBookError::InvalidFromToken);
        }
        if order.to_token.is_zero() {
            return Err(OrderBookError::InvalidToToken);
        }
        if order.from_token == order.to_token {
            return Err(OrderBookError::DuplicateTokens);
        }
        if order.amount_in.is_zero() {
            return Err(OrderBookError::InvalidAmountIn);
        }
        if order.amount_out_min.is_zero() {
            return Err(OrderBookError::InvalidAmountOutMin);
        }
        if order.recipient.is_zero() {
            return Err(OrderBookError::InvalidRecipient);
        }
        if order.deadline <= U256::from(self.clock.now()) {
            return Err(OrderBookError::InvalidDeadline);
        }
        if order.fee < self.minimum_fee {
            return Err(OrderBookError::NotEnoughFee);
        }
        if attached_value != order.fee {
            return Err(OrderBookError::InvalidFeeAmount);
        }
        if !verify_order_signature(&order, signature, order.maker, &self.domain) {
            return Err(OrderBookError::InvalidSignature);
        }

        let hash = order_struct_hash(&order);
        if self.store.contains(hash) {
            return Err(OrderBookError::OrderExists);
        }

        // Escrow the fee, then store. The store is the arbiter of
        // duplicates; losing a concurrent race undoes the escrow.
        self.ledger
            .transfer_native(ctx.sender, settlement.account(), attached_value)?;

        let maker = order.maker;
        if !self.store.insert(hash, order) {
            if let Err(refund) =
                self.ledger
                    .transfer_native(settlement.account(), ctx.sender, attached_value)
            {
                error!("failed to refund duplicate order {:?}: {}", hash, refund);
            }
            return Err(OrderBookError::OrderExists);
        }
        settlement.deposit_fee(hash, attached_value);

        self.events
            .publish(ProtocolEvent::OrderCreated { hash, maker });

        info!(
            "order {:?} created by {:?}: fee {} escrowed",
            hash, maker, attached_value
        );

        Ok(hash)
    }

    /// Typed-data object a wallet signs to produce a valid order signature
    /// for this registry's domain
    pub fn order_typed_data(&self, order: &Order) -> serde_json::Value {
        order_typed_data(order, &self.domain)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn order_by_hash(&self, hash: H256) -> Option<Order> {
        self.store.order_by_hash(hash)
    }

    pub fn orders_count(&self) -> usize {
        self.store.orders_count()
    }

    pub fn order_hashes(&self, offset: usize, limit: usize) -> Vec<H256> {
        self.store.order_hashes(offset, limit)
    }

    pub fn maker_orders_count(&self, maker: Address) -> usize {
        self.store.maker_orders_count(maker)
    }

    pub fn maker_order_hashes(&self, maker: Address, offset: usize, limit: usize) -> Vec<H256> {
        self.store.maker_order_hashes(maker, offset, limit)
    }

    pub fn from_token_orders_count(&self, token: Address) -> usize {
        self.store.from_token_orders_count(token)
    }

    pub fn from_token_order_hashes(
        &self,
        token: Address,
        offset: usize,
        limit: usize,
    ) -> Vec<H256> {
        self.store.from_token_order_hashes(token, offset, limit)
    }

    pub fn to_token_orders_count(&self, token: Address) -> usize {
        self.store.to_token_orders_count(token)
    }

    pub fn to_token_order_hashes(&self, token: Address, offset: usize, limit: usize) -> Vec<H256> {
        self.store.to_token_order_hashes(token, offset, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amm::MockAmm;
    use crate::auth::eip712::signing_hash;
    use crate::clock::ManualClock;
    use crate::token::InMemoryLedger;
    use ethers::signers::{LocalWallet, Signer};

    const NOW: u64 = 1_600_000_000;
    const DEADLINE: u64 = 1_700_000_000;

    // Well-known development key (hardhat/anvil account 0)
    const DEV_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    const OWNER: u8 = 0x0a;
    const FROM_TOKEN: u8 = 0x22;
    const TO_TOKEN: u8 = 0x33;
    const BOOK: u8 = 0x44;
    const SETTLEMENT: u8 = 0x55;
    const POOL: u8 = 0x66;
    const RELAYER: u8 = 0x88;

    fn addr(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    struct Harness {
        ledger: Arc<InMemoryLedger>,
        clock: Arc<ManualClock>,
        events: EventBus,
        wallet: LocalWallet,
        settlement: Arc<Settlement>,
        book: OrderBook,
    }

    fn harness() -> Harness {
        let ledger = Arc::new(InMemoryLedger::new());
        let clock = Arc::new(ManualClock::new(NOW));
        let store = Arc::new(OrderStore::new());
        let events = EventBus::default();
        let amm = Arc::new(MockAmm::new(addr(POOL), ledger.clone(), clock.clone()));
        let wallet: LocalWallet = DEV_KEY.parse().unwrap();

        let settlement = Arc::new(Settlement::new(
            addr(SETTLEMENT),
            store.clone(),
            ledger.clone(),
            amm,
            events.clone(),
            clock.clone(),
        ));

        let book = OrderBook::new(
            addr(OWNER),
            U256::exp10(16),
            SigningDomain::new(56, addr(BOOK)),
            store,
            ledger.clone(),
            events.clone(),
            clock.clone(),
        );
        book.set_settlement(&CallContext::direct(addr(OWNER)), settlement.clone())
            .unwrap();

        // the relayer fronts native fees for submissions
        ledger.deposit_native(addr(RELAYER), U256::exp10(18));

        Harness {
            ledger,
            clock,
            events,
            wallet,
            settlement,
            book,
        }
    }

    fn order(h: &Harness) -> Order {
        Order {
            maker: h.wallet.address(),
            from_token: addr(FROM_TOKEN),
            to_token: addr(TO_TOKEN),
            amount_in: U256::exp10(18),
            amount_out_min: U256::exp10(18) * 90,
            recipient: h.wallet.address(),
            deadline: U256::from(DEADLINE),
            fee: U256::exp10(16),
        }
    }

    fn sign(h: &Harness, order: &Order) -> String {
        let sig = h.wallet.sign_hash(signing_hash(order, h.book.domain())).unwrap();
        format!("0x{}", sig)
    }

    fn create(h: &Harness, order: &Order) -> Result<H256, OrderBookError> {
        let signature = sign(h, order);
        h.book.create_order(
            &CallContext::direct(addr(RELAYER)),
            order.clone(),
            &signature,
            order.fee,
        )
    }

    #[test]
    fn test_create_order_happy_path() {
        let h = harness();
        let order = order(&h);
        let mut rx = h.events.subscribe();

        let hash = create(&h, &order).unwrap();
        assert_eq!(hash, order_struct_hash(&order));

        // stored and indexed
        assert_eq!(h.book.order_by_hash(hash), Some(order.clone()));
        assert_eq!(h.book.orders_count(), 1);
        assert_eq!(h.book.order_hashes(0, 10), vec![hash]);
        assert_eq!(h.book.maker_orders_count(order.maker), 1);
        assert_eq!(h.book.from_token_orders_count(order.from_token), 1);
        assert_eq!(h.book.to_token_orders_count(order.to_token), 1);

        // fee escrowed with the settlement engine
        assert_eq!(
            h.ledger.native_balance_of(addr(RELAYER)),
            U256::exp10(18) - order.fee
        );
        assert_eq!(h.ledger.native_balance_of(addr(SETTLEMENT)), order.fee);
        assert_eq!(h.settlement.escrowed_fee(hash), order.fee);
        assert_eq!(
            h.settlement.status_of(hash),
            Some(crate::models::OrderStatus::Open)
        );

        assert_eq!(
            rx.try_recv().unwrap(),
            ProtocolEvent::OrderCreated { hash, maker: order.maker }
        );
    }

    #[test]
    fn test_field_checks() {
        let h = harness();

        let mut bad = order(&h);
        bad.maker = Address::zero();
        assert!(matches!(create(&h, &bad), Err(OrderBookError::InvalidMaker)));

        let mut bad = order(&h);
        bad.from_token = Address::zero();
        assert!(matches!(create(&h, &bad), Err(OrderBookError::InvalidFromToken)));

        let mut bad = order(&h);
        bad.to_token = Address::zero();
        assert!(matches!(create(&h, &bad), Err(OrderBookError::InvalidToToken)));

        let mut bad = order(&h);
        bad.to_token = bad.from_token;
        assert!(matches!(create(&h, &bad), Err(OrderBookError::DuplicateTokens)));

        let mut bad = order(&h);
        bad.amount_in = U256::zero();
        assert!(matches!(create(&h, &bad), Err(OrderBookError::InvalidAmountIn)));

        let mut bad = order(&h);
        bad.amount_out_min = U256::zero();
        assert!(matches!(create(&h, &bad), Err(OrderBookError::InvalidAmountOutMin)));

        let mut bad = order(&h);
        bad.recipient = Address::zero();
        assert!(matches!(create(&h, &bad), Err(OrderBookError::InvalidRecipient)));

        // nothing was stored or escrowed along the way
        assert_eq!(h.book.orders_count(), 0);
        assert_eq!(h.ledger.native_balance_of(addr(SETTLEMENT)), U256::zero());
    }

    #[test]
    fn test_deadline_must_be_future() {
        let h = harness();

        let mut bad = order(&h);
        bad.deadline = U256::from(NOW);
        assert!(matches!(create(&h, &bad), Err(OrderBookError::InvalidDeadline)));

        let mut bad = order(&h);
        bad.deadline = U256::from(NOW - 1);
        assert!(matches!(create(&h, &bad), Err(OrderBookError::InvalidDeadline)));

        let mut ok = order(&h);
        ok.deadline = U256::from(NOW + 1);
        assert!(create(&h, &ok).is_ok());
    }

    #[test]
    fn test_fee_policy() {
        let h = harness();

        let mut bad = order(&h);
        bad.fee = U256::exp10(16) - 1;
        assert!(matches!(create(&h, &bad), Err(OrderBookError::NotEnoughFee)));

        // attached value above or below the declared fee is rejected
        let order = order(&h);
        let signature = sign(&h, &order);
        let ctx = CallContext::direct(addr(RELAYER));
        assert!(matches!(
            h.book
                .create_order(&ctx, order.clone(), &signature, order.fee - 1),
            Err(OrderBookError::InvalidFeeAmount)
        ));
        assert!(matches!(
            h.book
                .create_order(&ctx, order.clone(), &signature, order.fee + 1),
            Err(OrderBookError::InvalidFeeAmount)
        ));
    }

    #[test]
    fn test_signature_must_recover_to_maker() {
        let h = harness();
        let order = order(&h);
        let ctx = CallContext::direct(addr(RELAYER));

        // signed by someone other than the maker
        let other: LocalWallet =
            "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d"
                .parse()
                .unwrap();
        let sig = other.sign_hash(signing_hash(&order, h.book.domain())).unwrap();
        let err = h
            .book
            .create_order(&ctx, order.clone(), &format!("0x{}", sig), order.fee)
            .unwrap_err();
        assert!(matches!(err, OrderBookError::InvalidSignature));

        // garbage signature
        let err = h
            .book
            .create_order(&ctx, order.clone(), "0xdeadbeef", order.fee)
            .unwrap_err();
        assert!(matches!(err, OrderBookError::InvalidSignature));

        // order fields tampered after signing
        let signature = sign(&h, &order);
        let mut tampered = order.clone();
        tampered.amount_out_min -= U256::one();
        let err = h
            .book
            .create_order(&ctx, tampered, &signature, order.fee)
            .unwrap_err();
        assert!(matches!(err, OrderBookError::InvalidSignature));
    }

    #[test]
    fn test_checks_run_in_declared_order() {
        let h = harness();

        // zero amount trumps the bad signature that would also be caught
        let mut bad = order(&h);
        bad.amount_in = U256::zero();
        let err = h
            .book
            .create_order(
                &CallContext::direct(addr(RELAYER)),
                bad.clone(),
                "0xdeadbeef",
                bad.fee,
            )
            .unwrap_err();
        assert!(matches!(err, OrderBookError::InvalidAmountIn));

        // fee mismatch trumps the bad signature as well
        let order = order(&h);
        let err = h
            .book
            .create_order(
                &CallContext::direct(addr(RELAYER)),
                order.clone(),
                "0xdeadbeef",
                order.fee + 1,
            )
            .unwrap_err();
        assert!(matches!(err, OrderBookError::InvalidFeeAmount));
    }

    #[test]
    fn test_duplicate_order_rejected() {
        let h = harness();
        let order = order(&h);

        create(&h, &order).unwrap();
        let err = create(&h, &order).unwrap_err();
        assert!(matches!(err, OrderBookError::OrderExists));

        // the duplicate attempt escrowed nothing
        assert_eq!(h.ledger.native_balance_of(addr(SETTLEMENT)), order.fee);
        assert_eq!(
            h.ledger.native_balance_of(addr(RELAYER)),
            U256::exp10(18) - order.fee
        );
    }

    #[test]
    fn test_sender_without_fee_balance() {
        let h = harness();
        let order = order(&h);
        let signature = sign(&h, &order);

        let broke = Address::repeat_byte(0x99);
        let err = h
            .book
            .create_order(&CallContext::direct(broke), order.clone(), &signature, order.fee)
            .unwrap_err();
        assert!(matches!(
            err,
            OrderBookError::Transfer(TransferError::InsufficientNativeBalance { .. })
        ));
        assert!(h.book.order_by_hash(order_struct_hash(&order)).is_none());
    }

    #[test]
    fn test_settlement_wiring() {
        let h = harness();

        // only the owner may wire, and only once
        let err = h
            .book
            .set_settlement(&CallContext::direct(addr(RELAYER)), h.settlement.clone())
            .unwrap_err();
        assert!(matches!(err, OrderBookError::CallerNotOwner));

        let err = h
            .book
            .set_settlement(&CallContext::direct(addr(OWNER)), h.settlement.clone())
            .unwrap_err();
        assert!(matches!(err, OrderBookError::SettlementAlreadySet));
    }

    #[test]
    fn test_create_requires_settlement() {
        let h = harness();
        let order = order(&h);
        let signature = sign(&h, &order);

        let unwired = OrderBook::new(
            addr(OWNER),
            U256::exp10(16),
            SigningDomain::new(56, addr(BOOK)),
            Arc::new(OrderStore::new()),
            h.ledger.clone(),
            h.events.clone(),
            h.clock.clone(),
        );
        let err = unwired
            .create_order(
                &CallContext::direct(addr(RELAYER)),
                order.clone(),
                &signature,
                order.fee,
            )
            .unwrap_err();
        assert!(matches!(err, OrderBookError::SettlementNotSet));
    }

    #[test]
    fn test_listings_paginate() {
        let h = harness();

        let mut hashes = Vec::new();
        for i in 1..=3u64 {
            let mut order = order(&h);
            order.amount_in = U256::exp10(18) * i;
            hashes.push(create(&h, &order).unwrap());
        }

        assert_eq!(h.book.orders_count(), 3);
        assert_eq!(h.book.order_hashes(0, 10), hashes);
        assert_eq!(h.book.order_hashes(1, 1), vec![hashes[1]]);
        assert_eq!(h.book.order_hashes(3, 10), Vec::<H256>::new());

        let maker = h.wallet.address();
        assert_eq!(h.book.maker_orders_count(maker), 3);
        assert_eq!(h.book.maker_order_hashes(maker, 2, 10), vec![hashes[2]]);
        assert_eq!(
            h.book.from_token_order_hashes(addr(FROM_TOKEN), 0, 2),
            &hashes[..2]
        );
        assert_eq!(
            h.book.to_token_order_hashes(addr(TO_TOKEN), 0, 10),
            hashes
        );
    }

    #[test]
    fn test_typed_data_uses_book_domain() {
        let h = harness();
        let data = h.book.order_typed_data(&order(&h));

        assert_eq!(data["domain"]["name"], "SwapBook");
        assert_eq!(data["domain"]["chainId"], 56);
        assert_eq!(
            data["domain"]["verifyingContract"],
            format!("{:?}", addr(BOOK))
        );
    }
}

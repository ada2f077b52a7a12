//! Settlement engine
//!
//! Responsible for:
//! 1. Escrowing the native fee attached to each order at creation
//! 2. Executing fills: pulling maker funds, swapping through the pool,
//!    delivering output, and paying the escrowed fee to the filler
//! 3. Cancellation, which refunds the escrowed fee to the maker
//!
//! Each order hash owns one slot holding its lifecycle status and its
//! remaining escrow. A fill or cancel locks that slot for its whole
//! critical section, so concurrent attempts on the same order serialize
//! and exactly one of them transitions the order out of `Open`.

use std::sync::Arc;

use dashmap::DashMap;
use ethers::types::{Address, H256, U256};
use parking_lot::Mutex;
use tracing::{error, info};

use crate::amm::{PairLookup, SwapRouter};
use crate::auth::eip712::order_struct_hash;
use crate::auth::{CallContext, CancelAuthorizer, MakerOnly};
use crate::clock::Clock;
use crate::events::{EventBus, ProtocolEvent};
use crate::models::OrderStatus;
use crate::store::OrderStore;
use crate::token::AssetLedger;

use super::types::*;

/// Per-order settlement state, one lock per order hash
struct OrderSlot {
    status: OrderStatus,
    escrowed_fee: U256,
}

/// Settlement engine for escrowed-fee order execution
pub struct Settlement {
    /// Account that holds escrowed fees and custodies funds mid-fill
    account: Address,
    /// Shared order records
    store: Arc<OrderStore>,
    /// Token and native balance movements
    ledger: Arc<dyn AssetLedger>,
    /// Pair lookups for validating swap paths
    factory: Arc<dyn PairLookup>,
    /// Protocol event fan-out
    events: EventBus,
    /// Time source for deadline checks
    clock: Arc<dyn Clock>,
    /// Cancellation policy
    cancel_auth: Box<dyn CancelAuthorizer>,
    /// Settlement slots keyed by order hash
    slots: DashMap<H256, Arc<Mutex<OrderSlot>>>,
}

impl Settlement {
    /// Create an engine that only lets makers cancel their own orders
    pub fn new(
        account: Address,
        store: Arc<OrderStore>,
        ledger: Arc<dyn AssetLedger>,
        factory: Arc<dyn PairLookup>,
        events: EventBus,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            account,
            store,
            ledger,
            factory,
            events,
            clock,
            cancel_auth: Box::new(MakerOnly),
            slots: DashMap::new(),
        }
    }

    /// Replace the cancellation policy
    pub fn with_cancel_authorizer(mut self, authorizer: Box<dyn CancelAuthorizer>) -> Self {
        self.cancel_auth = authorizer;
        self
    }

    pub fn account(&self) -> Address {
        self.account
    }

    /// Record an order's escrowed fee and open its settlement slot.
    /// The registry calls this once per stored order, after moving the
    /// attached native value into the settlement account.
    pub(crate) fn deposit_fee(&self, hash: H256, amount: U256) {
        self.slots.entry(hash).or_insert_with(|| {
            Arc::new(Mutex::new(OrderSlot {
                status: OrderStatus::Open,
                escrowed_fee: amount,
            }))
        });
    }

    /// Fill an open order in full: pull the maker's input tokens, swap them
    /// along `args.path`, deliver the output to the order's recipient, and
    /// pay the escrowed fee to the calling filler.
    pub fn fill_order(
        &self,
        ctx: &CallContext,
        args: FillArgs,
        router: &dyn SwapRouter,
    ) -> Result<FillReceipt, SettlementError> {
        // 1. Only directly-calling accounts may fill
        if !ctx.is_direct() {
            return Err(SettlementError::CalledByContract);
        }

        // 2. The submitted fields are the order's identity; the stored
        //    record is authoritative from here on
        let hash = order_struct_hash(&args.order);
        let order = self
            .store
            .order_by_hash(hash)
            .ok_or(SettlementError::OrderNotFound)?;

        let slot = self.slot(hash).ok_or(SettlementError::OrderNotFound)?;
        let mut slot = slot.lock();

        // 3. Lifecycle and deadline checks under the slot lock
        match slot.status {
            OrderStatus::Filled => return Err(SettlementError::AlreadyFilled),
            OrderStatus::Canceled => return Err(SettlementError::OrderCanceled),
            OrderStatus::Open => {}
        }
        if U256::from(self.clock.now()) > order.deadline {
            return Err(SettlementError::OrderExpired);
        }

        // 4. The route must start at the order's input token, end at its
        //    output token, and cross only live pairs
        if args.path.len() < 2
            || args.path.first() != Some(&order.from_token)
            || args.path.last() != Some(&order.to_token)
        {
            return Err(SettlementError::InvalidPath);
        }
        for hop in args.path.windows(2) {
            if self.factory.pair_for(hop[0], hop[1]).is_none() {
                return Err(SettlementError::PairNotFound);
            }
        }

        // 5. Fills are all-or-nothing
        if args.fill_amount_in != order.amount_in {
            return Err(SettlementError::InvalidFillAmount);
        }

        // 6. Pull the maker's input into the settlement account
        self.ledger
            .transfer_from(order.from_token, order.maker, self.account, order.amount_in)?;

        // 7. Swap; the pool enforces the minimum-output guard. On failure,
        //    return the maker's funds and surface the pool's own error.
        let amounts = match router.swap_exact_tokens_for_tokens(
            self.account,
            order.amount_in,
            order.amount_out_min,
            &args.path,
            order.recipient,
            order.deadline,
        ) {
            Ok(amounts) => amounts,
            Err(e) => {
                if let Err(refund) =
                    self.ledger
                        .transfer(order.from_token, self.account, order.maker, order.amount_in)
                {
                    error!("failed to return maker funds for order {:?}: {}", hash, refund);
                }
                return Err(SettlementError::Pool(e));
            }
        };
        let amount_out = amounts.last().copied().unwrap_or_default();

        // 8. Pay the escrowed fee to the filler and close the slot
        let fee = slot.escrowed_fee;
        self.ledger.transfer_native(self.account, ctx.sender, fee)?;
        slot.status = OrderStatus::Filled;
        slot.escrowed_fee = U256::zero();

        // Fill outcome first, fee payout second
        self.events.publish(ProtocolEvent::OrderFilled {
            hash,
            filler: ctx.sender,
            amount_in: order.amount_in,
            amount_out,
        });
        self.events.publish(ProtocolEvent::FeeTransferred {
            hash,
            recipient: ctx.sender,
            amount: fee,
        });

        info!(
            "order {:?} filled by {:?}: amount_in={}, amount_out={}, fee={}",
            hash, ctx.sender, order.amount_in, amount_out, fee
        );

        Ok(FillReceipt {
            hash,
            filler: ctx.sender,
            amount_in: order.amount_in,
            amount_out,
            fee,
        })
    }

    /// Cancel an open order and refund its escrowed fee to the maker.
    /// Expired orders stay cancelable; this is how makers recover fees.
    pub fn cancel_order(&self, ctx: &CallContext, order: &crate::models::Order) -> Result<(), SettlementError> {
        let hash = order_struct_hash(order);
        let order = self
            .store
            .order_by_hash(hash)
            .ok_or(SettlementError::OrderNotFound)?;

        if !self.cancel_auth.authorize(ctx, &order) {
            return Err(SettlementError::Unauthorized);
        }

        let slot = self.slot(hash).ok_or(SettlementError::OrderNotFound)?;
        let mut slot = slot.lock();

        match slot.status {
            OrderStatus::Filled => return Err(SettlementError::AlreadyFilled),
            OrderStatus::Canceled => return Err(SettlementError::OrderCanceled),
            OrderStatus::Open => {}
        }

        let fee = slot.escrowed_fee;
        self.ledger.transfer_native(self.account, order.maker, fee)?;
        slot.status = OrderStatus::Canceled;
        slot.escrowed_fee = U256::zero();

        self.events.publish(ProtocolEvent::OrderCanceled { hash });
        self.events.publish(ProtocolEvent::FeeTransferred {
            hash,
            recipient: order.maker,
            amount: fee,
        });

        info!("order {:?} canceled by {:?}: fee {} refunded", hash, ctx.sender, fee);

        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Lifecycle status of an order, if the engine knows it
    pub fn status_of(&self, hash: H256) -> Option<OrderStatus> {
        self.slot(hash).map(|slot| slot.lock().status)
    }

    /// Fee still escrowed for an order; zero once filled or canceled
    pub fn escrowed_fee(&self, hash: H256) -> U256 {
        self.slot(hash)
            .map_or(U256::zero(), |slot| slot.lock().escrowed_fee)
    }

    /// Sum of every open order's escrowed fee. The settlement account's
    /// native balance is always at least this amount.
    pub fn total_escrowed(&self) -> U256 {
        self.slots
            .iter()
            .map(|entry| entry.value().lock().escrowed_fee)
            .fold(U256::zero(), |total, fee| total + fee)
    }

    fn slot(&self, hash: H256) -> Option<Arc<Mutex<OrderSlot>>> {
        self.slots.get(&hash).map(|entry| Arc::clone(entry.value()))
    }
}

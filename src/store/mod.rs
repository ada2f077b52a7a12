//! In-memory order storage and lookup indices
//!
//! Orders are keyed by their EIP-712 struct hash. Beyond the primary map the
//! store keeps four append-only hash indices (all orders, per maker, per input
//! token, per output token) so listings page through hashes in creation order
//! without scanning every record.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use ethers::types::{Address, H256};
use parking_lot::RwLock;

use crate::models::Order;

#[derive(Default)]
pub struct OrderStore {
    /// Primary record map, struct hash -> immutable order fields
    records: DashMap<H256, Order>,

    /// Every stored hash in creation order
    all: RwLock<Vec<H256>>,

    /// Hashes per maker address, in creation order
    by_maker: DashMap<Address, Vec<H256>>,

    /// Hashes per input token, in creation order
    by_from_token: DashMap<Address, Vec<H256>>,

    /// Hashes per output token, in creation order
    by_to_token: DashMap<Address, Vec<H256>>,
}

impl OrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an order under its hash and append it to all four indices.
    /// Returns false (and changes nothing) when the hash is already present,
    /// so racing duplicate creations resolve to a single winner.
    pub(crate) fn insert(&self, hash: H256, order: Order) -> bool {
        let (maker, from_token, to_token) = (order.maker, order.from_token, order.to_token);

        match self.records.entry(hash) {
            Entry::Occupied(_) => return false,
            Entry::Vacant(slot) => {
                slot.insert(order);
            }
        }

        self.all.write().push(hash);
        self.by_maker.entry(maker).or_default().push(hash);
        self.by_from_token.entry(from_token).or_default().push(hash);
        self.by_to_token.entry(to_token).or_default().push(hash);

        true
    }

    pub fn contains(&self, hash: H256) -> bool {
        self.records.contains_key(&hash)
    }

    pub fn order_by_hash(&self, hash: H256) -> Option<Order> {
        self.records.get(&hash).map(|entry| entry.clone())
    }

    pub fn orders_count(&self) -> usize {
        self.all.read().len()
    }

    pub fn order_hashes(&self, offset: usize, limit: usize) -> Vec<H256> {
        page(&self.all.read(), offset, limit)
    }

    pub fn maker_orders_count(&self, maker: Address) -> usize {
        self.by_maker.get(&maker).map_or(0, |hashes| hashes.len())
    }

    pub fn maker_order_hashes(&self, maker: Address, offset: usize, limit: usize) -> Vec<H256> {
        self.by_maker
            .get(&maker)
            .map_or_else(Vec::new, |hashes| page(&hashes, offset, limit))
    }

    pub fn from_token_orders_count(&self, token: Address) -> usize {
        self.by_from_token.get(&token).map_or(0, |hashes| hashes.len())
    }

    pub fn from_token_order_hashes(
        &self,
        token: Address,
        offset: usize,
        limit: usize,
    ) -> Vec<H256> {
        self.by_from_token
            .get(&token)
            .map_or_else(Vec::new, |hashes| page(&hashes, offset, limit))
    }

    pub fn to_token_orders_count(&self, token: Address) -> usize {
        self.by_to_token.get(&token).map_or(0, |hashes| hashes.len())
    }

    pub fn to_token_order_hashes(&self, token: Address, offset: usize, limit: usize) -> Vec<H256> {
        self.by_to_token
            .get(&token)
            .map_or_else(Vec::new, |hashes| page(&hashes, offset, limit))
    }
}

/// Clamp a page out of an index: empty past the end, truncated at the end,
/// never an error.
fn page(hashes: &[H256], offset: usize, limit: usize) -> Vec<H256> {
    if offset >= hashes.len() {
        return Vec::new();
    }
    let end = offset.saturating_add(limit).min(hashes.len());
    hashes[offset..end].to_vec()
}

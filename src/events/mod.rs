//! Protocol events
//!
//! Order lifecycle notifications for off-chain observers (indexers, fill
//! bots, UIs), broadcast over a tokio channel. Publishing is fire-and-forget:
//! an operation never fails because nobody is listening.

use ethers::types::{Address, H256, U256};
use serde::Serialize;
use tokio::sync::broadcast;

/// Order lifecycle event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProtocolEvent {
    /// A new order was validated, recorded and escrowed
    OrderCreated { hash: H256, maker: Address },

    /// An open order was filled in full
    OrderFilled {
        hash: H256,
        filler: Address,
        amount_in: U256,
        amount_out: U256,
    },

    /// An open order was canceled; the escrowed fee returns to the maker
    OrderCanceled { hash: H256 },

    /// Escrowed fee left the settlement engine
    FeeTransferred {
        hash: H256,
        recipient: Address,
        amount: U256,
    },
}

/// Broadcast bus shared by the registry and the settlement engine.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ProtocolEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProtocolEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: ProtocolEvent) {
        // Ignore send errors (no active subscribers)
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

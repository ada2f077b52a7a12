//! Caller identity and authorization
//!
//! Mutating operations receive an explicit [`CallContext`] naming the
//! immediate caller and the ultimate originator of the call chain; the
//! settlement engine uses the pair to keep fills restricted to direct,
//! non-delegated callers. Cancel authorization is a pluggable policy.

pub mod eip712;

use ethers::types::Address;

use crate::models::Order;

/// Identity of a protocol call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    /// Immediate caller of the operation
    pub sender: Address,

    /// Ultimate originator of the call chain
    pub origin: Address,
}

impl CallContext {
    /// A direct call: the originator invokes the protocol itself
    pub fn direct(account: Address) -> Self {
        Self {
            sender: account,
            origin: account,
        }
    }

    /// A delegated call: `sender` acts on behalf of `origin`
    pub fn delegated(sender: Address, origin: Address) -> Self {
        Self { sender, origin }
    }

    /// True when the immediate caller is the originator
    pub fn is_direct(&self) -> bool {
        self.sender == self.origin
    }
}

/// Policy deciding who may cancel an open order.
pub trait CancelAuthorizer: Send + Sync {
    fn authorize(&self, ctx: &CallContext, order: &Order) -> bool;
}

/// Default policy: only the order's maker may cancel.
#[derive(Debug, Default)]
pub struct MakerOnly;

impl CancelAuthorizer for MakerOnly {
    fn authorize(&self, ctx: &CallContext, order: &Order) -> bool {
        ctx.sender == order.maker
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::U256;

    fn order_with_maker(maker: Address) -> Order {
        Order {
            maker,
            from_token: Address::repeat_byte(0x22),
            to_token: Address::repeat_byte(0x33),
            amount_in: U256::one(),
            amount_out_min: U256::one(),
            recipient: maker,
            deadline: U256::from(1_700_000_000u64),
            fee: U256::exp10(16),
        }
    }

    #[test]
    fn test_direct_and_delegated() {
        let account = Address::repeat_byte(1);
        assert!(CallContext::direct(account).is_direct());

        let delegated = CallContext::delegated(Address::repeat_byte(2), account);
        assert!(!delegated.is_direct());
        assert_eq!(delegated.origin, account);
    }

    #[test]
    fn test_maker_only_policy() {
        let maker = Address::repeat_byte(1);
        let order = order_with_maker(maker);

        assert!(MakerOnly.authorize(&CallContext::direct(maker), &order));
        assert!(!MakerOnly.authorize(&CallContext::direct(Address::repeat_byte(2)), &order));
    }
}

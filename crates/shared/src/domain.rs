use serde::{Deserialize, Serialize};

pub use alloy_primitives::{Address, B256, U256};

/// Hash of a submitted mint or deployment transaction.
pub type TxHash = B256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainId(pub u64);

/// One unit price in wei: 0.02 ether.
pub const DEFAULT_UNIT_PRICE_WEI: u64 = 20_000_000_000_000_000;
pub const DEFAULT_MIN_QUANTITY: u8 = 1;
pub const DEFAULT_MAX_QUANTITY: u8 = 3;

/// Fixed-price mint terms: per-token price and the inclusive per-transaction
/// quantity bounds enforced by the controls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintPolicy {
    pub unit_price: U256,
    pub min_quantity: u8,
    pub max_quantity: u8,
}

impl Default for MintPolicy {
    fn default() -> Self {
        Self {
            unit_price: U256::from(DEFAULT_UNIT_PRICE_WEI),
            min_quantity: DEFAULT_MIN_QUANTITY,
            max_quantity: DEFAULT_MAX_QUANTITY,
        }
    }
}

impl MintPolicy {
    pub fn contains(&self, quantity: u8) -> bool {
        (self.min_quantity..=self.max_quantity).contains(&quantity)
    }

    pub fn clamp(&self, quantity: u8) -> u8 {
        quantity.clamp(self.min_quantity, self.max_quantity)
    }

    /// Exact payment amount for `quantity` tokens: `quantity * unit_price`.
    pub fn payment_for(&self, quantity: u8) -> U256 {
        self.unit_price * U256::from(quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_matches_contract_terms() {
        let policy = MintPolicy::default();
        assert_eq!(policy.unit_price, U256::from(20_000_000_000_000_000u64));
        assert_eq!(policy.min_quantity, 1);
        assert_eq!(policy.max_quantity, 3);
    }

    #[test]
    fn payment_is_quantity_times_unit_price() {
        let policy = MintPolicy::default();
        // 2 * 0.02 ether = 0.04 ether, exactly.
        assert_eq!(policy.payment_for(2), U256::from(40_000_000_000_000_000u64));
        assert_eq!(policy.payment_for(3), U256::from(60_000_000_000_000_000u64));
    }

    #[test]
    fn clamp_holds_bounds() {
        let policy = MintPolicy::default();
        assert_eq!(policy.clamp(0), 1);
        assert_eq!(policy.clamp(2), 2);
        assert_eq!(policy.clamp(9), 3);
        assert!(!policy.contains(0));
        assert!(policy.contains(3));
        assert!(!policy.contains(4));
    }
}

use alloy_primitives::{Address, B256};

/// Mined receipt, reduced to the fields the runner reports on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub transaction_hash: B256,
    /// `None` while the node reports the receipt as pending
    pub block_number: Option<u64>,
    pub from: Address,
    pub to: Option<Address>,
    /// Set for contract creations
    pub contract_address: Option<Address>,
    pub gas_used: u64,
    /// `false` when the transaction reverted
    pub success: bool,
}

impl Receipt {
    /// Confirmation depth at chain tip `tip` (the including block counts as one)
    pub fn depth_at(&self, tip: u64) -> u64 {
        match self.block_number {
            Some(block) if tip >= block => tip - block + 1,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn receipt_in(block: Option<u64>) -> Receipt {
        Receipt {
            transaction_hash: B256::repeat_byte(0x11),
            block_number: block,
            from: Address::ZERO,
            to: None,
            contract_address: None,
            gas_used: 21_000,
            success: true,
        }
    }

    #[test]
    fn test_depth_counts_including_block() {
        let receipt = receipt_in(Some(100));
        assert_eq!(receipt.depth_at(100), 1);
        assert_eq!(receipt.depth_at(105), 6);
    }

    #[test]
    fn test_depth_when_node_lags() {
        assert_eq!(receipt_in(Some(100)).depth_at(99), 0);
        assert_eq!(receipt_in(None).depth_at(500), 0);
    }
}

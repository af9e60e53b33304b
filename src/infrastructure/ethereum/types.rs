//! Type conversions between Alloy types and domain types

use alloy::network::ReceiptResponse;
use alloy::rpc::types::TransactionReceipt;

use crate::domain::call::Receipt;

/// Reduce an Alloy receipt to the domain receipt
pub fn convert_receipt(receipt: &TransactionReceipt) -> Receipt {
    Receipt {
        transaction_hash: receipt.transaction_hash(),
        block_number: receipt.block_number(),
        from: receipt.from(),
        to: receipt.to(),
        contract_address: receipt.contract_address(),
        gas_used: receipt.gas_used(),
        success: receipt.status(),
    }
}

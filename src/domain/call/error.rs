use std::time::Duration;

use alloy_primitives::B256;

use super::Receipt;

/// Why a call did not settle successfully
///
/// Variants follow the order in which a call can fail: before anything is
/// sent, while sending, after landing on chain, and while waiting for depth.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CallError {
    /// Request could not be turned into a transaction; nothing was sent
    #[error("cannot build call: {0}")]
    Construction(String),

    /// Node or signer rejected the transaction; message kept verbatim
    #[error("{0}")]
    Submission(String),

    /// Transaction was mined but its effects were rolled back
    #[error("transaction {tx_hash} reverted")]
    Reverted { tx_hash: B256, receipt: Receipt },

    /// Provider failed while waiting; the transaction may or may not land
    #[error("lost track of transaction {tx_hash}: {message}")]
    Confirmation { tx_hash: B256, message: String },

    /// Configured wait bound elapsed before the requested depth was reached
    #[error("timed out after {waited:?} waiting for {confirmations} confirmation(s) of {tx_hash}")]
    Timeout {
        tx_hash: B256,
        confirmations: u64,
        waited: Duration,
    },

    /// Return data did not match the method's declared outputs
    #[error("cannot decode output of {method}: {message}")]
    Decode { method: String, message: String },
}

impl CallError {
    /// Hash of the submitted transaction, if it got that far
    pub fn tx_hash(&self) -> Option<B256> {
        match self {
            CallError::Reverted { tx_hash, .. }
            | CallError::Confirmation { tx_hash, .. }
            | CallError::Timeout { tx_hash, .. } => Some(*tx_hash),
            _ => None,
        }
    }

    /// The outcome on chain is unknown and needs manual reconciliation
    pub fn is_ambiguous(&self) -> bool {
        matches!(
            self,
            CallError::Confirmation { .. } | CallError::Timeout { .. }
        )
    }

    /// Short machine-friendly tag, stored in the journal
    pub fn kind(&self) -> &'static str {
        match self {
            CallError::Construction(_) => "construction",
            CallError::Submission(_) => "submission",
            CallError::Reverted { .. } => "reverted",
            CallError::Confirmation { .. } => "confirmation",
            CallError::Timeout { .. } => "timeout",
            CallError::Decode { .. } => "decode",
        }
    }
}

use alloy_primitives::B256;

use super::{CallError, Receipt};

/// Terminal outcome of one submitted call
///
/// Exactly one of "carries a transaction hash" (`Confirmed`, `Submitted`)
/// or "carries an error" (`Failed`) holds for every value.
#[derive(Debug, Clone)]
pub enum CallResult {
    /// Mined and buried under the requested number of blocks
    Confirmed { tx_hash: B256, receipt: Receipt },
    /// Accepted by the node; no confirmation was requested
    Submitted { tx_hash: B256 },
    Failed(CallError),
}

impl CallResult {
    pub fn is_success(&self) -> bool {
        !matches!(self, CallResult::Failed(_))
    }

    /// Hash of a successful submission
    pub fn tx_hash(&self) -> Option<B256> {
        match self {
            CallResult::Confirmed { tx_hash, .. } | CallResult::Submitted { tx_hash } => {
                Some(*tx_hash)
            }
            CallResult::Failed(_) => None,
        }
    }

    pub fn receipt(&self) -> Option<&Receipt> {
        match self {
            CallResult::Confirmed { receipt, .. } => Some(receipt),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&CallError> {
        match self {
            CallResult::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Tag stored in the journal
    pub fn outcome(&self) -> &'static str {
        match self {
            CallResult::Confirmed { .. } => "confirmed",
            CallResult::Submitted { .. } => "submitted",
            CallResult::Failed(err) => err.kind(),
        }
    }

    pub fn into_result(self) -> Result<Option<Receipt>, CallError> {
        match self {
            CallResult::Confirmed { receipt, .. } => Ok(Some(receipt)),
            CallResult::Submitted { .. } => Ok(None),
            CallResult::Failed(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submitted_has_hash_no_error() {
        let result = CallResult::Submitted {
            tx_hash: B256::repeat_byte(1),
        };
        assert!(result.is_success());
        assert!(result.tx_hash().is_some());
        assert!(result.error().is_none());
        assert!(result.receipt().is_none());
        assert_eq!(result.outcome(), "submitted");
    }

    #[test]
    fn test_failed_has_error_no_hash() {
        let result = CallResult::Failed(CallError::Construction("unknown method".into()));
        assert!(!result.is_success());
        assert!(result.tx_hash().is_none());
        assert!(!result.error().unwrap().to_string().is_empty());
        assert_eq!(result.outcome(), "construction");
    }
}

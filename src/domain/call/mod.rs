//! One-shot call models: request, outcome, receipt and error taxonomy

mod error;
mod receipt;
mod request;
mod result;

pub use error::CallError;
pub use receipt::Receipt;
pub use request::{CallRequest, CallTarget, DEFAULT_CONFIRMATIONS};
pub use result::CallResult;

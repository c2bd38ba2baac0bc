//! Transaction submission core: nonce tracking, construction, broadcast
//! retry and receipt confirmation

mod builder;
mod nonce;
mod receipt;
mod sender;

pub use builder::TxBuilder;
pub use nonce::NonceTracker;
pub use receipt::{ReceiptOutcome, ReceiptWaiter};
pub use sender::{SubmissionOutcome, TxSender};

//! Outgoing message model and the layered merge that builds it.

pub mod merge;
mod types;

pub use merge::compose;
pub use types::{MessageRecord, Recipient, Recipients, SendOptions};

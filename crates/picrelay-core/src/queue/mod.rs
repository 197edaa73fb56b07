//! Queue module: the FIFO both loops consume, and the retry policy.

mod memory;
mod retry;

pub use memory::{DeliveryQueue, QueueSnapshot};
pub use retry::{RetryDecision, RetryPolicy};

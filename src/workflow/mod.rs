pub mod cancel;
pub mod retry;
pub mod worker;

pub use cancel::CancelSignal;
pub use retry::{RetryFailure, RetryPolicy, Retried};
pub use worker::Worker;

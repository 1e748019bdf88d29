//! Core primitives for the Transferscope project.
/// Decimal-string arithmetic for token amounts
pub mod amount;
/// Per-client fixed window rate limiter
pub mod rate_limiter;
/// The indexed transfer record
pub mod transfer;

pub use rate_limiter::RateLimiter;
pub use transfer::TransferEvent;

//! API middleware stack.
//!
//! Execution order (outermost → innermost):
//! 1. Auth validator: resolves the bearer token to a user
//! 2. Audit logger: logs after auth, has the caller id

pub mod audit;
pub mod auth;

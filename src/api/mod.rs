//! Admin HTTP API.
//!
//! Routes live under `/api/`. Mutating routes sit behind bearer-token
//! authentication; the token is a backend session token resolved to a user
//! with `Backend::get_user`.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::admin_api_router;
pub use server::serve;
pub use types::ApiContext;

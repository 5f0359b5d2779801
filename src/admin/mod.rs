//! Privileged administrative operations.
//!
//! Everything here runs with the service-role credential and therefore
//! bypasses row-level policies; authorization is enforced in
//! `actions` before any mutation is issued.

pub mod actions;
pub mod cache;
pub mod client;

pub use actions::{AdminActionError, AdminActions};
pub use cache::{ViewCache, ViewGenerations};
pub use client::{create_admin_client, create_admin_client_from_env, AdminClient};

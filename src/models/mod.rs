//! Row types mirroring the hosted backend's schema.
//!
//! The backend is authoritative for every row; these types only describe
//! shapes and the few invariants checkable client-side.

pub mod case;
pub mod enums;
pub mod notification;
pub mod organization;
pub mod profile;
pub mod review;

pub use case::*;
pub use enums::*;
pub use notification::*;
pub use organization::*;
pub use profile::*;
pub use review::*;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Invalid {entity}: {reason}")]
    Invalid { entity: &'static str, reason: String },
}

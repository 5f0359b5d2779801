//! Automated sign-in → profile → organization check.
//!
//! Runs the same sequence an operator would run by hand against a backend
//! instance and turns the outcome into a `Diagnosis` that separates "no
//! profile provisioned" from "row access policy misconfigured".

pub mod protocol;
pub mod report;

pub use protocol::{run_protocol, Credentials, Expectations};
pub use report::{Diagnosis, Step, StepOutcome, StepRecord, VerificationReport};

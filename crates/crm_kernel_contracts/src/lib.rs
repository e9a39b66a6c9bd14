#![forbid(unsafe_code)]

pub mod audit;
pub mod common;
pub mod contact;
pub mod contactfield;
pub mod tenant;

pub use common::{ContractViolation, MonotonicTimeNs, ReasonCodeId, SchemaVersion, Validate};

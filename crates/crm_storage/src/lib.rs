#![forbid(unsafe_code)]

pub mod audit;
pub mod repo;
pub mod scope;
pub mod store;

//! Estimation pipeline - DVF record sourcing, comparable-sales
//! aggregation and market summary reporting

pub mod aggregate;
pub mod source;
pub mod summary;
pub mod types;

pub use types::*;

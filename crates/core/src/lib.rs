//! Shared domain types for the Doshboard widget refresh pipeline.
//!
//! This crate has zero internal dependencies so it can be used by the store,
//! the provider adapters, the refresh engine and the API layer alike.

pub mod backoff;
pub mod error;
pub mod fetch;
pub mod roles;
pub mod types;
pub mod widget;

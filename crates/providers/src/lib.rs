//! Provider adapters: one narrow "fetch raw data for widget config X" client
//! per widget type, behind the [`ProviderAdapter`] capability.
//!
//! Adapters never retry; retry and backoff belong to the refresh scheduler.

pub mod adapter;
pub mod config;
pub mod crypto;
pub mod football;
mod http;
pub mod weather;

pub use adapter::{fetch_bounded, ProviderAdapter, ProviderRegistry};
pub use config::{ProviderEndpoint, ProviderSettings};

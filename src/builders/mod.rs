//! Builders to construct marketplace components from configuration.

pub mod marketplace_builder;

pub use marketplace_builder::{build_marketplace, Marketplace, MarketplaceBuilder};

//! Configuration models for the ledger, assignment retries, throttling and the
//! sweeper.

pub mod market;

pub use market::{AssignmentConfig, LedgerConfig, MarketplaceConfig, SweeperConfig, ThrottleConfig};

//! # Job Award
//!
//! Job award and bid lifecycle coordination for a freelance marketplace.
//!
//! Posters publish jobs, freelancers bid on them, and the poster accepts
//! exactly one bid. Accepting is the contended path: it flips the job to in
//! progress, marks the winner accepted, rejects every other pending bid and
//! consumes one credit from a free-tier bidder, all in one optimistic commit.
//! Two acceptances racing on the same job cannot both win, and a free-tier
//! bidder can never be awarded more jobs than the quota allows, even when
//! awards on different jobs race.
//!
//! ## Key Features
//!
//! - **Atomic Assignment**: job and account committed together under version
//!   checks, retried with bounded backoff on conflict
//! - **Credit Ledger**: free-tier quota, paid tier unlimited while subscribed
//! - **Posting Throttle**: one job per cooldown for free-tier posters
//! - **Lifecycle Sweeper**: expires open jobs past their deadline
//! - **Detached Side Effects**: notifications, realtime events and the
//!   poster/bidder conversation run after commit and never fail the caller
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use job_award::builders::MarketplaceBuilder;
//! use job_award::config::MarketplaceConfig;
//! use job_award::core::{Account, NewJob};
//! use job_award::runtime::TokioSpawner;
//!
//! let market = MarketplaceBuilder::new(MarketplaceConfig::from_env()?)
//!     .build(TokioSpawner::current()?)?;
//! market.ledger().open_account(Account::free(poster)).await?;
//! market.ledger().open_account(Account::free(bidder)).await?;
//! let job = market.post_job(poster, new_job).await?;
//! let bid = market.submit_bid(job.id, bidder, 500, None).await?;
//! let outcome = market.accept_bid(job.id, bid.id, poster, None).await?;
//! let _sweeper = market.spawn_sweeper();
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core marketplace rules, errors and collaborator seams.
pub mod core;
/// Configuration models for the ledger, retries, throttle and sweeper.
pub mod config;
/// Builders to construct marketplace components from configuration.
pub mod builders;
/// Infrastructure adapters for storage and collaborators.
pub mod infra;
/// Runtime adapters and API surface.
pub mod runtime;
/// Shared utilities.
pub mod util;

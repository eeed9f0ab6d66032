//! Runtime adapters and the request/response surface.

pub mod api;
pub mod tokio_spawner;

pub use api::{
    accept_bid, health, post_job, submit_bid, withdraw_bid, AcceptBidRequest, ApiError,
    ErrorCode, Health, PostJobRequest, SubmitBidRequest, WithdrawBidRequest,
};
pub use tokio_spawner::TokioSpawner;

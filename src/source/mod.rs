//! Project Online OData extraction: client, models, and rate limiting

pub mod client;
pub mod models;
pub mod rate_limit;

pub use client::{ODataPager, QueryOptions, SourceClient};
pub use models::*;
pub use rate_limit::RateLimiter;

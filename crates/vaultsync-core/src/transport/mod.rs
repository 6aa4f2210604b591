//! HTTP transport used by the store implementations

mod client;

pub use client::{ApiAuth, ApiClient, ApiError, ApiResult, DEFAULT_TIMEOUT};

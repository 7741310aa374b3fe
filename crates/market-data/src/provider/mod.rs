//! Market data provider abstractions and implementations.
//!
//! This module contains:
//! - The `MarketDataProvider` trait that all providers implement
//! - The shared request layer: rate limiter, HTTP client, response cache
//! - Row normalization onto the candle shape
//! - Concrete providers (Dune, Hyperliquid, Binance) and the factory that
//!   builds them from settings
//!
//! # Architecture
//!
//! Each provider instance exclusively owns its `RequestClient` (and so its
//! `RateLimiter`) and its `ResponseCache`. Nothing is shared between
//! instances, so different providers never contend with each other.

pub mod cache;
pub mod client;
mod config;
mod factory;
pub mod normalize;
pub mod rate_limiter;
mod traits;

pub mod binance;
pub mod dune;
pub mod hyperliquid;

// Re-exports
pub use config::{
    ProviderConfig, DEFAULT_CACHE_TTL, DEFAULT_MAX_ROWS_PER_CALL, DEFAULT_REQUEST_TIMEOUT,
};
pub use factory::{available_kinds, build_provider, ProviderKind};
pub use traits::MarketDataProvider;

//! Foglio content cache.
//!
//! One injectable cache object fronts every content backend:
//!
//! - **FlightMap**: generic keyed map with TTL expiry and in-flight request
//!   coalescing: concurrent fetches for the same key share one loader run.
//! - **ContentCache**: typed sections over `FlightMap`, keyed by
//!   `{owner}/{repo}/{path}` resource keys.
//!
//! Writes never go through the cache; stale reads age out by TTL.

mod config;
mod flight;
mod lock;
mod store;

pub use config::CacheConfig;
pub use flight::FlightMap;
pub use store::ContentCache;

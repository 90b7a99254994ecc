//! NWA Common - Shared types and helpers
//!
//! This crate provides the foundational pieces used across the NWA crates:
//! - Error types and the `ApiError` value returned to API callers
//! - Error formatting with correlation keys
//! - URL building
//! - VLAN range sets
//! - Process-wide shared state
//! - Bounded concurrent execution of futures and blocking functions
//! - Swagger file host substitution

pub mod concurrency;
pub mod error;
pub mod ex;
pub mod shared_state;
pub mod swagger;
pub mod url;
pub mod utils;
pub mod vlans;

// Re-exports for convenience
pub use concurrency::{gather_nice, gather_nice_sync, try_gather_nice};
pub use error::{ApiError, NwaError};
pub use ex::{format_error, show_error};
pub use shared_state::{shared, shared_with};
pub use url::Url;
pub use utils::glob_matches;
pub use vlans::{VlanError, VlanRanges};

/// Default number of concurrently running tasks for the gather helpers
pub const DEFAULT_GATHER_LIMIT: usize = 5;

/// Request header that makes cached endpoints bypass the cache
pub const NO_CACHE_HEADER: &str = "nwa-stdlib-no-cache";

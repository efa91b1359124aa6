//! Coordinate validation, region classification and privacy helpers.

mod context;
pub mod geohash;
mod region;

pub use context::{log_redact, CacheKey, GeographicContext, CACHE_KEY_PRECISION};
pub use region::RegionBounds;

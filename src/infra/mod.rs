pub mod api;
pub mod cache;

#[allow(unused_imports)]
pub use api::{CacheStatus, CachedPayload, ItemSeed, MarketApiClient, MarketApiError};
#[allow(unused_imports)]
pub use cache::{Clock, PriceCache, SystemClock, DEFAULT_STALENESS_WINDOW};

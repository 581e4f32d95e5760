//! Market companion for crafting games: compares farming a resource for
//! sale against crafting goods from materials, using manually tracked
//! per-city prices, and suggests competitive listing prices for crafts.

pub mod advisor;
pub mod domain;
pub mod infra;
pub mod output;
pub mod util;

pub use advisor::{Advisor, AdvisorError};
pub use domain::{
    CraftingRecommendation, FarmingRecommendation, MarketSnapshot, MarketSummary,
};
pub use infra::{MarketApiClient, PriceCache};

//! Domain logic for market recommendations lives here.

pub mod entities;
pub mod evaluation;
pub mod snapshot;

#[allow(unused_imports)]
pub use entities::{
    CostBasis, CostedMaterial, CraftingRecommendation, Difficulty, FarmingRecommendation, Item,
    ItemCategory, ItemId, MarketSummary, PriceEntry, Rarity, Recipe, RecipeLine,
};
#[allow(unused_imports)]
pub use evaluation::{crafting_recommendations, farming_recommendations, summarize};
#[allow(unused_imports)]
pub use snapshot::MarketSnapshot;

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Identifier for items in the market catalog. Assigned by the tracker API.
pub type ItemId = String;

/// A catalog item, with its recipe attached when the tracker knows one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub tier: u32,
    pub category: ItemCategory,
    pub description: Option<String>,
    pub rarity: Option<Rarity>,
    pub icon_url: Option<String>,
    /// Minutes to gather one unit. Only meaningful for resources.
    pub harvest_minutes: Option<f64>,
    pub craft_minutes: Option<f64>,
    pub recipe: Option<Recipe>,
}

impl Item {
    /// True when the item carries a recipe that actually consumes materials.
    pub fn is_craftable(&self) -> bool {
        self.recipe
            .as_ref()
            .map(|recipe| !recipe.materials.is_empty())
            .unwrap_or(false)
    }

    pub fn is_farmable(&self) -> bool {
        self.category == ItemCategory::Resource && self.harvest_minutes.is_some()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemCategory {
    Resource,
    Crafted,
    Tool,
    Equipment,
}

impl ItemCategory {
    /// Parse the tracker's category string. Unknown values fall back to
    /// `Crafted`, the default the tracker itself assigns to new items.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "resource" => Self::Resource,
            "tool" => Self::Tool,
            "equipment" => Self::Equipment,
            _ => Self::Crafted,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Resource => "resource",
            Self::Crafted => "crafted",
            Self::Tool => "tool",
            Self::Equipment => "equipment",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

impl Rarity {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "common" => Some(Self::Common),
            "uncommon" => Some(Self::Uncommon),
            "rare" => Some(Self::Rare),
            "epic" => Some(Self::Epic),
            "legendary" => Some(Self::Legendary),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Common => "common",
            Self::Uncommon => "uncommon",
            Self::Rare => "rare",
            Self::Epic => "epic",
            Self::Legendary => "legendary",
        }
    }
}

/// One material consumed or output produced per craft.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecipeLine {
    pub item_id: ItemId,
    pub quantity: u32,
}

impl RecipeLine {
    pub fn new(item_id: impl Into<ItemId>, quantity: u32) -> Self {
        Self {
            item_id: item_id.into(),
            quantity,
        }
    }
}

/// A crafting recipe. `outputs` is always populated: recipes declared
/// without outputs produce exactly one unit of the crafted item itself.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub materials: Vec<RecipeLine>,
    pub outputs: Vec<RecipeLine>,
}

impl Recipe {
    pub fn new(crafted_item_id: &str, materials: Vec<RecipeLine>, outputs: Vec<RecipeLine>) -> Self {
        let outputs = if outputs.is_empty() {
            vec![RecipeLine::new(crafted_item_id, 1)]
        } else {
            outputs
        };
        Self { materials, outputs }
    }
}

/// A committed market price for one (item, city) pair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceEntry {
    pub id: String,
    pub item_id: ItemId,
    pub city_name: String,
    pub price: f64,
    pub last_updated: SystemTime,
}

/// Harvest difficulty bucket, derived from the effective harvest time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn from_harvest_minutes(minutes: f64) -> Self {
        if minutes <= 1.0 {
            Self::Easy
        } else if minutes <= 3.0 {
            Self::Medium
        } else {
            Self::Hard
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

/// How a recommendation's material cost was resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostBasis {
    /// Every material had a committed city price.
    Strict,
    /// At least one material price was substituted with the floor placeholder.
    Estimated,
}

impl CostBasis {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Estimated => "estimated",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FarmingRecommendation {
    pub item: Item,
    pub profit_per_hour: f64,
    /// Effective harvest minutes used for the rate, after the 1-minute floor.
    pub harvest_minutes: f64,
    pub difficulty: Difficulty,
}

/// One recipe material with its resolved city price.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CostedMaterial {
    pub item: Item,
    pub quantity: u32,
    pub unit_price: f64,
    pub cost: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CraftingRecommendation {
    pub item: Item,
    pub materials: Vec<CostedMaterial>,
    pub crafting_cost: f64,
    pub suggested_price: f64,
    pub profit_per_craft: f64,
    /// Percent of the material cost.
    pub profit_margin: f64,
    pub cost_basis: CostBasis,
}

/// Per-city digest for the dashboard view.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarketSummary {
    pub city_name: String,
    pub total_items: usize,
    pub farmable_count: usize,
    pub craftable_count: usize,
    pub top_farming: Option<FarmingRecommendation>,
    pub top_crafting: Option<CraftingRecommendation>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipe_defaults_to_one_unit_of_self() {
        let recipe = Recipe::new("iron-sword", vec![RecipeLine::new("iron-ore", 3)], Vec::new());
        assert_eq!(recipe.outputs, vec![RecipeLine::new("iron-sword", 1)]);
    }

    #[test]
    fn declared_outputs_are_kept_verbatim() {
        let outputs = vec![RecipeLine::new("plank", 4), RecipeLine::new("sawdust", 1)];
        let recipe = Recipe::new("plank", Vec::new(), outputs.clone());
        assert_eq!(recipe.outputs, outputs);
    }

    #[test]
    fn unknown_category_falls_back_to_crafted() {
        assert_eq!(ItemCategory::parse("resource"), ItemCategory::Resource);
        assert_eq!(ItemCategory::parse("artifact"), ItemCategory::Crafted);
    }

    #[test]
    fn difficulty_thresholds() {
        assert_eq!(Difficulty::from_harvest_minutes(0.5), Difficulty::Easy);
        assert_eq!(Difficulty::from_harvest_minutes(1.0), Difficulty::Easy);
        assert_eq!(Difficulty::from_harvest_minutes(3.0), Difficulty::Medium);
        assert_eq!(Difficulty::from_harvest_minutes(3.1), Difficulty::Hard);
    }
}

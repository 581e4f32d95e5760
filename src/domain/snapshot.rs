//! Immutable per-city view of the catalog and its prices.

use std::collections::HashMap;

use super::entities::{Item, ItemId};

/// Everything the evaluators need for one city, loaded in one pass.
/// Nothing here mutates; recomputing a recommendation set is just a matter
/// of building a fresh snapshot and running the evaluators again.
#[derive(Clone, Debug, Default)]
pub struct MarketSnapshot {
    city_name: String,
    items: Vec<Item>,
    index: HashMap<ItemId, usize>,
    prices: HashMap<ItemId, f64>,
}

impl MarketSnapshot {
    pub fn new(
        city_name: impl Into<String>,
        items: Vec<Item>,
        prices: HashMap<ItemId, f64>,
    ) -> Self {
        let index = items
            .iter()
            .enumerate()
            .map(|(position, item)| (item.id.clone(), position))
            .collect();
        Self {
            city_name: city_name.into(),
            items,
            index,
            prices,
        }
    }

    pub fn city_name(&self) -> &str {
        &self.city_name
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn item(&self, item_id: &str) -> Option<&Item> {
        self.index.get(item_id).map(|position| &self.items[*position])
    }

    /// Committed price for an item in this snapshot's city. Absence means
    /// "no price recorded"; non-finite or non-positive entries are treated
    /// the same way.
    pub fn price(&self, item_id: &str) -> Option<f64> {
        self.prices
            .get(item_id)
            .copied()
            .filter(|price| price.is_finite() && *price > 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::ItemCategory;

    fn item(id: &str) -> Item {
        Item {
            id: id.to_string(),
            name: id.to_string(),
            tier: 1,
            category: ItemCategory::Resource,
            description: None,
            rarity: None,
            icon_url: None,
            harvest_minutes: None,
            craft_minutes: None,
            recipe: None,
        }
    }

    #[test]
    fn looks_up_items_by_id() {
        let snapshot = MarketSnapshot::new(
            "Riverton",
            vec![item("iron-ore"), item("oak-log")],
            HashMap::new(),
        );
        assert_eq!(snapshot.item("oak-log").map(|i| i.name.as_str()), Some("oak-log"));
        assert!(snapshot.item("missing").is_none());
    }

    #[test]
    fn rejects_degenerate_prices() {
        let prices = HashMap::from([
            ("iron-ore".to_string(), 10.0),
            ("oak-log".to_string(), 0.0),
            ("clay".to_string(), f64::NAN),
        ]);
        let snapshot = MarketSnapshot::new("Riverton", Vec::new(), prices);
        assert_eq!(snapshot.price("iron-ore"), Some(10.0));
        assert_eq!(snapshot.price("oak-log"), None);
        assert_eq!(snapshot.price("clay"), None);
        assert_eq!(snapshot.price("missing"), None);
    }
}

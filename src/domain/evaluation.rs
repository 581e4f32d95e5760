//! Farming and crafting recommendation engine.
//!
//! Both evaluators are pure functions over a [`MarketSnapshot`]: no price is
//! fetched and nothing is mutated here. Missing data never raises; it either
//! excludes an item or demotes its recommendation to a lower tier.

use std::cmp::Ordering;

use super::entities::{
    CostBasis, CostedMaterial, CraftingRecommendation, Difficulty, FarmingRecommendation,
    MarketSummary, Recipe,
};
use super::snapshot::MarketSnapshot;

/// Undercut factor applied to an output's current market price.
const UNDERCUT_FACTOR: f64 = 0.9;
/// Ceiling on the suggested price relative to material cost.
const MARGIN_CAP_FACTOR: f64 = 1.2;
/// Margin (percent) from which a listing is ranked for quick turnover.
const HIGH_MARGIN_PCT: f64 = 20.0;
/// Placeholder unit price for materials with no recorded city price.
const FLOOR_PRICE: f64 = 1.0;
/// Effective harvest time for items that do not declare one.
const DEFAULT_HARVEST_MINUTES: f64 = 1.0;

/// Rank every priced item by expected coin yield per hour of harvesting.
///
/// Items with no recorded price are excluded, not zero-ranked. No category
/// filter is applied here; callers wanting a resources-only view filter
/// upstream.
pub fn farming_recommendations(snapshot: &MarketSnapshot) -> Vec<FarmingRecommendation> {
    let mut recommendations = Vec::new();

    for item in snapshot.items() {
        let Some(price) = snapshot.price(&item.id) else {
            continue;
        };

        let minutes = effective_harvest_minutes(item.harvest_minutes);
        let profit_per_hour = price / (minutes / 60.0);

        recommendations.push(FarmingRecommendation {
            item: item.clone(),
            profit_per_hour,
            harvest_minutes: minutes,
            difficulty: Difficulty::from_harvest_minutes(minutes),
        });
    }

    recommendations.sort_by(|a, b| {
        b.profit_per_hour
            .partial_cmp(&a.profit_per_hour)
            .unwrap_or(Ordering::Equal)
    });
    recommendations
}

/// An unset or non-positive harvest time counts as one minute. That turns
/// "unknown time" into an intentionally large profit rate instead of a
/// division failure; callers flag such entries visually.
fn effective_harvest_minutes(declared: Option<f64>) -> f64 {
    match declared {
        Some(minutes) if minutes > 0.0 => minutes,
        _ => DEFAULT_HARVEST_MINUTES,
    }
}

/// For every craftable item, decide whether crafting and reselling is
/// profitable and at what listing price, then rank the results in three
/// tiers: strictly costed, estimated, and floor-priced leftovers.
pub fn crafting_recommendations(snapshot: &MarketSnapshot) -> Vec<CraftingRecommendation> {
    let mut strict_tier = Vec::new();
    let mut estimated_tier = Vec::new();
    let mut floor_tier = Vec::new();

    for item in snapshot.items() {
        let Some(recipe) = item.recipe.as_ref() else {
            continue;
        };
        if recipe.materials.is_empty() {
            continue;
        }

        let strict = resolve_materials(recipe, snapshot, false);
        let (materials, cost_basis) = if strict.is_empty() {
            let estimated = resolve_materials(recipe, snapshot, true);
            if estimated.is_empty() {
                // Neither pass could cost the recipe, e.g. a material no
                // longer exists in the catalog.
                continue;
            }
            (estimated, CostBasis::Estimated)
        } else {
            (strict, CostBasis::Strict)
        };

        let crafting_cost: f64 = materials.iter().map(|material| material.cost).sum();
        let suggested_price = suggest_price(recipe, snapshot, crafting_cost);
        let total_revenue: f64 = recipe
            .outputs
            .iter()
            .map(|output| suggested_price * output.quantity as f64)
            .sum();
        let profit_per_craft = total_revenue - crafting_cost;
        let profit_margin = if crafting_cost > 0.0 {
            profit_per_craft / crafting_cost * 100.0
        } else {
            0.0
        };

        let recommendation = CraftingRecommendation {
            item: item.clone(),
            materials,
            crafting_cost,
            suggested_price,
            profit_per_craft,
            profit_margin,
            cost_basis,
        };

        if recommendation.suggested_price == FLOOR_PRICE {
            floor_tier.push(recommendation);
        } else if cost_basis == CostBasis::Strict {
            strict_tier.push(recommendation);
        } else {
            estimated_tier.push(recommendation);
        }
    }

    rank_tier(&mut strict_tier);
    rank_tier(&mut estimated_tier);
    rank_tier(&mut floor_tier);

    let mut ranked = strict_tier;
    ranked.append(&mut estimated_tier);
    ranked.append(&mut floor_tier);
    ranked
}

/// Resolve a recipe's materials against the snapshot.
///
/// Returns the empty list when the recipe cannot be costed: a material
/// missing from the catalog is skipped and then caught by the completeness
/// check, and a missing price empties the strict pass outright. With
/// `substitute_missing` set, absent prices are replaced by the floor
/// placeholder so a cost figure always exists for catalog-complete recipes.
fn resolve_materials(
    recipe: &Recipe,
    snapshot: &MarketSnapshot,
    substitute_missing: bool,
) -> Vec<CostedMaterial> {
    let mut resolved = Vec::with_capacity(recipe.materials.len());

    for line in &recipe.materials {
        let Some(material) = snapshot.item(&line.item_id) else {
            continue;
        };
        let unit_price = match snapshot.price(&line.item_id) {
            Some(price) => price,
            None if substitute_missing => FLOOR_PRICE,
            None => return Vec::new(),
        };
        resolved.push(CostedMaterial {
            item: material.clone(),
            quantity: line.quantity,
            unit_price,
            cost: unit_price * line.quantity as f64,
        });
    }

    if resolved.len() != recipe.materials.len() {
        return Vec::new();
    }
    resolved
}

/// Derive the listing price for a craft with total material cost
/// `crafting_cost`: undercut the current market where one exists, but never
/// exceed a 20% margin over cost.
///
/// Outputs are walked in declaration order and each priced output
/// overwrites the previous suggestion, so the last priced output wins.
/// That is observed behavior to keep, not a reduction to rewrite.
fn suggest_price(recipe: &Recipe, snapshot: &MarketSnapshot, crafting_cost: f64) -> f64 {
    let max_with_margin = (crafting_cost * MARGIN_CAP_FACTOR).ceil();

    let mut suggested = None;
    for output in &recipe.outputs {
        let Some(current) = snapshot.price(&output.item_id) else {
            continue;
        };
        let mut undercut = (current * UNDERCUT_FACTOR).ceil();
        if undercut >= current {
            // Rounding ate the discount; drop one coin below the market,
            // floored so degenerate listings stay classifiable.
            undercut = (current - 1.0).max(FLOOR_PRICE);
        }
        suggested = Some(undercut.min(max_with_margin));
    }

    suggested.unwrap_or_else(|| {
        let first_output_quantity = recipe
            .outputs
            .first()
            .map(|output| output.quantity)
            .unwrap_or(1);
        (max_with_margin / first_output_quantity as f64).ceil()
    })
}

/// Order one tier: high-margin entries first, cheapest listing leading so
/// quick flips surface on top; everything else by descending margin.
fn rank_tier(tier: &mut [CraftingRecommendation]) {
    tier.sort_by(|a, b| {
        let a_high = a.profit_margin >= HIGH_MARGIN_PCT;
        let b_high = b.profit_margin >= HIGH_MARGIN_PCT;
        match (a_high, b_high) {
            (true, true) => a
                .suggested_price
                .partial_cmp(&b.suggested_price)
                .unwrap_or(Ordering::Equal),
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => b
                .profit_margin
                .partial_cmp(&a.profit_margin)
                .unwrap_or(Ordering::Equal),
        }
    });
}

/// Per-city digest: catalog counts plus the best pick from each evaluator.
pub fn summarize(snapshot: &MarketSnapshot) -> MarketSummary {
    let farming = farming_recommendations(snapshot);
    let crafting = crafting_recommendations(snapshot);

    MarketSummary {
        city_name: snapshot.city_name().to_string(),
        total_items: snapshot.items().len(),
        farmable_count: snapshot.items().iter().filter(|i| i.is_farmable()).count(),
        craftable_count: snapshot.items().iter().filter(|i| i.is_craftable()).count(),
        top_farming: farming.into_iter().next(),
        top_crafting: crafting.into_iter().next(),
    }
}

use std::time::SystemTime;

use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};

use crate::domain::{
    CraftingRecommendation, FarmingRecommendation, Item, MarketSummary, PriceEntry,
};

pub fn render_farming_table(recommendations: &[FarmingRecommendation]) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Item", "Tier", "Coins/h", "Minutes", "Difficulty"]);

    for r in recommendations {
        table.add_row(Row::from(vec![
            Cell::new(&r.item.name),
            Cell::new(r.item.tier),
            Cell::new(format!("{:.0}", r.profit_per_hour)),
            Cell::new(format!("{:.1}", r.harvest_minutes)),
            difficulty_cell(r),
        ]));
    }
    table.to_string()
}

fn difficulty_cell(r: &FarmingRecommendation) -> Cell {
    let label = r.difficulty.label();
    // An undeclared harvest time means the rate is a sentinel, not a measurement.
    if r.item.harvest_minutes.map(|m| m > 0.0).unwrap_or(false) {
        Cell::new(label)
    } else {
        Cell::new(format!("{label} (no timing)")).fg(Color::Yellow)
    }
}

pub fn render_crafting_table(recommendations: &[CraftingRecommendation]) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "Item", "Cost", "List at", "Profit", "Margin", "Basis",
    ]);

    for r in recommendations {
        let profit_cell = if r.profit_per_craft > 0.0 {
            Cell::new(format!("{:+.0}", r.profit_per_craft)).fg(Color::Green)
        } else {
            Cell::new(format!("{:+.0}", r.profit_per_craft)).fg(Color::Red)
        };
        table.add_row(Row::from(vec![
            Cell::new(&r.item.name),
            Cell::new(format!("{:.0}", r.crafting_cost)),
            Cell::new(format!("{:.0}", r.suggested_price)),
            profit_cell,
            Cell::new(format!("{:.0}%", r.profit_margin)),
            Cell::new(r.cost_basis.label()),
        ]));
    }
    table.to_string()
}

pub fn render_items_table(items: &[Item]) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Name", "Tier", "Category", "Rarity", "Craftable"]);

    for item in items {
        table.add_row(Row::from(vec![
            Cell::new(&item.name),
            Cell::new(item.tier),
            Cell::new(item.category.label()),
            Cell::new(item.rarity.map(|r| r.label()).unwrap_or("-")),
            Cell::new(if item.is_craftable() { "yes" } else { "" }),
        ]));
    }
    table.to_string()
}

pub fn render_prices_table(entries: &[PriceEntry], items: &[Item]) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Item", "Price", "Updated"]);

    for entry in entries {
        let name = items
            .iter()
            .find(|item| item.id == entry.item_id)
            .map(|item| item.name.as_str())
            .unwrap_or(entry.item_id.as_str());
        table.add_row(Row::from(vec![
            Cell::new(name),
            Cell::new(format!("{:.0}", entry.price)),
            Cell::new(format!("{} ago", format_age(entry.last_updated))),
        ]));
    }
    table.to_string()
}

pub fn render_summary(summary: &MarketSummary) -> String {
    let mut lines = vec![
        format!("Market summary for {}", summary.city_name),
        format!(
            "  items: {}  farmable: {}  craftable: {}",
            summary.total_items, summary.farmable_count, summary.craftable_count
        ),
    ];
    match &summary.top_farming {
        Some(top) => lines.push(format!(
            "  best farm:  {} at {:.0} coins/h ({})",
            top.item.name,
            top.profit_per_hour,
            top.difficulty.label()
        )),
        None => lines.push("  best farm:  none (no priced items)".to_string()),
    }
    match &summary.top_crafting {
        Some(top) => lines.push(format!(
            "  best craft: {} listed at {:.0} for {:+.0}/craft ({:.0}% margin, {})",
            top.item.name,
            top.suggested_price,
            top.profit_per_craft,
            top.profit_margin,
            top.cost_basis.label()
        )),
        None => lines.push("  best craft: none (no costable recipes)".to_string()),
    }
    lines.join("\n")
}

/// Human-readable age, `5m` / `3h` / `2d` style.
pub fn format_age(since: SystemTime) -> String {
    let secs = since.elapsed().map(|age| age.as_secs()).unwrap_or(0);
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else if secs < 86400 {
        format!("{}h", secs / 3600)
    } else {
        format!("{}d", secs / 86400)
    }
}

use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use craft_advisor::advisor::Advisor;
use craft_advisor::domain::RecipeLine;
use craft_advisor::infra::api::{ItemSeed, MarketApiClient};
use craft_advisor::infra::cache::{PriceCache, DEFAULT_STALENESS_WINDOW};
use craft_advisor::output::json::render_json;
use craft_advisor::output::table::{
    render_crafting_table, render_farming_table, render_items_table, render_prices_table,
    render_summary,
};
use craft_advisor::util::persistence::{load_settings, save_settings, Settings};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "craft-advisor",
    about = "Farming and crafting profit advisor for city markets"
)]
struct Cli {
    /// City market to work against; defaults to the persisted city.
    #[arg(short, long)]
    city: Option<String>,
    /// Tracker API base URL; defaults to the persisted or built-in one.
    #[arg(long)]
    base_url: Option<String>,
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Ranked profit-per-hour for gathering priced items.
    Farming,
    /// Ranked crafting opportunities with suggested listing prices.
    Crafting,
    /// Per-city digest: counts plus the top pick of each evaluator.
    Summary,
    /// The full item catalog.
    Items,
    /// All committed prices for the city.
    Prices,
    /// Every city with at least one price.
    Cities,
    /// Latest price for one item in the city.
    Price { item: String },
    /// Commit a price for one item in the city.
    SetPrice { item: String, price: f64 },
    /// Remove one item's price in the city.
    RemovePrice { item: String },
    /// Persist the default city (and base URL when passed).
    SetCity { city: String },
    /// Add a single item to the catalog.
    AddItem {
        name: String,
        #[arg(long, default_value_t = 1)]
        tier: u32,
        #[arg(long)]
        icon: Option<String>,
    },
    /// Attach a recipe to an item. Lines are item-id:quantity pairs.
    SetRecipe {
        item: String,
        #[arg(long = "material", required = true)]
        materials: Vec<String>,
        #[arg(long = "output")]
        outputs: Vec<String>,
    },
    /// Bulk-seed the catalog from a JSON file of item definitions.
    InitItems { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut settings = load_settings();

    if let Commands::SetCity { city } = &cli.command {
        settings.default_city = Some(city.clone());
        if let Some(base_url) = &cli.base_url {
            settings.base_url = Some(base_url.clone());
        }
        save_settings(&settings)?;
        println!("Default city set to {city}");
        return Ok(());
    }

    let client = match cli.base_url.as_deref().or(settings.base_url.as_deref()) {
        Some(base) => MarketApiClient::with_base_url(base)?,
        None => MarketApiClient::new()?,
    };
    let advisor = Advisor::new(client, PriceCache::new(DEFAULT_STALENESS_WINDOW));

    match &cli.command {
        Commands::Farming => {
            let city = resolve_city(&cli, &settings)?;
            let recommendations = advisor.farming_recommendations(&city).await?;
            match cli.output {
                OutputFormat::Table => println!("{}", render_farming_table(&recommendations)),
                OutputFormat::Json => println!("{}", render_json(&recommendations)?),
            }
        }
        Commands::Crafting => {
            let city = resolve_city(&cli, &settings)?;
            let recommendations = advisor.crafting_recommendations(&city).await?;
            match cli.output {
                OutputFormat::Table => println!("{}", render_crafting_table(&recommendations)),
                OutputFormat::Json => println!("{}", render_json(&recommendations)?),
            }
        }
        Commands::Summary => {
            let city = resolve_city(&cli, &settings)?;
            let summary = advisor.summarize(&city).await?;
            match cli.output {
                OutputFormat::Table => println!("{}", render_summary(&summary)),
                OutputFormat::Json => println!("{}", render_json(&summary)?),
            }
        }
        Commands::Items => {
            let items = advisor.items().await?;
            match cli.output {
                OutputFormat::Table => println!("{}", render_items_table(&items)),
                OutputFormat::Json => println!("{}", render_json(&items)?),
            }
        }
        Commands::Prices => {
            let city = resolve_city(&cli, &settings)?;
            let entries = advisor.prices_for_city(&city).await?;
            match cli.output {
                OutputFormat::Table => {
                    let items = advisor.items().await?;
                    println!("{}", render_prices_table(&entries, &items));
                }
                OutputFormat::Json => println!("{}", render_json(&entries)?),
            }
        }
        Commands::Cities => {
            let cities = advisor.cities().await?;
            match cli.output {
                OutputFormat::Table => {
                    for city in &cities {
                        println!("{city}");
                    }
                }
                OutputFormat::Json => println!("{}", render_json(&cities)?),
            }
        }
        Commands::Price { item } => {
            let city = resolve_city(&cli, &settings)?;
            match advisor.price_of(item, &city).await? {
                Some(price) => println!("{price}"),
                None => println!("no price recorded for {item} in {city}"),
            }
        }
        Commands::SetPrice { item, price } => {
            let city = resolve_city(&cli, &settings)?;
            let entry = advisor.set_price(item, *price, &city).await?;
            println!("{item} now {} in {}", entry.price, entry.city_name);
        }
        Commands::RemovePrice { item } => {
            let city = resolve_city(&cli, &settings)?;
            if advisor.remove_price(item, &city).await? {
                println!("removed price for {item} in {city}");
            } else {
                println!("no price to remove for {item} in {city}");
            }
        }
        Commands::AddItem { name, tier, icon } => {
            let item = advisor.create_item(name, *tier, icon.as_deref()).await?;
            println!("created {} (id {})", item.name, item.id);
        }
        Commands::SetRecipe {
            item,
            materials,
            outputs,
        } => {
            let materials = parse_recipe_lines(materials)?;
            let outputs = parse_recipe_lines(outputs)?;
            advisor.set_recipe(item, &materials, &outputs).await?;
            println!("recipe saved for {item}");
        }
        Commands::InitItems { file } => {
            let data = fs::read_to_string(file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let seeds: Vec<ItemSeed> = serde_json::from_str(&data)
                .with_context(|| format!("failed to parse {}", file.display()))?;
            let count = advisor.seed_catalog(&seeds).await?;
            println!("seeded {count} items");
        }
        Commands::SetCity { .. } => unreachable!("handled before client setup"),
    }

    Ok(())
}

fn resolve_city(cli: &Cli, settings: &Settings) -> Result<String> {
    cli.city
        .clone()
        .or_else(|| settings.default_city.clone())
        .ok_or_else(|| anyhow!("no city selected; pass --city or run `craft-advisor set-city <name>`"))
}

/// Parse an `item-id:quantity` argument into a recipe line.
fn parse_recipe_lines(raw: &[String]) -> Result<Vec<RecipeLine>> {
    raw.iter()
        .map(|line| {
            let (item_id, quantity) = line
                .rsplit_once(':')
                .ok_or_else(|| anyhow!("expected item-id:quantity, got `{line}`"))?;
            let quantity: u32 = quantity
                .parse()
                .map_err(|_| anyhow!("invalid quantity in `{line}`"))?;
            if quantity == 0 {
                return Err(anyhow!("quantity must be positive in `{line}`"));
            }
            Ok(RecipeLine::new(item_id, quantity))
        })
        .collect()
}

//! Thin asynchronous client for the market tracker API.
//!
//! - Provides typed accessors for the item catalog, per-city prices, and
//!   crafting recipes.
//! - Maintains a short-lived in-memory catalog cache with stale fallbacks.

use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use reqwest::{Client, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::domain::{Item, ItemCategory, PriceEntry, Rarity, Recipe, RecipeLine};

const DEFAULT_BASE_URL: &str = "http://localhost:3001/api/";
const DEFAULT_CATALOG_TTL: Duration = Duration::from_secs(5 * 60);
const USER_AGENT: &str = "craft-advisor/1.0.0";

#[derive(Debug, Error)]
pub enum MarketApiError {
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("http request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("api error: {0}")]
    Api(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CacheStatus {
    Fresh,
    Cached,
    Stale,
}

#[derive(Clone, Debug)]
pub struct CachedPayload<T> {
    pub data: T,
    pub fetched_at: SystemTime,
    pub status: CacheStatus,
}

impl<T> CachedPayload<T> {
    fn new(data: T, fetched_at: SystemTime, status: CacheStatus) -> Self {
        Self {
            data,
            fetched_at,
            status,
        }
    }
}

#[derive(Default)]
struct ClientCache {
    catalog: Option<Cached<Vec<Item>>>,
}

#[derive(Clone)]
pub struct MarketApiClient {
    http: Client,
    base_url: Url,
    cache: Arc<Mutex<ClientCache>>,
    catalog_ttl: Duration,
}

impl MarketApiClient {
    pub fn new() -> Result<Self, MarketApiError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base: &str) -> Result<Self, MarketApiError> {
        // Url::join drops the last segment of slash-less bases.
        let base_url = if base.ends_with('/') {
            Url::parse(base)?
        } else {
            Url::parse(&format!("{base}/"))?
        };
        let http = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            http,
            base_url,
            cache: Arc::new(Mutex::new(ClientCache::default())),
            catalog_ttl: DEFAULT_CATALOG_TTL,
        })
    }

    pub fn with_catalog_ttl(mut self, ttl: Duration) -> Self {
        self.catalog_ttl = ttl;
        self
    }

    pub async fn health(&self) -> Result<(), MarketApiError> {
        let url = self.url("health")?;
        let _: HealthDto = self.fetch_json(self.http.get(url)).await?;
        Ok(())
    }

    /// Full catalog with recipes attached, served from the in-memory cache
    /// when it is younger than the TTL. On a failed fetch an expired catalog
    /// is served with `Stale` status rather than erroring, when one exists.
    pub async fn get_items(&self) -> Result<CachedPayload<Vec<Item>>, MarketApiError> {
        if let Some(payload) = self.cached_catalog().await {
            return Ok(payload);
        }

        match self.fetch_catalog().await {
            Ok(items) => Ok(self.store_catalog(items).await),
            Err(error) => {
                if let Some(stale) = self.cached_catalog_stale().await {
                    warn!("serving stale catalog after fetch failure: {error}");
                    return Ok(stale);
                }
                Err(error)
            }
        }
    }

    /// All committed prices for one city, newest first as the API returns
    /// them. Used to populate the price cache in bulk.
    pub async fn get_prices_for_city(
        &self,
        city_name: &str,
    ) -> Result<Vec<PriceEntry>, MarketApiError> {
        let url = self.url(&format!("prices/{city_name}"))?;
        let rows: Vec<PriceDto> = self.fetch_json(self.http.get(url)).await?;
        let entries: Vec<PriceEntry> = rows.into_iter().filter_map(PriceDto::into_entry).collect();
        debug!("loaded {} prices for city {city_name}", entries.len());
        Ok(entries)
    }

    /// Single price lookup by item name. `None` means no price is recorded
    /// for that (item, city) pair.
    pub async fn get_item_price(
        &self,
        city_name: &str,
        item_name: &str,
    ) -> Result<Option<f64>, MarketApiError> {
        let url = self.url(&format!("prices/{city_name}/{item_name}"))?;
        let dto: SinglePriceDto = self.fetch_json(self.http.get(url)).await?;
        Ok(dto.price)
    }

    /// Commit a price for (item, city). The API upserts, keeping one active
    /// price per pair.
    pub async fn set_item_price(
        &self,
        item: &Item,
        price: f64,
        city_name: &str,
    ) -> Result<PriceEntry, MarketApiError> {
        let url = self.url("prices")?;
        let body = SetPricePayload {
            item_name: &item.name,
            price,
            city_name,
        };
        let dto: PriceDto = self.fetch_json(self.http.post(url).json(&body)).await?;
        Ok(PriceEntry {
            item_id: item.id.clone(),
            id: dto.id,
            city_name: dto.city_name,
            price: dto.price,
            last_updated: parse_timestamp_str(dto.last_updated.as_deref()),
        })
    }

    pub async fn remove_item_price(
        &self,
        city_name: &str,
        item_name: &str,
    ) -> Result<bool, MarketApiError> {
        let url = self.url(&format!("prices/{city_name}/{item_name}"))?;
        let dto: OutcomeDto = self.fetch_json(self.http.delete(url)).await?;
        Ok(dto.success)
    }

    /// Every city with at least one committed price.
    pub async fn get_cities(&self) -> Result<Vec<String>, MarketApiError> {
        let url = self.url("cities")?;
        self.fetch_json(self.http.get(url)).await
    }

    pub async fn create_item(
        &self,
        name: &str,
        tier: u32,
        icon_url: Option<&str>,
    ) -> Result<Item, MarketApiError> {
        let url = self.url("items")?;
        let body = CreateItemPayload {
            name,
            tier,
            image_url: icon_url,
        };
        let dto: ItemDto = self.fetch_json(self.http.post(url).json(&body)).await?;
        self.invalidate_catalog().await;
        Ok(Item::from(dto))
    }

    pub async fn delete_item(&self, item_id: &str) -> Result<bool, MarketApiError> {
        let url = self.url(&format!("items/{item_id}"))?;
        let dto: OutcomeDto = self.fetch_json(self.http.delete(url)).await?;
        self.invalidate_catalog().await;
        Ok(dto.success)
    }

    /// Bulk-seed the catalog. The API upserts by item name, so re-running a
    /// seed file is safe.
    pub async fn init_items(&self, items: &[ItemSeed]) -> Result<usize, MarketApiError> {
        let url = self.url("items/init")?;
        let body = InitItemsPayload { items };
        let dto: InitOutcomeDto = self.fetch_json(self.http.post(url).json(&body)).await?;
        self.invalidate_catalog().await;
        Ok(dto.count)
    }

    pub async fn set_item_recipe(
        &self,
        item_id: &str,
        materials: &[RecipeLine],
        outputs: &[RecipeLine],
    ) -> Result<(), MarketApiError> {
        let url = self.url(&format!("items/{item_id}/recipe"))?;
        let body = RecipePayload {
            materials: materials.iter().map(RecipeLinePayload::from).collect(),
            outputs: outputs.iter().map(RecipeLinePayload::from).collect(),
        };
        let _: OutcomeDto = self.fetch_json(self.http.post(url).json(&body)).await?;
        self.invalidate_catalog().await;
        Ok(())
    }

    pub async fn remove_item_recipe(&self, item_id: &str) -> Result<(), MarketApiError> {
        let url = self.url(&format!("items/{item_id}/recipe"))?;
        let _: OutcomeDto = self.fetch_json(self.http.delete(url)).await?;
        self.invalidate_catalog().await;
        Ok(())
    }

    pub async fn clear_cache(&self) {
        self.cache.lock().await.catalog = None;
    }

    async fn invalidate_catalog(&self) {
        self.cache.lock().await.catalog = None;
    }

    async fn fetch_catalog(&self) -> Result<Vec<Item>, MarketApiError> {
        let url = self.url("items")?;
        let dtos: Vec<ItemDto> = self.fetch_json(self.http.get(url)).await?;
        let mut items: Vec<Item> = dtos.into_iter().map(Item::from).collect();

        for item in &mut items {
            item.recipe = self.fetch_recipe(&item.id).await;
        }

        let with_recipes = items.iter().filter(|item| item.recipe.is_some()).count();
        debug!("loaded {} items ({with_recipes} with recipes)", items.len());
        Ok(items)
    }

    /// Recipe for one item. A fetch failure or an empty materials list both
    /// mean "not craftable" and resolve to `None`.
    async fn fetch_recipe(&self, item_id: &str) -> Option<Recipe> {
        let url = self.url(&format!("items/{item_id}/recipe")).ok()?;
        match self.fetch_json::<RecipeDto>(self.http.get(url)).await {
            Ok(dto) if !dto.materials.is_empty() => Some(Recipe::new(
                item_id,
                dto.materials.into_iter().map(RecipeLine::from).collect(),
                dto.outputs.into_iter().map(RecipeLine::from).collect(),
            )),
            Ok(_) => None,
            Err(error) => {
                debug!("no recipe for item {item_id}: {error}");
                None
            }
        }
    }

    async fn cached_catalog(&self) -> Option<CachedPayload<Vec<Item>>> {
        let cache = self.cache.lock().await;
        cache
            .catalog
            .as_ref()
            .and_then(|entry| entry.if_fresh(self.catalog_ttl))
    }

    async fn cached_catalog_stale(&self) -> Option<CachedPayload<Vec<Item>>> {
        let cache = self.cache.lock().await;
        cache.catalog.as_ref().map(Cached::stale)
    }

    async fn store_catalog(&self, items: Vec<Item>) -> CachedPayload<Vec<Item>> {
        let fetched_at = SystemTime::now();
        let payload = CachedPayload::new(items.clone(), fetched_at, CacheStatus::Fresh);
        self.cache.lock().await.catalog = Some(Cached::new(items, fetched_at));
        payload
    }

    async fn fetch_json<T>(&self, builder: reqwest::RequestBuilder) -> Result<T, MarketApiError>
    where
        T: DeserializeOwned,
    {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ApiErrorDto>()
                .await
                .ok()
                .and_then(|body| body.error)
                .unwrap_or_else(|| format!("http status {status}"));
            return Err(MarketApiError::Api(message));
        }
        Ok(response.json().await?)
    }

    fn url(&self, path: &str) -> Result<Url, url::ParseError> {
        self.base_url.join(path)
    }
}

struct Cached<T> {
    value: T,
    fetched_at: SystemTime,
}

impl<T: Clone> Cached<T> {
    fn new(value: T, fetched_at: SystemTime) -> Self {
        Self { value, fetched_at }
    }

    fn if_fresh(&self, ttl: Duration) -> Option<CachedPayload<T>> {
        if self
            .fetched_at
            .elapsed()
            .map(|elapsed| elapsed <= ttl)
            .unwrap_or(false)
        {
            Some(CachedPayload::new(
                self.value.clone(),
                self.fetched_at,
                CacheStatus::Cached,
            ))
        } else {
            None
        }
    }

    fn stale(&self) -> CachedPayload<T> {
        CachedPayload::new(self.value.clone(), self.fetched_at, CacheStatus::Stale)
    }
}

/// Seed entry for bulk catalog initialisation. Mirrors the tracker's item
/// payload so seed files can be shipped as plain JSON.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSeed {
    pub name: String,
    pub tier: u32,
    #[serde(rename = "type")]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rarity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub farming_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crafting_time: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct HealthDto {
    #[allow(dead_code)]
    status: String,
    #[allow(dead_code)]
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDto {
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OutcomeDto {
    #[serde(default)]
    success: bool,
}

#[derive(Debug, Deserialize)]
struct InitOutcomeDto {
    #[allow(dead_code)]
    #[serde(default)]
    success: bool,
    #[serde(default)]
    count: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemDto {
    id: String,
    name: String,
    #[serde(default)]
    tier: Option<u32>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    rarity: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    farming_time: Option<f64>,
    #[serde(default)]
    crafting_time: Option<f64>,
}

impl From<ItemDto> for Item {
    fn from(dto: ItemDto) -> Self {
        Self {
            id: dto.id,
            name: dto.name,
            tier: dto.tier.unwrap_or(1),
            category: ItemCategory::parse(dto.kind.as_deref().unwrap_or_default()),
            description: dto.description,
            rarity: dto.rarity.as_deref().and_then(Rarity::parse),
            icon_url: dto.image_url,
            harvest_minutes: dto.farming_time,
            craft_minutes: dto.crafting_time,
            recipe: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceDto {
    id: String,
    #[serde(default)]
    item_id: Option<String>,
    price: f64,
    city_name: String,
    #[serde(default)]
    last_updated: Option<String>,
    #[serde(default)]
    item: Option<ItemDto>,
}

impl PriceDto {
    /// Rows without any item linkage cannot be keyed and are dropped.
    fn into_entry(self) -> Option<PriceEntry> {
        let item_id = self.item_id.or_else(|| self.item.map(|item| item.id))?;
        Some(PriceEntry {
            id: self.id,
            item_id,
            city_name: self.city_name,
            price: self.price,
            last_updated: parse_timestamp_str(self.last_updated.as_deref()),
        })
    }
}

#[derive(Debug, Deserialize)]
struct SinglePriceDto {
    #[serde(default)]
    price: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct RecipeDto {
    #[serde(default)]
    materials: Vec<RecipeLineDto>,
    #[serde(default)]
    outputs: Vec<RecipeLineDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecipeLineDto {
    item_id: String,
    quantity: u32,
}

impl From<RecipeLineDto> for RecipeLine {
    fn from(dto: RecipeLineDto) -> Self {
        Self {
            item_id: dto.item_id,
            quantity: dto.quantity,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SetPricePayload<'a> {
    item_name: &'a str,
    price: f64,
    city_name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateItemPayload<'a> {
    name: &'a str,
    tier: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_url: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct InitItemsPayload<'a> {
    items: &'a [ItemSeed],
}

#[derive(Debug, Serialize)]
struct RecipePayload {
    materials: Vec<RecipeLinePayload>,
    outputs: Vec<RecipeLinePayload>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecipeLinePayload {
    item_id: String,
    quantity: u32,
}

impl From<&RecipeLine> for RecipeLinePayload {
    fn from(line: &RecipeLine) -> Self {
        Self {
            item_id: line.item_id.clone(),
            quantity: line.quantity,
        }
    }
}

fn parse_timestamp_str(raw: Option<&str>) -> SystemTime {
    raw.and_then(|value| {
        OffsetDateTime::parse(value, &Rfc3339).ok().and_then(|dt| {
            if dt.unix_timestamp() >= 0 {
                let secs = dt.unix_timestamp() as u64;
                let nanos = dt.nanosecond() as u64;
                SystemTime::UNIX_EPOCH
                    .checked_add(Duration::from_secs(secs))
                    .and_then(|t| t.checked_add(Duration::from_nanos(nanos)))
            } else {
                None
            }
        })
    })
    .unwrap_or_else(SystemTime::now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_rows_map_camel_case_fields() {
        let dto: ItemDto = serde_json::from_str(
            r#"{
                "id": "abc123",
                "name": "Iron Ore",
                "tier": 2,
                "type": "resource",
                "rarity": "common",
                "imageUrl": "http://img/ore.png",
                "farmingTime": 2,
                "craftingTime": null
            }"#,
        )
        .unwrap();
        let item = Item::from(dto);
        assert_eq!(item.category, ItemCategory::Resource);
        assert_eq!(item.rarity, Some(Rarity::Common));
        assert_eq!(item.harvest_minutes, Some(2.0));
        assert_eq!(item.icon_url.as_deref(), Some("http://img/ore.png"));
        assert!(item.recipe.is_none());
    }

    #[test]
    fn sparse_item_rows_still_map() {
        let dto: ItemDto = serde_json::from_str(r#"{"id": "x", "name": "Mystery"}"#).unwrap();
        let item = Item::from(dto);
        assert_eq!(item.tier, 1);
        assert_eq!(item.category, ItemCategory::Crafted);
        assert!(item.rarity.is_none());
    }

    #[test]
    fn price_rows_prefer_the_scalar_item_id() {
        let dto: PriceDto = serde_json::from_str(
            r#"{
                "id": "p1",
                "itemId": "abc123",
                "price": 10.5,
                "cityName": "Riverton",
                "lastUpdated": "2024-03-01T12:00:00.000Z",
                "item": {"id": "abc123", "name": "Iron Ore"}
            }"#,
        )
        .unwrap();
        let entry = dto.into_entry().unwrap();
        assert_eq!(entry.item_id, "abc123");
        assert_eq!(entry.price, 10.5);
        assert_eq!(entry.city_name, "Riverton");
    }

    #[test]
    fn price_rows_fall_back_to_the_item_relation() {
        let dto: PriceDto = serde_json::from_str(
            r#"{
                "id": "p2",
                "price": 3,
                "cityName": "Eastport",
                "item": {"id": "def456", "name": "Oak Log"}
            }"#,
        )
        .unwrap();
        assert_eq!(dto.into_entry().unwrap().item_id, "def456");

        let orphan: PriceDto = serde_json::from_str(
            r#"{"id": "p3", "price": 3, "cityName": "Eastport"}"#,
        )
        .unwrap();
        assert!(orphan.into_entry().is_none());
    }

    #[test]
    fn absent_single_price_decodes_to_none() {
        let dto: SinglePriceDto = serde_json::from_str(r#"{"price": null}"#).unwrap();
        assert_eq!(dto.price, None);
        let dto: SinglePriceDto = serde_json::from_str(r#"{"price": 12}"#).unwrap();
        assert_eq!(dto.price, Some(12.0));
    }

    #[test]
    fn recipe_rows_default_missing_sections() {
        let dto: RecipeDto = serde_json::from_str(
            r#"{"materials": [{"itemId": "ore", "quantity": 3}]}"#,
        )
        .unwrap();
        assert_eq!(dto.materials.len(), 1);
        assert!(dto.outputs.is_empty());

        let recipe = Recipe::new(
            "sword",
            dto.materials.into_iter().map(RecipeLine::from).collect(),
            dto.outputs.into_iter().map(RecipeLine::from).collect(),
        );
        assert_eq!(recipe.outputs, vec![RecipeLine::new("sword", 1)]);
    }

    #[test]
    fn timestamps_parse_rfc3339_with_millis() {
        let parsed = parse_timestamp_str(Some("2024-03-01T12:00:00.000Z"));
        let expected = SystemTime::UNIX_EPOCH + Duration::from_secs(1_709_294_400);
        assert_eq!(parsed, expected);
    }

    #[test]
    fn seed_entries_round_trip_the_wire_shape() {
        let seed: ItemSeed = serde_json::from_str(
            r#"{"name": "Iron Ore", "tier": 1, "type": "resource", "farmingTime": 2}"#,
        )
        .unwrap();
        assert_eq!(seed.category, "resource");
        let json = serde_json::to_value(&seed).unwrap();
        assert_eq!(json["type"], "resource");
        assert_eq!(json["farmingTime"], 2.0);
        assert!(json.get("rarity").is_none());
    }
}

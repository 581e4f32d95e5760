//! Wires the API client and price cache into the recommendation engine.
//!
//! The evaluators themselves are pure; everything that suspends (catalog
//! fetches, price fetches, background refreshes) happens here. Collaborator
//! failures surface as errors so callers can tell "nothing is profitable"
//! apart from "data could not be loaded".

use std::collections::HashMap;

use thiserror::Error;
use tracing::warn;

use crate::domain::{
    evaluation, CraftingRecommendation, FarmingRecommendation, Item, ItemId, MarketSnapshot,
    MarketSummary, PriceEntry, RecipeLine,
};
use crate::infra::api::{CacheStatus, ItemSeed, MarketApiClient, MarketApiError};
use crate::infra::cache::PriceCache;

#[derive(Debug, Error)]
pub enum AdvisorError {
    #[error("market api error: {0}")]
    Api(#[from] MarketApiError),
    #[error("unknown item: {0}")]
    UnknownItem(String),
}

#[derive(Clone)]
pub struct Advisor {
    client: MarketApiClient,
    cache: PriceCache,
}

impl Advisor {
    pub fn new(client: MarketApiClient, cache: PriceCache) -> Self {
        Self { client, cache }
    }

    /// Load the (items, prices) view for one city. Catalog comes from the
    /// client's TTL cache; prices come from the price cache, refreshed in
    /// the background when stale.
    pub async fn snapshot(&self, city_name: &str) -> Result<MarketSnapshot, AdvisorError> {
        let catalog = self.client.get_items().await?;
        if catalog.status == CacheStatus::Stale {
            warn!("catalog is stale; tracker API unreachable");
        }
        let prices = self.city_prices(city_name).await?;
        Ok(MarketSnapshot::new(city_name, catalog.data, prices))
    }

    pub async fn farming_recommendations(
        &self,
        city_name: &str,
    ) -> Result<Vec<FarmingRecommendation>, AdvisorError> {
        Ok(evaluation::farming_recommendations(
            &self.snapshot(city_name).await?,
        ))
    }

    pub async fn crafting_recommendations(
        &self,
        city_name: &str,
    ) -> Result<Vec<CraftingRecommendation>, AdvisorError> {
        Ok(evaluation::crafting_recommendations(
            &self.snapshot(city_name).await?,
        ))
    }

    pub async fn summarize(&self, city_name: &str) -> Result<MarketSummary, AdvisorError> {
        Ok(evaluation::summarize(&self.snapshot(city_name).await?))
    }

    /// Latest known price for an item (by id or name) in one city.
    pub async fn price_of(
        &self,
        item_query: &str,
        city_name: &str,
    ) -> Result<Option<f64>, AdvisorError> {
        let item = self.find_item(item_query).await?;
        let prices = self.city_prices(city_name).await?;
        Ok(prices.get(&item.id).copied())
    }

    /// Commit a price for an item in a city, then write it through to the
    /// cache. Listing a craft at its suggested price goes through here.
    pub async fn set_price(
        &self,
        item_query: &str,
        price: f64,
        city_name: &str,
    ) -> Result<PriceEntry, AdvisorError> {
        let item = self.find_item(item_query).await?;
        let entry = self.client.set_item_price(&item, price, city_name).await?;
        self.cache.upsert(&entry);
        Ok(entry)
    }

    pub async fn remove_price(
        &self,
        item_query: &str,
        city_name: &str,
    ) -> Result<bool, AdvisorError> {
        let item = self.find_item(item_query).await?;
        let removed = self
            .client
            .remove_item_price(city_name, &item.name)
            .await?;
        if removed {
            self.cache.remove(&item.id, city_name);
        }
        Ok(removed)
    }

    pub async fn items(&self) -> Result<Vec<Item>, AdvisorError> {
        Ok(self.client.get_items().await?.data)
    }

    pub async fn cities(&self) -> Result<Vec<String>, AdvisorError> {
        Ok(self.client.get_cities().await?)
    }

    pub async fn prices_for_city(
        &self,
        city_name: &str,
    ) -> Result<Vec<PriceEntry>, AdvisorError> {
        Ok(self.client.get_prices_for_city(city_name).await?)
    }

    pub async fn create_item(
        &self,
        name: &str,
        tier: u32,
        icon_url: Option<&str>,
    ) -> Result<Item, AdvisorError> {
        Ok(self.client.create_item(name, tier, icon_url).await?)
    }

    pub async fn set_recipe(
        &self,
        item_query: &str,
        materials: &[RecipeLine],
        outputs: &[RecipeLine],
    ) -> Result<(), AdvisorError> {
        let item = self.find_item(item_query).await?;
        Ok(self
            .client
            .set_item_recipe(&item.id, materials, outputs)
            .await?)
    }

    pub async fn seed_catalog(&self, seeds: &[ItemSeed]) -> Result<usize, AdvisorError> {
        Ok(self.client.init_items(seeds).await?)
    }

    /// Resolve an item by exact id or case-insensitive name.
    pub async fn find_item(&self, query: &str) -> Result<Item, AdvisorError> {
        let catalog = self.client.get_items().await?;
        catalog
            .data
            .into_iter()
            .find(|item| item.id == query || item.name.eq_ignore_ascii_case(query))
            .ok_or_else(|| AdvisorError::UnknownItem(query.to_string()))
    }

    /// Prices for one city, serve-then-refresh:
    /// - cached and fresh: serve as is;
    /// - cached but stale: serve immediately, refresh in the background
    ///   (one in-flight refresh per city, extras collapse into it);
    /// - never cached: fetch in the foreground so a storage failure becomes
    ///   an error instead of an empty recommendation list.
    async fn city_prices(&self, city_name: &str) -> Result<HashMap<ItemId, f64>, AdvisorError> {
        if let Some(prices) = self.cache.city_prices(city_name) {
            if self.cache.is_stale(city_name) && self.cache.begin_refresh(city_name) {
                let client = self.client.clone();
                let cache = self.cache.clone();
                let city = city_name.to_string();
                tokio::spawn(async move {
                    match client.get_prices_for_city(&city).await {
                        Ok(entries) => cache.finish_refresh(&city, &entries),
                        Err(error) => {
                            cache.abort_refresh(&city);
                            warn!("background price refresh for {city} failed: {error}");
                        }
                    }
                });
            }
            return Ok(prices);
        }

        if !self.cache.begin_refresh(city_name) {
            // Another caller owns the first fetch; serve the current view.
            return Ok(self.cache.city_prices(city_name).unwrap_or_default());
        }
        match self.client.get_prices_for_city(city_name).await {
            Ok(entries) => {
                self.cache.finish_refresh(city_name, &entries);
                Ok(self.cache.city_prices(city_name).unwrap_or_default())
            }
            Err(error) => {
                self.cache.abort_refresh(city_name);
                Err(error.into())
            }
        }
    }
}

//! City-scoped price cache with bounded staleness and coalesced refreshes.
//!
//! Reads never block: `peek` and `city_prices` return whatever is committed
//! right now, and staleness only signals that a refresh should be started.
//! At most one refresh per city is in flight at a time; concurrent callers
//! collapse onto it and are no-ops until it completes.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use crate::domain::{ItemId, PriceEntry};

/// Staleness window before a background refresh is triggered.
pub const DEFAULT_STALENESS_WINDOW: Duration = Duration::from_secs(30);

/// Time source for staleness decisions. Injected so tests can steer it.
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

#[derive(Clone)]
pub struct PriceCache {
    inner: Arc<Mutex<CacheInner>>,
    staleness_window: Duration,
    clock: Arc<dyn Clock>,
}

#[derive(Default)]
struct CacheInner {
    cities: HashMap<String, CityPrices>,
    in_flight: HashSet<String>,
}

struct CityPrices {
    prices: HashMap<ItemId, f64>,
    fetched_at: SystemTime,
    /// Forces the next staleness check to fail even inside the window.
    invalidated: bool,
}

impl PriceCache {
    pub fn new(staleness_window: Duration) -> Self {
        Self::with_clock(staleness_window, Arc::new(SystemClock))
    }

    pub fn with_clock(staleness_window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CacheInner::default())),
            staleness_window,
            clock,
        }
    }

    /// Latest committed price for an (item, city) pair. `None` means no
    /// price is recorded; prices cached for other cities are never served.
    pub fn peek(&self, item_id: &str, city_name: &str) -> Option<f64> {
        let inner = self.lock();
        inner
            .cities
            .get(city_name)
            .and_then(|city| city.prices.get(item_id).copied())
    }

    /// Bulk view of one city's prices, for snapshot building. `None` when
    /// the city has never been populated.
    pub fn city_prices(&self, city_name: &str) -> Option<HashMap<ItemId, f64>> {
        let inner = self.lock();
        inner.cities.get(city_name).map(|city| city.prices.clone())
    }

    pub fn has_city(&self, city_name: &str) -> bool {
        self.lock().cities.contains_key(city_name)
    }

    /// True when the city should be refreshed: never fetched, explicitly
    /// invalidated, or older than the staleness window.
    pub fn is_stale(&self, city_name: &str) -> bool {
        let inner = self.lock();
        let Some(city) = inner.cities.get(city_name) else {
            return true;
        };
        if city.invalidated {
            return true;
        }
        self.clock
            .now()
            .duration_since(city.fetched_at)
            .map(|age| age > self.staleness_window)
            .unwrap_or(true)
    }

    /// Claim the refresh slot for a city. Returns false when a refresh is
    /// already in flight there; the loser must not fetch.
    pub fn begin_refresh(&self, city_name: &str) -> bool {
        self.lock().in_flight.insert(city_name.to_string())
    }

    /// Commit a bulk fetch and release the refresh slot. Entries recorded
    /// for other cities are ignored rather than cross-filed.
    pub fn finish_refresh(&self, city_name: &str, entries: &[PriceEntry]) {
        let prices = entries
            .iter()
            .filter(|entry| entry.city_name == city_name)
            .map(|entry| (entry.item_id.clone(), entry.price))
            .collect();
        let mut inner = self.lock();
        inner.cities.insert(
            city_name.to_string(),
            CityPrices {
                prices,
                fetched_at: self.clock.now(),
                invalidated: false,
            },
        );
        inner.in_flight.remove(city_name);
    }

    /// Release the refresh slot without committing, after a failed fetch.
    pub fn abort_refresh(&self, city_name: &str) {
        self.lock().in_flight.remove(city_name);
    }

    /// Write-through after a committed price mutation. The new value is
    /// visible immediately and the city is invalidated so the next read
    /// triggers a full refresh.
    pub fn upsert(&self, entry: &PriceEntry) {
        let mut inner = self.lock();
        let now = self.clock.now();
        let city = inner
            .cities
            .entry(entry.city_name.clone())
            .or_insert_with(|| CityPrices {
                prices: HashMap::new(),
                fetched_at: now,
                invalidated: false,
            });
        city.prices.insert(entry.item_id.clone(), entry.price);
        city.invalidated = true;
    }

    /// Drop one (item, city) price after a committed removal.
    pub fn remove(&self, item_id: &str, city_name: &str) {
        let mut inner = self.lock();
        if let Some(city) = inner.cities.get_mut(city_name) {
            city.prices.remove(item_id);
            city.invalidated = true;
        }
    }

    pub fn fetched_at(&self, city_name: &str) -> Option<SystemTime> {
        self.lock().cities.get(city_name).map(|city| city.fetched_at)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheInner> {
        self.inner.lock().expect("price cache mutex poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ManualClock(Mutex<SystemTime>);

    impl ManualClock {
        fn starting_now() -> Arc<Self> {
            Arc::new(Self(Mutex::new(SystemTime::now())))
        }

        fn advance(&self, by: Duration) {
            let mut now = self.0.lock().unwrap();
            *now += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> SystemTime {
            *self.0.lock().unwrap()
        }
    }

    fn entry(item_id: &str, city_name: &str, price: f64) -> PriceEntry {
        PriceEntry {
            id: format!("{item_id}@{city_name}"),
            item_id: item_id.to_string(),
            city_name: city_name.to_string(),
            price,
            last_updated: SystemTime::now(),
        }
    }

    #[test]
    fn set_then_peek_round_trip_is_city_scoped() {
        let cache = PriceCache::new(DEFAULT_STALENESS_WINDOW);
        cache.upsert(&entry("iron-ore", "Riverton", 10.0));
        assert_eq!(cache.peek("iron-ore", "Riverton"), Some(10.0));
        assert_eq!(cache.peek("iron-ore", "Eastport"), None);
        assert_eq!(cache.peek("oak-log", "Riverton"), None);
    }

    #[test]
    fn refresh_commits_only_matching_city_entries() {
        let cache = PriceCache::new(DEFAULT_STALENESS_WINDOW);
        assert!(cache.begin_refresh("Riverton"));
        cache.finish_refresh(
            "Riverton",
            &[
                entry("iron-ore", "Riverton", 10.0),
                entry("iron-ore", "Eastport", 99.0),
            ],
        );
        assert_eq!(cache.peek("iron-ore", "Riverton"), Some(10.0));
        assert!(!cache.has_city("Eastport"));
    }

    #[test]
    fn staleness_follows_the_injected_clock() {
        let clock = ManualClock::starting_now();
        let cache = PriceCache::with_clock(Duration::from_secs(30), clock.clone());

        assert!(cache.is_stale("Riverton"));
        cache.begin_refresh("Riverton");
        cache.finish_refresh("Riverton", &[entry("iron-ore", "Riverton", 10.0)]);
        assert!(!cache.is_stale("Riverton"));

        clock.advance(Duration::from_secs(31));
        assert!(cache.is_stale("Riverton"));
        // Stale entries are still served until the refresh lands.
        assert_eq!(cache.peek("iron-ore", "Riverton"), Some(10.0));
    }

    #[test]
    fn concurrent_refreshes_collapse_per_city() {
        let cache = PriceCache::new(DEFAULT_STALENESS_WINDOW);
        assert!(cache.begin_refresh("Riverton"));
        assert!(!cache.begin_refresh("Riverton"));
        // A different city is an independent slot.
        assert!(cache.begin_refresh("Eastport"));

        cache.finish_refresh("Riverton", &[]);
        assert!(cache.begin_refresh("Riverton"));
    }

    #[test]
    fn aborting_releases_the_refresh_slot() {
        let cache = PriceCache::new(DEFAULT_STALENESS_WINDOW);
        assert!(cache.begin_refresh("Riverton"));
        cache.abort_refresh("Riverton");
        assert!(cache.begin_refresh("Riverton"));
        assert!(!cache.has_city("Riverton"));
    }

    #[test]
    fn upsert_is_visible_immediately_and_invalidates_the_city() {
        let cache = PriceCache::new(DEFAULT_STALENESS_WINDOW);
        cache.begin_refresh("Riverton");
        cache.finish_refresh("Riverton", &[entry("iron-ore", "Riverton", 10.0)]);
        assert!(!cache.is_stale("Riverton"));

        cache.upsert(&entry("iron-ore", "Riverton", 12.0));
        assert_eq!(cache.peek("iron-ore", "Riverton"), Some(12.0));
        assert!(cache.is_stale("Riverton"));
    }

    #[test]
    fn remove_drops_the_price_and_invalidates() {
        let cache = PriceCache::new(DEFAULT_STALENESS_WINDOW);
        cache.begin_refresh("Riverton");
        cache.finish_refresh("Riverton", &[entry("iron-ore", "Riverton", 10.0)]);

        cache.remove("iron-ore", "Riverton");
        assert_eq!(cache.peek("iron-ore", "Riverton"), None);
        assert!(cache.is_stale("Riverton"));
    }
}

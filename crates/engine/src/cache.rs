use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::debug;

use common::Venue;

use crate::scanner::ScanReport;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ScanKey {
    venue: Venue,
    fingerprint: String,
    symbols: Vec<String>,
}

impl ScanKey {
    fn new(venue: Venue, fingerprint: &str, symbols: &[String]) -> Self {
        let mut symbols = symbols.to_vec();
        symbols.sort();
        symbols.dedup();
        Self {
            venue,
            fingerprint: fingerprint.to_string(),
            symbols,
        }
    }
}

#[derive(Debug, Clone)]
struct Entry<T> {
    stored_at: Instant,
    value: T,
}

/// Time-boxed cache of scan reports and symbol universes.
///
/// Owned by the caller and handed to the scanner. Reports are keyed by venue,
/// strategy fingerprint and the (order-insensitive) symbol set; universes by
/// venue and requested size. Entries older than the TTL are never returned.
#[derive(Debug)]
pub struct ScanCache {
    ttl: Duration,
    scans: RwLock<HashMap<ScanKey, Entry<ScanReport>>>,
    pairs: RwLock<HashMap<(Venue, usize), Entry<Vec<String>>>>,
}

impl ScanCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            scans: RwLock::new(HashMap::new()),
            pairs: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn fresh<T: Clone>(&self, entry: Option<&Entry<T>>) -> Option<T> {
        entry
            .filter(|e| e.stored_at.elapsed() < self.ttl)
            .map(|e| e.value.clone())
    }

    pub async fn get_scan(&self, venue: Venue, fingerprint: &str, symbols: &[String]) -> Option<ScanReport> {
        let key = ScanKey::new(venue, fingerprint, symbols);
        let hit = self.fresh(self.scans.read().await.get(&key));
        if hit.is_some() {
            debug!(venue = %venue, symbols = symbols.len(), "Scan cache hit");
        }
        hit
    }

    pub async fn put_scan(&self, venue: Venue, fingerprint: &str, symbols: &[String], report: ScanReport) {
        let key = ScanKey::new(venue, fingerprint, symbols);
        let mut scans = self.scans.write().await;
        scans.retain(|_, e| e.stored_at.elapsed() < self.ttl);
        scans.insert(
            key,
            Entry {
                stored_at: Instant::now(),
                value: report,
            },
        );
    }

    pub async fn get_pairs(&self, venue: Venue, limit: usize) -> Option<Vec<String>> {
        self.fresh(self.pairs.read().await.get(&(venue, limit)))
    }

    pub async fn put_pairs(&self, venue: Venue, limit: usize, symbols: Vec<String>) {
        let mut pairs = self.pairs.write().await;
        pairs.retain(|_, e| e.stored_at.elapsed() < self.ttl);
        pairs.insert(
            (venue, limit),
            Entry {
                stored_at: Instant::now(),
                value: symbols,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(venue: Venue) -> ScanReport {
        ScanReport::empty(venue, 3)
    }

    fn symbols(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn scan_hit_ignores_symbol_order() {
        let cache = ScanCache::new(Duration::from_secs(60));
        cache
            .put_scan(Venue::Binance, "fp", &symbols(&["A", "B", "C"]), report(Venue::Binance))
            .await;

        assert!(cache
            .get_scan(Venue::Binance, "fp", &symbols(&["C", "A", "B"]))
            .await
            .is_some());
        assert!(cache
            .get_scan(Venue::Bybit, "fp", &symbols(&["A", "B", "C"]))
            .await
            .is_none());
        assert!(cache
            .get_scan(Venue::Binance, "other", &symbols(&["A", "B", "C"]))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn expired_entries_are_not_returned() {
        let cache = ScanCache::new(Duration::ZERO);
        cache.put_pairs(Venue::Bybit, 10, symbols(&["BTCUSDT"])).await;
        assert!(cache.get_pairs(Venue::Bybit, 10).await.is_none());
    }

    #[tokio::test]
    async fn pairs_are_keyed_by_limit() {
        let cache = ScanCache::new(Duration::from_secs(60));
        cache.put_pairs(Venue::Binance, 2, symbols(&["BTCUSDT", "ETHUSDT"])).await;
        assert_eq!(
            cache.get_pairs(Venue::Binance, 2).await,
            Some(symbols(&["BTCUSDT", "ETHUSDT"]))
        );
        assert!(cache.get_pairs(Venue::Binance, 3).await.is_none());
    }

    #[tokio::test]
    async fn storing_prunes_expired_entries() {
        let cache = ScanCache::new(Duration::ZERO);
        cache.put_pairs(Venue::Binance, 2, symbols(&["BTCUSDT"])).await;
        cache.put_pairs(Venue::Binance, 3, symbols(&["ETHUSDT"])).await;
        assert_eq!(cache.pairs.read().await.len(), 1);

        cache.put_scan(Venue::Bybit, "fp", &symbols(&["A"]), report(Venue::Bybit)).await;
        cache.put_scan(Venue::Bybit, "fp", &symbols(&["B"]), report(Venue::Bybit)).await;
        assert_eq!(cache.scans.read().await.len(), 1);
    }
}

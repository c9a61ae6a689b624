use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use common::{
    CandleSeries, CandleSource, Error, Result, ScanResult, SetupType, SymbolSource, Venue,
};
use strategy::{Condition, FrameSet, IndicatorFrame, Verdict};

use crate::cache::ScanCache;

// ─── Venue limits ─────────────────────────────────────────────────────────────

/// Throughput budget for one venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VenueLimits {
    /// Symbols evaluated at once.
    pub max_concurrency: usize,
    /// Pause each task takes after acquiring its slot, before fetching.
    pub call_delay: Option<Duration>,
    /// Hard cap on symbols dispatched per scan, whatever the caller asks for.
    pub max_symbols: usize,
    pub fetch_timeout: Duration,
}

impl VenueLimits {
    pub fn for_venue(venue: Venue) -> Self {
        match venue {
            Venue::Binance => Self {
                max_concurrency: 10,
                call_delay: None,
                max_symbols: 150,
                fetch_timeout: Duration::from_secs(10),
            },
            Venue::Bybit => Self {
                max_concurrency: 5,
                call_delay: Some(Duration::from_millis(100)),
                max_symbols: 100,
                fetch_timeout: Duration::from_secs(10),
            },
        }
    }
}

// ─── Report ───────────────────────────────────────────────────────────────────

/// Outcome of one scan. `results` holds passing symbols in completion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub scan_id: String,
    pub venue: Venue,
    pub requested: usize,
    pub dispatched: usize,
    pub results: Vec<ScanResult>,
    pub rejected: usize,
    pub insufficient: usize,
    pub failed: usize,
    pub finished_at: DateTime<Utc>,
}

impl ScanReport {
    pub fn empty(venue: Venue, requested: usize) -> Self {
        Self {
            scan_id: Uuid::new_v4().to_string(),
            venue,
            requested,
            dispatched: 0,
            results: Vec::new(),
            rejected: 0,
            insufficient: 0,
            failed: 0,
            finished_at: Utc::now(),
        }
    }

    pub fn passed(&self) -> usize {
        self.results.len()
    }
}

/// What happened to one dispatched symbol.
#[derive(Debug)]
enum Outcome {
    Evaluated(ScanResult),
    Insufficient,
    Failed(Error),
}

// ─── Scanner ──────────────────────────────────────────────────────────────────

/// Fans a condition out over many symbols of one venue.
///
/// Each symbol runs as its own task behind a semaphore sized to the venue's
/// budget. A symbol whose fetch fails or times out is counted and skipped;
/// only a scan where every dispatched fetch failed is an error.
pub struct Scanner {
    source: Arc<dyn CandleSource>,
    condition: Arc<dyn Condition>,
    limits: VenueLimits,
    candle_limit: usize,
    only_pulse: bool,
    cache: Option<Arc<ScanCache>>,
}

impl Scanner {
    pub const DEFAULT_CANDLE_LIMIT: usize = 150;

    pub fn new(source: Arc<dyn CandleSource>, condition: Arc<dyn Condition>) -> Self {
        let limits = VenueLimits::for_venue(source.venue());
        Self {
            source,
            condition,
            limits,
            candle_limit: Self::DEFAULT_CANDLE_LIMIT,
            only_pulse: false,
            cache: None,
        }
    }

    pub fn with_limits(mut self, limits: VenueLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_candle_limit(mut self, limit: usize) -> Self {
        self.candle_limit = limit;
        self
    }

    /// Keep only passing symbols whose setup is a pullback.
    pub fn only_pulse(mut self, only_pulse: bool) -> Self {
        self.only_pulse = only_pulse;
        self
    }

    pub fn with_cache(mut self, cache: Arc<ScanCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn limits(&self) -> &VenueLimits {
        &self.limits
    }

    /// Cache key part covering everything that changes a result.
    fn fingerprint(&self) -> String {
        format!(
            "{}|limit={}|pulse={}",
            self.condition.fingerprint(),
            self.candle_limit,
            self.only_pulse
        )
    }

    pub async fn scan(&self, symbols: &[String]) -> Result<ScanReport> {
        let venue = self.source.venue();
        let dispatch: Vec<String> = symbols
            .iter()
            .take(self.limits.max_symbols)
            .cloned()
            .collect();

        let fingerprint = self.fingerprint();
        if let Some(cache) = &self.cache {
            if let Some(mut report) = cache.get_scan(venue, &fingerprint, &dispatch).await {
                report.requested = symbols.len();
                return Ok(report);
            }
        }

        let mut report = ScanReport::empty(venue, symbols.len());
        let span = info_span!("scan", scan_id = %report.scan_id, venue = %venue);
        self.run(&dispatch, &mut report).instrument(span).await?;

        if let Some(cache) = &self.cache {
            cache
                .put_scan(venue, &fingerprint, &dispatch, report.clone())
                .await;
        }
        Ok(report)
    }

    async fn run(&self, dispatch: &[String], report: &mut ScanReport) -> Result<()> {
        let started = Instant::now();
        report.dispatched = dispatch.len();
        if report.requested > dispatch.len() {
            warn!(
                requested = report.requested,
                cap = self.limits.max_symbols,
                "Symbol list truncated to venue cap"
            );
        }
        info!(
            strategy = %self.condition.name(),
            symbols = dispatch.len(),
            concurrency = self.limits.max_concurrency,
            "Scan started"
        );

        let gate = Arc::new(Semaphore::new(self.limits.max_concurrency.max(1)));
        let mut tasks = JoinSet::new();
        for symbol in dispatch {
            let gate = gate.clone();
            let source = self.source.clone();
            let condition = self.condition.clone();
            let symbol = symbol.clone();
            let limits = self.limits;
            let candle_limit = self.candle_limit;

            tasks.spawn(
                async move {
                    let Ok(_permit) = gate.acquire_owned().await else {
                        return (symbol, Outcome::Failed(Error::Other("scan gate closed".into())));
                    };
                    if let Some(delay) = limits.call_delay {
                        tokio::time::sleep(delay).await;
                    }
                    let outcome =
                        evaluate_symbol(&*source, &*condition, &symbol, candle_limit, limits.fetch_timeout)
                            .await;
                    (symbol, outcome)
                }
                .in_current_span(),
            );
        }

        while let Some(joined) = tasks.join_next().await {
            let (symbol, outcome) = match joined {
                Ok(done) => done,
                Err(e) => {
                    warn!(error = %e, "Symbol task aborted");
                    report.failed += 1;
                    continue;
                }
            };
            match outcome {
                Outcome::Evaluated(result) if result.pass => {
                    if self.only_pulse && result.setup != Some(SetupType::Pulse) {
                        report.rejected += 1;
                    } else {
                        debug!(symbol = %symbol, side = ?result.side, "Symbol passed");
                        report.results.push(result);
                    }
                }
                Outcome::Evaluated(_) => report.rejected += 1,
                Outcome::Insufficient => report.insufficient += 1,
                Outcome::Failed(e) => {
                    warn!(symbol = %symbol, error = %e, "Symbol fetch failed");
                    report.failed += 1;
                }
            }
        }

        report.finished_at = Utc::now();
        info!(
            passed = report.results.len(),
            rejected = report.rejected,
            insufficient = report.insufficient,
            failed = report.failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Scan finished"
        );

        if report.dispatched > 0 && report.failed == report.dispatched {
            return Err(Error::VenueUnreachable {
                venue: report.venue,
                failed: report.failed,
            });
        }
        Ok(())
    }
}

/// Fetch every timeframe the condition reads, then evaluate.
async fn evaluate_symbol(
    source: &dyn CandleSource,
    condition: &dyn Condition,
    symbol: &str,
    candle_limit: usize,
    fetch_timeout: Duration,
) -> Outcome {
    let mut frames = FrameSet::default();
    for timeframe in condition.timeframes() {
        let candles = match tokio::time::timeout(fetch_timeout, source.fetch(symbol, timeframe, candle_limit)).await {
            Ok(Ok(candles)) => candles,
            Ok(Err(e)) => return Outcome::Failed(e),
            Err(_) => {
                return Outcome::Failed(Error::Timeout {
                    symbol: symbol.to_string(),
                    timeframe,
                })
            }
        };
        match CandleSeries::new(symbol, timeframe, candles) {
            Ok(series) => frames.push(IndicatorFrame::new(series)),
            Err(e) => return Outcome::Failed(e),
        }
    }

    match condition.evaluate(symbol, &frames) {
        Verdict::Evaluated(result) => Outcome::Evaluated(result),
        Verdict::Insufficient {
            timeframe,
            bars,
            required,
        } => {
            debug!(symbol = %symbol, timeframe = %timeframe, bars, required, "Insufficient history");
            Outcome::Insufficient
        }
    }
}

/// Top `limit` symbols of a venue by traded volume, through the cache when given.
pub async fn load_universe(
    source: &dyn SymbolSource,
    venue: Venue,
    limit: usize,
    cache: Option<&ScanCache>,
) -> Result<Vec<String>> {
    if let Some(cache) = cache {
        if let Some(symbols) = cache.get_pairs(venue, limit).await {
            return Ok(symbols);
        }
    }
    let symbols = source.top_symbols(limit).await?;
    info!(venue = %venue, count = symbols.len(), "Loaded symbol universe");
    if let Some(cache) = cache {
        cache.put_pairs(venue, limit, symbols.clone()).await;
    }
    Ok(symbols)
}

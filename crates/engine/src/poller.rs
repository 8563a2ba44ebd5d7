use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use mexcbot_core::{MarketDataSource, TickerStore};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Default pause between two polling cycles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Configuration for the ticker poller.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Pause after each cycle, whatever its outcome.
    pub interval: Duration,
    /// Stop after this many cycles. `None` runs until shutdown.
    pub max_cycles: Option<u64>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_cycles: None,
        }
    }
}

/// What happened during one fetch-and-persist cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Tickers fetched and this many rows written.
    Stored(u64),
    /// The fetch failed; nothing was written.
    FetchFailed,
    /// The fetch succeeded but the write failed.
    StoreFailed,
}

/// Counters accumulated over a poller run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollStats {
    pub cycles: u64,
    pub stored_cycles: u64,
    pub fetch_failures: u64,
    pub store_failures: u64,
    pub rows_written: u64,
}

impl PollStats {
    fn record(&mut self, outcome: CycleOutcome) {
        self.cycles += 1;
        match outcome {
            CycleOutcome::Stored(rows) => {
                self.stored_cycles += 1;
                self.rows_written += rows;
            }
            CycleOutcome::FetchFailed => self.fetch_failures += 1,
            CycleOutcome::StoreFailed => self.store_failures += 1,
        }
    }
}

/// Fetches ticker snapshots and upserts them, one cycle at a time.
///
/// The store's schema is created lazily and retried before every upsert until
/// it succeeds, so a database that is down at startup only costs cycles.
pub struct Poller<M, S> {
    source: M,
    store: S,
    config: PollerConfig,
    schema_ready: AtomicBool,
}

impl<M: MarketDataSource, S: TickerStore> Poller<M, S> {
    pub fn new(source: M, store: S, config: PollerConfig) -> Self {
        Self {
            source,
            store,
            config,
            schema_ready: AtomicBool::new(false),
        }
    }

    pub fn source(&self) -> &M {
        &self.source
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Make sure the backing table exists. Returns false (after logging) when
    /// the store is unreachable; the next call tries again.
    pub async fn ensure_schema(&self) -> bool {
        if self.schema_ready.load(Ordering::Acquire) {
            return true;
        }
        match self.store.ensure_schema().await {
            Ok(()) => {
                self.schema_ready.store(true, Ordering::Release);
                true
            }
            Err(e) => {
                warn!(error = %e, "Could not prepare ticker table, will retry next cycle");
                false
            }
        }
    }

    /// Run one fetch-and-persist cycle. Failures are logged and reported in the
    /// outcome, never propagated.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let tickers = match self.source.fetch_tickers().await {
            Ok(tickers) => tickers,
            Err(e) => {
                warn!(error = %e, "Ticker fetch failed, skipping persistence this cycle");
                return CycleOutcome::FetchFailed;
            }
        };

        if !self.ensure_schema().await {
            return CycleOutcome::StoreFailed;
        }

        match self.store.upsert(&tickers).await {
            Ok(rows) => {
                debug!(rows, "Tickers stored");
                CycleOutcome::Stored(rows)
            }
            Err(e) => {
                warn!(error = %e, fetched = tickers.len(), "Ticker upsert failed");
                CycleOutcome::StoreFailed
            }
        }
    }

    fn limit_reached(&self, stats: &PollStats) -> bool {
        self.config.max_cycles.is_some_and(|max| stats.cycles >= max)
    }

    /// Poll until `shutdown` turns true (or its sender is dropped), or until the
    /// configured cycle limit is reached.
    ///
    /// Cycles never overlap: the interval starts after the previous cycle ends.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> PollStats {
        let mut stats = PollStats::default();

        info!(
            interval_ms = self.config.interval.as_millis() as u64,
            max_cycles = ?self.config.max_cycles,
            "Poller started"
        );

        loop {
            if *shutdown.borrow() || self.limit_reached(&stats) {
                break;
            }

            let outcome = self.run_cycle().await;
            stats.record(outcome);

            if self.limit_reached(&stats) {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!(
            cycles = stats.cycles,
            stored = stats.stored_cycles,
            fetch_failures = stats.fetch_failures,
            store_failures = stats.store_failures,
            rows = stats.rows_written,
            "Poller stopped"
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mexcbot_core::{ExchangeError, StoreError, TickerRow, TickerSnapshot};
    use mexcbot_data::MemoryTickerStore;
    use rust_decimal_macros::dec;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    fn tickers(last: rust_decimal::Decimal) -> Vec<TickerSnapshot> {
        vec![TickerSnapshot {
            symbol: "BTCUSDT".into(),
            last_price: last,
            price_change_percent: dec!(0.01),
            high_price: last,
            low_price: last,
            volume: dec!(10),
        }]
    }

    /// Replays scripted fetch results, then keeps returning the last good batch.
    struct ScriptedSource {
        script: Mutex<VecDeque<Result<Vec<TickerSnapshot>, ExchangeError>>>,
        fetches: AtomicU64,
        stop_after: Option<(u64, watch::Sender<bool>)>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<Vec<TickerSnapshot>, ExchangeError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                fetches: AtomicU64::new(0),
                stop_after: None,
            }
        }
    }

    #[async_trait]
    impl MarketDataSource for ScriptedSource {
        async fn fetch_tickers(&self) -> Result<Vec<TickerSnapshot>, ExchangeError> {
            let n = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some((limit, tx)) = &self.stop_after {
                if n >= *limit {
                    tx.send(true).unwrap();
                }
            }
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(tickers(dec!(1))))
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl TickerStore for BrokenStore {
        async fn ensure_schema(&self) -> Result<(), StoreError> {
            Ok(())
        }

        async fn upsert(&self, _tickers: &[TickerSnapshot]) -> Result<u64, StoreError> {
            Err(StoreError::Database("connection refused".into()))
        }

        async fn load_all(&self) -> Result<Vec<TickerRow>, StoreError> {
            Ok(Vec::new())
        }
    }

    /// Fails `ensure_schema` for the first `schema_failures` calls and `upsert`
    /// for the first `upsert_failures` calls, then behaves like a memory store.
    struct RecoveringStore {
        inner: MemoryTickerStore,
        schema_failures: u64,
        upsert_failures: u64,
        schema_calls: AtomicU64,
        upsert_calls: AtomicU64,
    }

    impl RecoveringStore {
        fn new(schema_failures: u64, upsert_failures: u64) -> Self {
            Self {
                inner: MemoryTickerStore::new(),
                schema_failures,
                upsert_failures,
                schema_calls: AtomicU64::new(0),
                upsert_calls: AtomicU64::new(0),
            }
        }
    }

    #[async_trait]
    impl TickerStore for RecoveringStore {
        async fn ensure_schema(&self) -> Result<(), StoreError> {
            let n = self.schema_calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.schema_failures {
                return Err(StoreError::Database("pool timed out while waiting for an open connection".into()));
            }
            self.inner.ensure_schema().await
        }

        async fn upsert(&self, tickers: &[TickerSnapshot]) -> Result<u64, StoreError> {
            let n = self.upsert_calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.upsert_failures {
                return Err(StoreError::Database("connection reset".into()));
            }
            self.inner.upsert(tickers).await
        }

        async fn load_all(&self) -> Result<Vec<TickerRow>, StoreError> {
            self.inner.load_all().await
        }
    }

    fn fast(max_cycles: u64) -> PollerConfig {
        PollerConfig {
            interval: Duration::ZERO,
            max_cycles: Some(max_cycles),
        }
    }

    #[tokio::test]
    async fn test_fetch_failure_skips_persistence_and_keeps_polling() {
        let source = ScriptedSource::new(vec![
            Ok(tickers(dec!(30000))),
            Err(ExchangeError::Status {
                status: 500,
                body: "oops".into(),
            }),
            Ok(tickers(dec!(31000))),
        ]);
        let poller = Poller::new(source, MemoryTickerStore::new(), fast(3));
        let (_tx, rx) = watch::channel(false);

        let stats = poller.run(rx).await;

        assert_eq!(stats.cycles, 3);
        assert_eq!(stats.stored_cycles, 2);
        assert_eq!(stats.fetch_failures, 1);
        assert_eq!(stats.rows_written, 2);
        let row = poller.store().get("BTCUSDT").await.unwrap();
        assert_eq!(row.last_price, dec!(31000));
    }

    #[tokio::test]
    async fn test_failed_fetch_writes_nothing() {
        let source = ScriptedSource::new(vec![Err(ExchangeError::Request("timeout".into()))]);
        let poller = Poller::new(source, MemoryTickerStore::new(), fast(1));

        assert_eq!(poller.run_cycle().await, CycleOutcome::FetchFailed);
        assert!(poller.store().is_empty().await);
    }

    #[tokio::test]
    async fn test_database_outage_at_startup_recovers() {
        let poller = Poller::new(ScriptedSource::new(Vec::new()), RecoveringStore::new(2, 1), fast(5));
        let (_tx, rx) = watch::channel(false);

        let stats = poller.run(rx).await;

        assert_eq!(stats.cycles, 5);
        assert_eq!(stats.store_failures, 3);
        assert_eq!(stats.stored_cycles, 2);
        assert_eq!(stats.rows_written, 2);
        assert_eq!(poller.store().schema_calls.load(Ordering::SeqCst), 3);
        assert_eq!(poller.store().upsert_calls.load(Ordering::SeqCst), 3);
        assert!(poller.store().inner.get("BTCUSDT").await.is_some());
    }

    #[tokio::test]
    async fn test_schema_prepared_once() {
        let poller = Poller::new(ScriptedSource::new(Vec::new()), RecoveringStore::new(0, 0), fast(3));
        let (_tx, rx) = watch::channel(false);

        poller.run(rx).await;
        assert_eq!(poller.store().schema_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_max_cycles_runs_nothing() {
        let poller = Poller::new(ScriptedSource::new(Vec::new()), MemoryTickerStore::new(), fast(0));
        let (_tx, rx) = watch::channel(false);

        let stats = poller.run(rx).await;
        assert_eq!(stats, PollStats::default());
        assert_eq!(poller.source().fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_store_failure_does_not_stop_loop() {
        let source = ScriptedSource::new(Vec::new());
        let poller = Poller::new(source, BrokenStore, fast(4));
        let (_tx, rx) = watch::channel(false);

        let stats = poller.run(rx).await;
        assert_eq!(stats.cycles, 4);
        assert_eq!(stats.store_failures, 4);
        assert_eq!(stats.rows_written, 0);
    }

    #[tokio::test]
    async fn test_shutdown_between_cycles() {
        let (tx, rx) = watch::channel(false);
        let mut source = ScriptedSource::new(Vec::new());
        source.stop_after = Some((2, tx));
        let config = PollerConfig {
            interval: Duration::ZERO,
            max_cycles: None,
        };
        let poller = Poller::new(source, MemoryTickerStore::new(), config);

        let stats = tokio::time::timeout(Duration::from_secs(5), poller.run(rx))
            .await
            .expect("poller should stop on shutdown");
        assert_eq!(stats.cycles, 2);
        assert_eq!(poller.source().fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_sleep() {
        let (tx, rx) = watch::channel(false);
        let config = PollerConfig {
            interval: Duration::from_secs(3600),
            max_cycles: None,
        };
        let poller = Poller::new(ScriptedSource::new(Vec::new()), MemoryTickerStore::new(), config);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            tx.send(true).unwrap();
        });

        let stats = tokio::time::timeout(Duration::from_secs(5), poller.run(rx))
            .await
            .expect("shutdown should cut the sleep short");
        assert_eq!(stats.cycles, 1);
        assert_eq!(stats.rows_written, 1);
    }

    #[tokio::test]
    async fn test_shutdown_before_start_runs_nothing() {
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        let poller = Poller::new(ScriptedSource::new(Vec::new()), MemoryTickerStore::new(), fast(10));

        let stats = poller.run(rx).await;
        assert_eq!(stats, PollStats::default());
    }

    #[tokio::test]
    async fn test_dropped_sender_stops_poller() {
        let (tx, rx) = watch::channel(false);
        drop(tx);
        let config = PollerConfig {
            interval: Duration::from_secs(3600),
            max_cycles: None,
        };
        let poller = Poller::new(ScriptedSource::new(Vec::new()), MemoryTickerStore::new(), config);

        let stats = tokio::time::timeout(Duration::from_secs(5), poller.run(rx))
            .await
            .expect("poller should stop when the sender is gone");
        assert_eq!(stats.cycles, 1);
    }
}

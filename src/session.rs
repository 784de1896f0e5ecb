use std::future::Future;
use std::rc::Rc;

use crate::aggregator::{Ingested, TickAggregator};
use crate::backfill::{Backfill, BackfillTicket, CandleSource, HistoricalFetcher, Provenance};
use crate::candle_store::CandleStore;
use crate::clock::Clock;
use crate::model::candle::Candle;
use crate::model::tick::Tick;
use crate::model::timeframe::Timeframe;
use crate::price_stats::PriceStats;

/// Wires the historical fetcher, the tick aggregator and the candle store
/// for one trading pair and one selected timeframe at a time.
pub struct ChartSession<S, C> {
    fetcher: Rc<HistoricalFetcher<S, C>>,
    aggregator: TickAggregator,
    store: CandleStore,
    backfill_count: usize,
    generation: u64,
    pending: Option<BackfillTicket>,
    provenance: Option<Provenance>,
    stats: PriceStats,
    closed: bool,
}

impl<S, C> ChartSession<S, C>
where
    S: CandleSource + 'static,
    C: Clock + 'static,
{
    pub fn new(
        fetcher: HistoricalFetcher<S, C>,
        timeframe: Timeframe,
        capacity: usize,
        backfill_count: usize,
    ) -> Self {
        Self {
            fetcher: Rc::new(fetcher),
            aggregator: TickAggregator::new(timeframe),
            store: CandleStore::new(capacity),
            backfill_count,
            generation: 0,
            pending: None,
            provenance: None,
            stats: PriceStats::default(),
            closed: false,
        }
    }

    pub fn timeframe(&self) -> Timeframe {
        self.aggregator.timeframe()
    }

    /// Select `timeframe` and start loading its history.
    ///
    /// The chart is cleared and the aggregator reconfigured immediately; live
    /// ticks keep flowing into the new timeframe while the returned future
    /// runs. Hand its output back through [`ChartSession::apply_backfill`]
    /// with the returned ticket. Any earlier ticket becomes stale.
    pub fn begin_backfill(
        &mut self,
        timeframe: Timeframe,
    ) -> (BackfillTicket, impl Future<Output = Backfill> + 'static) {
        self.generation += 1;
        let ticket = BackfillTicket {
            timeframe,
            generation: self.generation,
        };
        if let Some(stale) = self.pending.replace(ticket) {
            tracing::debug!(?stale, "Superseding in-flight backfill");
        }
        self.aggregator.configure(timeframe);
        self.store = CandleStore::new(self.store.capacity());
        self.provenance = None;
        tracing::info!(timeframe = %timeframe, generation = ticket.generation, "Timeframe selected");

        let fetcher = Rc::clone(&self.fetcher);
        let count = self.backfill_count;
        (ticket, async move { fetcher.fetch_recent(timeframe, count).await })
    }

    /// Install a finished backfill. Returns false, leaving the chart as is,
    /// when `ticket` is not the latest one issued or the session is closed.
    pub fn apply_backfill(&mut self, ticket: BackfillTicket, backfill: Backfill) -> bool {
        if self.closed || self.pending != Some(ticket) || backfill.timeframe != ticket.timeframe {
            tracing::debug!(?ticket, current = ?self.pending, "Discarding stale backfill");
            return false;
        }
        self.pending = None;

        // Candles completed live while the fetch was running are newer than
        // anything the backfill holds.
        let live: Vec<Candle> = self.store.completed().copied().collect();
        self.store.load_historical(&backfill.candles);
        for candle in live {
            self.store.apply_complete(candle);
        }
        if let Some(current) = self.aggregator.in_progress() {
            self.store.apply_update(current);
        }

        tracing::info!(
            timeframe = %ticket.timeframe,
            candles = backfill.candles.len(),
            provenance = ?backfill.provenance,
            "Backfill applied"
        );
        self.provenance = Some(backfill.provenance);
        true
    }

    /// Feed one live tick through the aggregator into the store.
    /// `None` once the session is shut down.
    pub fn on_tick(&mut self, tick: &Tick) -> Option<Ingested> {
        if self.closed {
            return None;
        }
        self.stats.record(tick.price);
        let ingested = self.aggregator.ingest(tick);
        for event in ingested.events() {
            self.store.apply(event);
        }
        Some(ingested)
    }

    pub fn snapshot(&self) -> Vec<Candle> {
        self.store.snapshot()
    }

    pub fn store(&self) -> &CandleStore {
        &self.store
    }

    pub fn price_stats(&self) -> PriceStats {
        self.stats
    }

    /// `None` until the current timeframe's backfill has been applied.
    pub fn provenance(&self) -> Option<Provenance> {
        self.provenance
    }

    pub fn pending_backfill(&self) -> Option<BackfillTicket> {
        self.pending
    }

    pub fn late_ticks(&self) -> u64 {
        self.aggregator.late_ticks()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Stop accepting ticks and backfill results.
    pub fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.pending = None;
        tracing::info!(
            timeframe = %self.timeframe(),
            candles = self.store.completed_len(),
            ticks = self.stats.ticks,
            late_ticks = self.aggregator.late_ticks(),
            "Chart session closed"
        );
    }
}

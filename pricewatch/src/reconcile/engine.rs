//! Reconciliation engine: one run of fetch, diff, persist, match, notify.
//!
//! Flow per cycle:
//! 1) Load the catalog.
//! 2) Fetch every product (bounded fan-out, failures isolated).
//! 3) Diff against the snapshot cache; write changed snapshots immediately.
//! 4) Append history for changed products in one batch.
//! 5) Dispatch alerts for changed, non-sold-out products (plus undelivered retries).
//! 6) Refresh drifted product metadata.
//!
//! Only catalog and cache unavailability abort a cycle. Overlapping runs are
//! refused: a second `run_cycle` while one is in flight returns `AlreadyRunning`.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use common::logger::{TraceId, child_span, cycle_span, warn_if_slow};
use futures::future::join_all;
use parking_lot::Mutex;
use tracing::{Instrument, debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::catalog::hook::MetadataHook;
use crate::catalog::model::TrackedProduct;
use crate::catalog::repository::CatalogRepository;
use crate::config::{EngineConfig, HistoryFailurePolicy};
use crate::error::PipelineError;
use crate::fetch::gateway::PriceFetchGateway;
use crate::history::PriceHistoryRecord;
use crate::history::store::HistoryStore;
use crate::metrics::counters::Counters;
use crate::notify::dispatcher::NotificationDispatcher;
use crate::notify::provider::PushProvider;
use crate::reconcile::fanout::fetch_all;
use crate::reconcile::types::{CycleReport, PriceObservation};
use crate::snapshot::cache::SnapshotCache;
use crate::snapshot::diff::diff;

/// External collaborators, injected at construction.
#[derive(Clone)]
pub struct EngineDeps {
    pub catalog: Arc<dyn CatalogRepository>,
    pub gateway: Arc<dyn PriceFetchGateway>,
    pub cache: SnapshotCache,
    pub history: Arc<dyn HistoryStore>,
    pub push: Arc<dyn PushProvider>,
    pub metadata_hook: Arc<dyn MetadataHook>,
}

pub struct ReconciliationEngine {
    catalog: Arc<dyn CatalogRepository>,
    gateway: Arc<dyn PriceFetchGateway>,
    cache: SnapshotCache,
    history: Arc<dyn HistoryStore>,
    dispatcher: NotificationDispatcher,
    metadata_hook: Arc<dyn MetadataHook>,

    cfg: EngineConfig,

    /// Observability counters (does not affect behavior).
    counters: Counters,

    /// Single-flight flag.
    in_flight: AtomicBool,
    cycle_seq: AtomicU64,

    /// Products whose alerts were not delivered; re-evaluated next cycle even if unchanged.
    retry_products: Mutex<BTreeSet<Uuid>>,
}

/// Clears the in-flight flag when the cycle ends, including on panic or cancellation.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ReconciliationEngine {
    pub fn new(deps: EngineDeps, cfg: EngineConfig, counters: Counters) -> Self {
        let dispatcher = NotificationDispatcher::new(
            deps.catalog.clone(),
            deps.cache.clone(),
            deps.push,
            cfg.push_channel_id.clone(),
        );

        Self {
            catalog: deps.catalog,
            gateway: deps.gateway,
            cache: deps.cache,
            history: deps.history,
            dispatcher,
            metadata_hook: deps.metadata_hook,
            cfg,
            counters,
            in_flight: AtomicBool::new(false),
            cycle_seq: AtomicU64::new(0),
            retry_products: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    /// Number of products carried over for alert re-delivery.
    pub fn pending_retries(&self) -> usize {
        self.retry_products.lock().len()
    }

    /// Runs one full cycle.
    ///
    /// Per-product fetch failures, history/catalog write failures and push
    /// failures are logged and reflected in the report; only an unreachable
    /// catalog or cache (or an overlapping run) produce an error.
    pub async fn run_cycle(&self) -> Result<CycleReport, PipelineError> {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            Counters::incr(&self.counters.cycles_skipped);
            warn!("reconciliation cycle already in flight; trigger skipped");
            return Err(PipelineError::AlreadyRunning);
        };

        let cycle = self.cycle_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let trace_id = TraceId::new();
        let span = cycle_span(cycle, &trace_id);

        Counters::incr(&self.counters.cycles_started);

        let result = self.reconcile().instrument(span.clone()).await;

        match &result {
            Ok(report) => {
                Counters::incr(&self.counters.cycles_completed);
                span.record("changed", report.changed as u64);
                span.record("sent", report.notifications_sent as u64);
                info!(
                    parent: &span,
                    tracked = report.tracked,
                    fetched = report.fetched,
                    fetch_failures = report.fetch_failures,
                    changed = report.changed,
                    history_written = report.history_written,
                    sent = report.notifications_sent,
                    failed = report.notifications_failed,
                    metadata_updated = report.metadata_updated,
                    "reconciliation cycle complete"
                );
            }
            Err(e) => {
                Counters::incr(&self.counters.cycles_failed);
                error!(parent: &span, error = %e, "reconciliation cycle aborted");
            }
        }

        result
    }

    async fn reconcile(&self) -> Result<CycleReport, PipelineError> {
        let products = warn_if_slow(
            "db_find_all_products",
            Duration::from_millis(500),
            self.catalog.find_all_products(),
        )
        .await
        .map_err(|e| PipelineError::CatalogUnavailable(format!("{e:#}")))?;

        let mut report = CycleReport {
            tracked: products.len(),
            history_written: true,
            ..CycleReport::default()
        };

        if products.is_empty() {
            debug!("catalog is empty; nothing to reconcile");
            return Ok(report);
        }

        // Untracked products can no longer owe alerts.
        {
            let tracked: HashSet<Uuid> = products.iter().map(|p| p.id).collect();
            self.retry_products.lock().retain(|id| tracked.contains(id));
        }

        let fetched = fetch_all(
            self.gateway.as_ref(),
            &products,
            self.cfg.fetch_concurrency,
            self.cfg.fetch_timeout,
        )
        .instrument(child_span("fetch"))
        .await;

        report.fetched = fetched.observations.len();
        report.fetch_failures = fetched.failures;
        Counters::add(&self.counters.fetch_failures, fetched.failures);

        let changed = self.detect_changes(&fetched.observations).await?;
        report.changed = changed.len();
        Counters::add(&self.counters.products_changed, changed.len());

        if !changed.is_empty() {
            report.history_written = self.append_history(&changed).await;
        }

        let withhold_changed =
            !report.history_written && self.withhold_on_history_failure(&changed);

        let candidates =
            self.notification_candidates(&changed, &fetched.observations, withhold_changed);
        report.candidates = candidates.len();

        if !candidates.is_empty() {
            self.notify(&candidates, &mut report).await;
        }

        report.metadata_updated = self
            .refresh_metadata(products, &fetched.observations)
            .instrument(child_span("metadata"))
            .await;

        Ok(report)
    }

    /// Diffs observations against the cache and writes back changed snapshots.
    ///
    /// Returns the observations whose snapshot was written. A failed write
    /// drops the product for this cycle; the stale entry makes the next cycle
    /// detect the same change again.
    #[instrument(skip_all, target = "diff", fields(observed = observations.len()))]
    async fn detect_changes(
        &self,
        observations: &[PriceObservation],
    ) -> Result<Vec<PriceObservation>, PipelineError> {
        if observations.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = observations.iter().map(|o| o.product_id).collect();
        let cached = self
            .cache
            .load_snapshots(&ids)
            .await
            .map_err(|e| PipelineError::CacheUnavailable(format!("{e:#}")))?;

        let writes = observations
            .iter()
            .zip(cached.iter())
            .filter_map(|(obs, prev)| {
                let next = diff(prev.as_ref(), obs.product_price, obs.is_sold_out);
                if next.is_none() {
                    debug!(product_id = %obs.product_id, "unchanged");
                }
                next.map(|entry| (obs, entry))
            })
            .map(|(obs, entry)| async move {
                let res = self.cache.store_snapshot(&obs.product_id, &entry).await;
                (obs, res)
            });

        let mut changed = Vec::new();
        for (obs, res) in join_all(writes).await {
            match res {
                Ok(()) => changed.push(obs.clone()),
                Err(e) => warn!(
                    product_id = %obs.product_id,
                    error = %format!("{e:#}"),
                    "snapshot write failed; change deferred to next cycle"
                ),
            }
        }

        Ok(changed)
    }

    /// Appends one history record per changed product. Returns false on failure.
    #[instrument(skip_all, target = "history", fields(count = changed.len()))]
    async fn append_history(&self, changed: &[PriceObservation]) -> bool {
        let observed_at = Utc::now();
        let records: Vec<PriceHistoryRecord> = changed
            .iter()
            .map(|o| PriceHistoryRecord {
                product_id: o.product_id,
                price: o.product_price,
                is_sold_out: o.is_sold_out,
                observed_at,
            })
            .collect();

        match warn_if_slow(
            "db_history_insert",
            Duration::from_millis(200),
            self.history.insert_many(&records),
        )
        .await
        {
            Ok(()) => true,
            Err(e) => {
                Counters::incr(&self.counters.history_failures);
                warn!(
                    count = records.len(),
                    error = %format!("{e:#}"),
                    "price history write failed"
                );
                false
            }
        }
    }

    /// Logs the history/alert consistency gap and reports whether this
    /// cycle's changed products must be withheld from dispatch.
    fn withhold_on_history_failure(&self, changed: &[PriceObservation]) -> bool {
        let alertable = changed.iter().filter(|o| !o.is_sold_out).count();

        match self.cfg.history_failure_policy {
            HistoryFailurePolicy::DispatchAnyway => {
                if alertable > 0 {
                    warn!(
                        consistency = true,
                        candidates = alertable,
                        "dispatching alerts without durable history records"
                    );
                }
                false
            }
            HistoryFailurePolicy::SkipDispatch => {
                if alertable > 0 {
                    warn!(
                        consistency = true,
                        candidates = alertable,
                        "history write failed; alerts withheld by policy"
                    );
                }
                true
            }
        }
    }

    /// Changed, non-sold-out products plus any product still owed an alert.
    ///
    /// With `withhold_changed`, changed products are left out; a withheld
    /// product that was already owed an alert stays in the retry set.
    fn notification_candidates(
        &self,
        changed: &[PriceObservation],
        observations: &[PriceObservation],
        withhold_changed: bool,
    ) -> Vec<PriceObservation> {
        let mut candidates: Vec<PriceObservation> = if withhold_changed {
            Vec::new()
        } else {
            changed.iter().filter(|o| !o.is_sold_out).cloned().collect()
        };

        let mut retry = self.retry_products.lock();
        if retry.is_empty() {
            return candidates;
        }

        let changed_ids: HashSet<Uuid> = changed.iter().map(|o| o.product_id).collect();
        for obs in observations {
            // Products that were not fetched this cycle stay in the retry set.
            if !retry.contains(&obs.product_id) {
                continue;
            }
            if changed_ids.contains(&obs.product_id) {
                if !withhold_changed {
                    retry.remove(&obs.product_id);
                }
                continue;
            }
            retry.remove(&obs.product_id);
            if obs.is_sold_out {
                continue;
            }
            debug!(product_id = %obs.product_id, "re-evaluating undelivered alerts");
            candidates.push(obs.clone());
        }

        candidates
    }

    async fn notify(&self, candidates: &[PriceObservation], report: &mut CycleReport) {
        let outcome = self
            .dispatcher
            .dispatch(candidates)
            .instrument(child_span("dispatch"))
            .await;

        report.notifications_sent = outcome.sent;
        report.notifications_failed = outcome.failed;
        report.rearmed = outcome.rearmed;

        Counters::add(&self.counters.notifications_sent, outcome.sent);
        Counters::add(&self.counters.notifications_failed, outcome.failed);

        self.retry_products.lock().extend(outcome.retry_products);
    }

    /// Updates stored name/image for products whose fetched values differ.
    ///
    /// Joined by product id; products without a fresh observation are left alone.
    async fn refresh_metadata(
        &self,
        products: Vec<TrackedProduct>,
        observations: &[PriceObservation],
    ) -> usize {
        let fresh: HashMap<Uuid, &PriceObservation> =
            observations.iter().map(|o| (o.product_id, o)).collect();

        let drifted: Vec<TrackedProduct> = products
            .into_iter()
            .filter_map(|mut p| {
                let obs = fresh.get(&p.id)?;
                if p.product_name == obs.product_name && p.image_url == obs.image_url {
                    return None;
                }
                p.product_name = obs.product_name.clone();
                p.image_url = obs.image_url.clone();
                Some(p)
            })
            .collect();

        if drifted.is_empty() {
            return 0;
        }

        if let Err(e) = self.catalog.update_product_metadata(&drifted).await {
            warn!(
                count = drifted.len(),
                error = %format!("{e:#}"),
                "failed to persist refreshed product metadata"
            );
            return 0;
        }

        if let Err(e) = self.metadata_hook.on_products_metadata_changed(&drifted).await {
            warn!(error = %format!("{e:#}"), "metadata hook failed");
        }

        Counters::add(&self.counters.metadata_updates, drifted.len());
        debug!(count = drifted.len(), "product metadata refreshed");
        drifted.len()
    }
}

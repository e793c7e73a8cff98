//! Matches changed products against subscriptions and sends price alerts.
//!
//! Guarantees:
//! - One provider call per dispatch, messages in a stable order.
//! - A subscription is marked NOTIFIED only after the provider accepted its message.
//! - A failed message leaves the subscription ARMED, so it is retried.
//! - Re-arming (price back above target) is persisted immediately, one row at a time;
//!   a failed re-arm write keeps the product for retry.
//! - Only `alert_state` is written back; targets and mutes stay user-owned.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use common::logger::warn_if_slow;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::catalog::model::{TrackingSubscription, Transition};
use crate::catalog::repository::CatalogRepository;
use crate::notify::message::PushMessage;
use crate::notify::provider::PushProvider;
use crate::reconcile::types::PriceObservation;
use crate::snapshot::cache::SnapshotCache;

/// Result of one dispatch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub sent: usize,
    pub failed: usize,
    pub rearmed: usize,
    /// Products with subscriptions still owed an alert after this dispatch.
    pub retry_products: BTreeSet<Uuid>,
}

pub struct NotificationDispatcher {
    catalog: Arc<dyn CatalogRepository>,
    cache: SnapshotCache,
    provider: Arc<dyn PushProvider>,
    channel_id: String,
}

impl NotificationDispatcher {
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        cache: SnapshotCache,
        provider: Arc<dyn PushProvider>,
        channel_id: String,
    ) -> Self {
        Self {
            catalog,
            cache,
            provider,
            channel_id,
        }
    }

    /// Runs matching and the batched send for `candidates`.
    ///
    /// Callers pass only non-sold-out products; an empty slice is a no-op.
    #[instrument(skip_all, target = "dispatch", fields(candidates = candidates.len()))]
    pub async fn dispatch(&self, candidates: &[PriceObservation]) -> DispatchReport {
        let mut report = DispatchReport::default();
        if candidates.is_empty() {
            return report;
        }

        let product_ids: Vec<Uuid> = candidates.iter().map(|c| c.product_id).collect();

        let subscriptions = match warn_if_slow(
            "db_find_subscriptions",
            Duration::from_millis(200),
            self.catalog.find_subscriptions_by_product_ids(&product_ids),
        )
        .await
        {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "subscription lookup failed; candidates kept for retry");
                report.retry_products.extend(product_ids.iter().copied());
                return report;
            }
        };

        let mut by_product: HashMap<Uuid, Vec<TrackingSubscription>> = HashMap::new();
        for s in subscriptions {
            by_product.entry(s.product_id).or_default().push(s);
        }

        // messages[i] belongs to pending[i]
        let mut messages: Vec<PushMessage> = Vec::new();
        let mut pending: Vec<TrackingSubscription> = Vec::new();

        for product in candidates {
            let Some(subs) = by_product.remove(&product.product_id) else {
                continue;
            };

            for mut sub in subs {
                match sub.evaluate(product.product_price) {
                    Transition::Rearm => {
                        sub.rearm();
                        let update = [(sub.user_id, sub.product_id, sub.state)];
                        match self.catalog.set_alert_states(&update).await {
                            Ok(()) => {
                                report.rearmed += 1;
                                debug!(
                                    user_id = %sub.user_id,
                                    product_id = %sub.product_id,
                                    "price back above target; subscription re-armed"
                                );
                            }
                            Err(e) => {
                                // still NOTIFIED in storage; re-evaluate next cycle
                                report.retry_products.insert(sub.product_id);
                                warn!(
                                    user_id = %sub.user_id,
                                    product_id = %sub.product_id,
                                    error = %format!("{e:#}"),
                                    "failed to persist re-arm; kept for retry"
                                );
                            }
                        }
                    }
                    Transition::Notify => match self.cache.push_token(&sub.user_id).await {
                        Ok(Some(token)) => {
                            messages.push(PushMessage::price_alert(product, &token, &self.channel_id));
                            pending.push(sub);
                        }
                        Ok(None) => {
                            debug!(user_id = %sub.user_id, "no push token registered; skipping");
                        }
                        Err(e) => {
                            warn!(
                                user_id = %sub.user_id,
                                error = %format!("{e:#}"),
                                "push token lookup failed; skipping"
                            );
                        }
                    },
                    Transition::Unchanged => {}
                }
            }
        }

        if messages.is_empty() {
            debug!("no subscriptions matched");
            return report;
        }

        let outcomes = match warn_if_slow(
            "push_send_batch",
            Duration::from_secs(2),
            self.provider.send_batch(&messages),
        )
        .await
        {
            Ok(o) => o,
            Err(e) => {
                warn!(error = %e, count = messages.len(), "push batch failed; all kept for retry");
                report.failed = pending.len();
                report.retry_products.extend(pending.iter().map(|s| s.product_id));
                return report;
            }
        };

        let mut delivered = Vec::with_capacity(pending.len());
        for (i, mut sub) in pending.into_iter().enumerate() {
            match outcomes.get(i) {
                Some(o) if o.success => {
                    sub.mark_notified();
                    delivered.push(sub);
                }
                other => {
                    let reason = other
                        .and_then(|o| o.error.clone())
                        .unwrap_or_else(|| "no outcome".to_string());
                    warn!(
                        user_id = %sub.user_id,
                        product_id = %sub.product_id,
                        reason = %reason,
                        "push rejected; subscription stays armed"
                    );
                    report.failed += 1;
                    report.retry_products.insert(sub.product_id);
                }
            }
        }

        report.sent = delivered.len();

        if !delivered.is_empty() {
            let updates: Vec<_> = delivered
                .iter()
                .map(|s| (s.user_id, s.product_id, s.state))
                .collect();
            if let Err(e) = self.catalog.set_alert_states(&updates).await {
                error!(
                    consistency = true,
                    count = delivered.len(),
                    error = %format!("{e:#}"),
                    "alerts delivered but NOTIFIED state not persisted; duplicates possible"
                );
            }
        }

        info!(sent = report.sent, failed = report.failed, "price alerts dispatched");
        report
    }
}

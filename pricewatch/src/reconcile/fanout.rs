use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use crate::catalog::model::TrackedProduct;
use crate::fetch::errors::FetchError;
use crate::fetch::gateway::PriceFetchGateway;
use crate::reconcile::types::PriceObservation;

pub struct FetchOutcome {
    /// One entry per successfully fetched product, in completion order.
    pub observations: Vec<PriceObservation>,
    pub failures: usize,
}

/// Fetches every product with at most `concurrency` calls in flight and
/// waits for all of them.
///
/// A failed or timed-out call drops that product for the rest of the cycle;
/// it never cancels the other calls.
#[instrument(skip_all, target = "fetch", fields(products = products.len(), concurrency = concurrency))]
pub async fn fetch_all(
    gateway: &dyn PriceFetchGateway,
    products: &[TrackedProduct],
    concurrency: usize,
    per_call: Duration,
) -> FetchOutcome {
    let results: Vec<_> = stream::iter(products)
        .map(|p| async move {
            let res = match timeout(per_call, gateway.fetch(&p.shop, &p.product_code)).await {
                Ok(r) => r,
                Err(_) => Err(FetchError::Timeout(per_call)),
            };
            (p, res)
        })
        .buffer_unordered(concurrency.max(1))
        .boxed()
        .collect()
        .await;

    let mut observations = Vec::with_capacity(results.len());
    let mut failures = 0;

    for (product, res) in results {
        match res {
            Ok(fetched) => observations.push(PriceObservation::new(product, fetched)),
            Err(e) => {
                failures += 1;
                warn!(
                    product_id = %product.id,
                    shop = %product.shop,
                    product_code = %product.product_code,
                    error = %e,
                    "price fetch failed; product skipped this cycle"
                );
            }
        }
    }

    debug!(ok = observations.len(), failures, "fetch fan-out complete");

    FetchOutcome {
        observations,
        failures,
    }
}

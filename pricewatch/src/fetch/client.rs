use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use tracing::{debug, instrument};

use crate::fetch::errors::FetchError;
use crate::fetch::gateway::{FetchedProduct, PriceFetchGateway};
use crate::fetch::types::ProductInfoResponse;

/// HTTP client for the price fetch service that fronts the shop scrapers.
#[derive(Clone)]
pub struct HttpFetchGateway {
    http: Client,
    base: Url,
}

impl HttpFetchGateway {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, FetchError> {
        let base = Url::parse(endpoint)
            .map_err(|e| FetchError::InvalidEndpoint(format!("{endpoint}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(FetchError::InvalidEndpoint(endpoint.to_string()));
        }

        let http = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self { http, base })
    }

    fn product_url(&self, shop: &str, product_code: &str) -> Result<Url, FetchError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::InvalidEndpoint(self.base.to_string()))?
            .pop_if_empty()
            .extend(["products", shop, product_code]);
        Ok(url)
    }
}

#[async_trait]
impl PriceFetchGateway for HttpFetchGateway {
    #[instrument(skip(self), level = "debug")]
    async fn fetch(&self, shop: &str, product_code: &str) -> Result<FetchedProduct, FetchError> {
        let url = self.product_url(shop, product_code)?;

        let resp = self.http.get(url).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound);
        }

        let body: ProductInfoResponse = resp.error_for_status()?.json().await?;

        debug!(price = body.price, sold_out = body.is_sold_out, "product fetched");

        body.try_into()
    }
}

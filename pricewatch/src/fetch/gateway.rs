use async_trait::async_trait;

use crate::fetch::errors::FetchError;

/// Current state of a product as reported by its shop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchedProduct {
    pub price: u64,
    pub is_sold_out: bool,
    pub name: String,
    pub image_url: String,
}

/// Black-box adapter that knows how to read a product page of each shop.
#[async_trait]
pub trait PriceFetchGateway: Send + Sync {
    async fn fetch(&self, shop: &str, product_code: &str) -> Result<FetchedProduct, FetchError>;
}

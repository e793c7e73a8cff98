use serde::Deserialize;

use crate::fetch::errors::FetchError;
use crate::fetch::gateway::FetchedProduct;

/// Response body of `GET /products/{shop}/{productCode}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInfoResponse {
    pub price: i64,
    pub is_sold_out: bool,
    pub name: String,
    #[serde(default)]
    pub image_url: String,
}

impl TryFrom<ProductInfoResponse> for FetchedProduct {
    type Error = FetchError;

    fn try_from(r: ProductInfoResponse) -> Result<Self, Self::Error> {
        let price = u64::try_from(r.price)
            .map_err(|_| FetchError::InvalidResponse(format!("negative price {}", r.price)))?;

        Ok(FetchedProduct {
            price,
            is_sold_out: r.is_sold_out,
            name: r.name,
            image_url: r.image_url,
        })
    }
}

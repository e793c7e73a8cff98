pub mod client;
pub mod errors;
pub mod gateway;
pub mod types;

pub use client::HttpFetchGateway;
pub use errors::FetchError;
pub use gateway::{FetchedProduct, PriceFetchGateway};

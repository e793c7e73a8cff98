pub mod catalog;
pub mod config;
pub mod db;
pub mod fetch;
pub mod history;
pub mod metrics;
pub mod notify;
pub mod reconcile;
pub mod scheduler;
pub mod snapshot;

pub mod error;

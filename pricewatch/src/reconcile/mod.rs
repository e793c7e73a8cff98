pub mod engine;
pub mod fanout;
pub mod types;

pub use engine::{EngineDeps, ReconciliationEngine};
pub use fanout::{FetchOutcome, fetch_all};
pub use types::{CycleReport, PriceObservation};

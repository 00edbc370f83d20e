pub mod aggregator;
pub mod models;

pub use aggregator::{summarize_decisions, summarize_trades};
pub use models::*;

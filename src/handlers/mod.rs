pub mod calculate;
pub mod catalog;
pub mod health;
pub mod metrics_handler;
pub mod quotes;

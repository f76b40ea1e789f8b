pub mod bucketer;
pub mod chart_cache;
pub mod export;
pub mod notifier;
pub mod retry;

//! Category stock watcher: scrapes listing pages, diffs them against the
//! persisted snapshot and notifies on new, restocked and sold-out products.

pub mod compose;
pub mod config;
pub mod db;
pub mod dedupe;
pub mod model;
pub mod notify;
pub mod reconcile;
pub mod runner;
pub mod scheduler;
pub mod scrape;
pub mod store;

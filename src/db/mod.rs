//! Database module: row models and the SQLite-backed product store.
//!
//! - `model`: the raw `products` row and its conversion into domain state.
//! - `repo`: pool setup, migrations and the `ProductStore` implementation.
//!
//! Callers normally only need `init_pool`, `run_migrations` and
//! `SqliteProductStore`, which are re-exported here.

pub mod model;
pub mod repo;

pub use repo::*;

//! Strata Store - layered object storage
//!
//! A hierarchical key/value store persisted as folders and files, with
//! optional transparent encryption and an in-memory LRU or purgeable cache
//! layered on top.

pub mod builder;
pub mod cache;
pub mod config;
pub mod crypto;
pub mod error;
pub mod store;
pub mod tasks;

pub use builder::{open_store, open_store_with, StoreStack};
pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use store::{ObjectStore, ObjectStoreExt, SharedStore, Value, ValueType};
pub use tasks::spawn_pressure_task;

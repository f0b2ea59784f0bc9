//! Background Tasks Module
//!
//! Contains background tasks that run alongside an open store stack.
//!
//! # Tasks
//! - Memory pressure: trims caches periodically and reclaims purgeable values
//!   when pressure is signalled

mod pressure;

pub use pressure::spawn_pressure_task;

//! Core record model, storage and capability interfaces

pub mod capability;
pub mod error;
pub mod metrics;
pub mod persistence;
pub mod query;
pub mod record;
pub mod store;

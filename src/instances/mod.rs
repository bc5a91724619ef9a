//! Capability instances
//!
//! Concrete implementations of the capability traits the record service
//! calls out to.

pub mod remote;

// Re-export instances for convenience
pub use remote::{HttpDecisionEngine, HttpPredictor};

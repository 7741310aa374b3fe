//! Provider registry module.
//!
//! The registry owns every registered provider instance for the lifetime of
//! a collection run and answers connectivity and health queries about them.

mod guard;
mod registry;

pub(crate) use guard::guarded;
pub use registry::{setup_registry, ProviderRegistry};

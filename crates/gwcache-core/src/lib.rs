//! gwcache core
//!
//! Domain types, pure algorithms, and port traits for reconciling API Gateway
//! response caching. Resolution turns a service manifest into immutable
//! per-endpoint settings, the patch compiler turns those settings into stage
//! patch operations, and the template module annotates a compiled resource
//! graph with cache key wiring.

pub mod addressing;
pub mod error;
pub mod ids;
pub mod manifest;
pub mod patch;
pub mod ports;
pub mod settings;
pub mod stage;
pub mod template;

pub use error::{Error, InvokeError, Result};
pub use ids::ReconciliationId;

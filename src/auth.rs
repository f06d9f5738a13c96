//! Credential models, exchange contracts, and the single-flight credential cache.

pub mod cache;
pub mod credential;
pub mod exchange;
pub mod secret;

pub use cache::*;
pub use credential::*;
pub use exchange::*;
pub use secret::*;

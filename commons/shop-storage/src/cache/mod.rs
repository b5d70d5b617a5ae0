//! Cache-aside decorators over the relational ports.
//!
//! Each decorator implements the same port as the implementation it
//! wraps, so callers cannot tell them apart except by latency. Only a
//! fast-store miss falls back to the wrapped port; every other fast-store
//! failure is returned to the caller.

mod counters;
mod product;
mod stream;
mod user;

pub use counters::{ActivityCounters, DEFAULT_COUNTER_TTL};
pub use product::CachedProductStorage;
pub use stream::stat_stream;
pub use user::{CachedUserStorage, DEFAULT_ENTITY_TTL};

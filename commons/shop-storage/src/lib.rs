pub mod atomic;
pub mod cache;
pub mod context;
pub mod error;
pub mod fast;
pub mod paging;
pub mod traits;

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use atomic::{AtomicExecutor, TransactionManager};
pub use context::{CommitHook, Context, Transaction};
pub use error::*;
pub use paging::{Page, PageMetadata, Paging, SortSpec};
pub use traits::*;

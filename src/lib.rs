//! Embedded write-once-read-many ordered record store.
//!
//! Records are ingested in ascending byte order, packed into fixed-size
//! blocks with intra-block prefix compression, and served afterwards through
//! prefix lookups, in-order walks, and length-preserving in-place updates.

pub mod block;
pub mod builder;
pub mod cache;
pub mod config;
pub mod error;
pub mod index;
pub mod reader;
pub mod search;
pub mod walker;

mod pool;

pub use builder::Builder;
pub use cache::{Cache, CacheMap};
pub use config::{Locator, Options};
pub use error::{Error, Result};
pub use index::Index;
pub use reader::Reader;
pub use walker::Walker;

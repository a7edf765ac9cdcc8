mod errors;
mod internal;

pub use errors::CacheError;
pub use internal::{CacheImpl, LocalCache};
pub use internal::io_trait::{CacheIo, ProductionCacheIo};

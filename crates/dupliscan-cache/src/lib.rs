pub mod cache;
pub mod error;
pub mod path;

pub use cache::HashCache;
pub use error::{CacheError, CacheResult};
pub use path::default_cache_path;

pub mod dir_cache;
pub mod engine;
pub mod filter;
pub mod types;

pub use dir_cache::DirSignatureCache;
pub use engine::discover;
pub use filter::DiscoveryFilter;
pub use types::{DiscoveredFile, DiscoveryEvent, DiscoveryStats};

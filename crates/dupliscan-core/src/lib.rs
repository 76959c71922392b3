pub mod cancel;
pub mod cli;
pub mod config;
pub mod error;
pub mod stat;

pub use cancel::CancelToken;
pub use config::{
    default_discovery_workers, default_exclude_dirs, default_hashing_workers, EngineTier,
    MediaType, ScanConfig, DEFAULT_MIN_SIZE_BYTES,
};
pub use error::{CoreError, CoreResult};
pub use stat::StatSignature;

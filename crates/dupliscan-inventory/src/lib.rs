pub mod error;
pub mod path;
pub mod resume;
pub mod store;
pub mod types;

pub use error::{InventoryError, InventoryResult};
pub use path::default_inventory_path;
pub use resume::{default_resume_payload_path, ResumePayload, ResumeStore};
pub use store::InventoryStore;
pub use types::{DiscoveredFileRecord, InventoryScanState, ScanStatus};

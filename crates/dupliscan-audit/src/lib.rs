pub mod error;
pub mod migrate;
pub mod path;
pub mod store;
pub mod types;

pub use error::{AuditError, AuditResult};
pub use migrate::migrate_record;
pub use path::default_audit_dir;
pub use store::AuditLog;
pub use types::{AggregateWindow, AuditRecord, DeletionDetail, DetailStatus, CURRENT_SCHEMA_VERSION};

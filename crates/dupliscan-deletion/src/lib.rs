pub mod adapters;
pub mod error;
pub mod executor;
pub mod plan;
pub mod types;

pub use error::{DeletionError, DeletionResult};
pub use executor::execute_plan;
pub use plan::build_delete_plan;
pub use types::{
    BatchDeletionResult, DeletePlan, DeletionMode, DeletionPolicy, ExecutableOperation,
    ExecutablePlan, PlanGroup, SingleDeletionOutcome,
};

//! Data module - Term export loading, joining and aggregation

mod departments;
mod loader;
mod processor;

pub use departments::DepartmentNames;
pub use loader::{DataLoader, LoaderError};
pub use processor::{DataProcessor, DepartmentTotals, ProcessorError};

/// Canonical column names shared by the loader and the processor.
pub mod columns {
    pub const COURSE_ID: &str = "course_id";
    pub const COURSE_NAME: &str = "course_name";
    pub const U_GRAD: &str = "u_grad";
    pub const COURSE_DEPARTMENT: &str = "course_department";

    pub const DEPARTMENT: &str = "department";
    pub const U_GRAD_CURRENT: &str = "u_grad_current";
    pub const U_GRAD_PRIOR: &str = "u_grad_prior";
    pub const COURSE_DEPARTMENT_PRIOR: &str = "course_department_prior";

    /// Columns every term export must carry after name normalization.
    pub const REQUIRED: [&str; 4] = [COURSE_ID, U_GRAD, COURSE_DEPARTMENT, COURSE_NAME];
}
